//! Command handlers (build, start, task, tasks)

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{BuildContext, Pipeline};
use crate::config::loader::apply_overrides;
use crate::config::{load_project, CliOverrides, ConfigError, ConfigSource};
use crate::server::ReloadHandle;
use crate::tasks::TaskCatalog;

/// Load the configuration and resolve the project root.
pub(crate) fn load_context(
    config_path: Option<&Path>,
    port: Option<u16>,
    verbose: bool,
) -> Result<BuildContext, ConfigError> {
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Io { path: PathBuf::from("."), source })?;
    let loaded = load_project(config_path, &cwd)?;
    match &loaded.source {
        ConfigSource::File(path) => tracing::debug!("Using config: {}", path.display()),
        ConfigSource::Defaults => tracing::debug!("No sitepipe.toml found, using defaults"),
    }

    let config = apply_overrides(loaded.config, &CliOverrides { port })?;
    Ok(BuildContext::new(config, loaded.root).with_verbose(verbose))
}

fn check_source_dir(ctx: &BuildContext) -> Option<PathBuf> {
    let src_dir = ctx.src_dir();
    if src_dir.is_dir() {
        None
    } else {
        Some(src_dir)
    }
}

async fn run_pipeline(ctx: &BuildContext, pipeline: Pipeline) -> ExitCode {
    let result = pipeline.execute(ctx).await;
    if ctx.is_verbose() {
        let out_dir = ctx.out_dir();
        for output in result.all_outputs() {
            tracing::info!("  wrote {}", output.strip_prefix(&out_dir).unwrap_or(output).display());
        }
    }
    if result.is_success() {
        tracing::info!("{}", result.summary());
        ExitCode::from(EXIT_SUCCESS)
    } else {
        tracing::error!("{}", result.summary());
        ExitCode::from(EXIT_ERROR)
    }
}

/// Run the build command
pub(crate) async fn run_build(ctx: &BuildContext) -> ExitCode {
    if let Some(missing) = check_source_dir(ctx) {
        tracing::error!("Source directory not found: {}", missing.display());
        return ExitCode::from(EXIT_ERROR);
    }

    let catalog = TaskCatalog::new(ctx, ReloadHandle::new());
    match catalog.build() {
        Ok(pipeline) => run_pipeline(ctx, pipeline).await,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the start command until interrupted
pub(crate) async fn run_start(ctx: &BuildContext) -> ExitCode {
    if let Some(missing) = check_source_dir(ctx) {
        tracing::error!("Source directory not found: {}", missing.display());
        return ExitCode::from(EXIT_ERROR);
    }

    let catalog = TaskCatalog::new(ctx, ReloadHandle::new());
    let pipeline = match catalog.start() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    tokio::select! {
        code = run_pipeline(ctx, pipeline) => code,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopping");
            ExitCode::from(EXIT_SUCCESS)
        }
    }
}

/// Run one named task
pub(crate) async fn run_task(ctx: &BuildContext, name: &str) -> ExitCode {
    let catalog = TaskCatalog::new(ctx, ReloadHandle::new());
    let Some(pipeline) = catalog.get(name) else {
        tracing::error!("Unknown task '{}'. Available: {}", name, catalog.names().join(", "));
        return ExitCode::from(EXIT_INVALID_ARGS);
    };

    tokio::select! {
        code = run_pipeline(ctx, pipeline) => code,
        _ = tokio::signal::ctrl_c() => ExitCode::from(EXIT_SUCCESS),
    }
}

/// Print the task names
pub(crate) fn list_tasks(ctx: &BuildContext) -> ExitCode {
    let catalog = TaskCatalog::new(ctx, ReloadHandle::new());
    for name in catalog.names() {
        println!("{}", name);
    }
    ExitCode::from(EXIT_SUCCESS)
}
