//! Command-line interface implementation
//!
//! Parses arguments, sets up logging and the runtime, and dispatches to the
//! command handlers in [`build`].

mod build;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Sitepipe - Build static site assets and serve them with live reload
#[derive(Parser, Debug)]
#[command(name = "sitepipe")]
#[command(about = "Sitepipe - Build static site assets and serve them with live reload")]
#[command(version)]
pub struct Cli {
    /// Path to sitepipe.toml (default: search upward from the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Dev server port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Clean the output tree and run a production build
    Build,

    /// Build, serve the output tree and rebuild on changes (default)
    Start,

    /// Run a single named task
    Task {
        /// Task name (see `sitepipe tasks`)
        name: String,
    },

    /// List the task names
    Tasks,
}

/// Initialize tracing. `RUST_LOG` overrides the default filter.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "sitepipe=debug,tower_http=debug" } else { "sitepipe=info" };
    let filter = tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()));

    // A subscriber may already be installed when embedded or under test
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// Run the CLI.
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(EXIT_INVALID_ARGS) } else { ExitCode::from(EXIT_SUCCESS) };
        }
    };

    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("failed to start runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> ExitCode {
    let command = cli.command.unwrap_or(Commands::Start);
    let ctx = match build::load_context(cli.config.as_deref(), cli.port, cli.verbose) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match command {
        Commands::Build => build::run_build(&ctx).await,
        Commands::Start => build::run_start(&ctx).await,
        Commands::Task { name } => build::run_task(&ctx, &name).await,
        Commands::Tasks => build::list_tasks(&ctx),
    }
}
