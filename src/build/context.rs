//! The shared, read-only state every job runs against.

use crate::config::SiteConfig;
use std::path::{Path, PathBuf};

/// Configuration plus the resolved source and output roots.
///
/// Relative `project.src` / `project.out` settings are joined onto the
/// project root once, here; absolute ones are used as given.
#[derive(Debug, Clone)]
pub struct BuildContext {
    config: SiteConfig,
    project_root: PathBuf,
    src_dir: PathBuf,
    out_dir: PathBuf,
    verbose: bool,
}

impl BuildContext {
    /// Create a context, resolving the source and output roots.
    pub fn new(config: SiteConfig, project_root: PathBuf) -> Self {
        let src_dir = project_root.join(&config.project.src);
        let out_dir = project_root.join(&config.project.out);
        Self { config, project_root, src_dir, out_dir, verbose: false }
    }

    /// The validated configuration.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Directory holding `sitepipe.toml`, or the working directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Root all source globs are matched under.
    pub fn src_dir(&self) -> PathBuf {
        self.src_dir.clone()
    }

    /// Destination tree; removed by `clean`.
    pub fn out_dir(&self) -> PathBuf {
        self.out_dir.clone()
    }

    /// Whether written files are listed after a run.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
