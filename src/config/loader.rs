//! Locating and reading `sitepipe.toml`.
//!
//! A project is rooted at the directory holding its config file. Without a
//! file, the working directory is the root and every setting is a default.

use super::schema::{ProjectConfig, SiteConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "sitepipe.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file (or the working directory) could not be read
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// TOML syntax or type error
    #[error("invalid {}: {source}", .path.display())]
    Parse {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
    /// One or more settings out of range
    #[error("invalid configuration:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// Settings the command line may override
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// `--port`
    pub port: Option<u16>,
}

/// Where a configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file
    File(PathBuf),
    /// No file; built-in defaults
    Defaults,
}

/// A validated configuration and the project root its paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Validated settings
    pub config: SiteConfig,
    /// Directory relative `src`/`out` settings resolve against
    pub root: PathBuf,
    /// File the settings came from, if any
    pub source: ConfigSource,
}

/// Search `start` and its ancestors for `sitepipe.toml`.
pub fn locate_config(start: &Path) -> Option<PathBuf> {
    start.ancestors().map(|dir| dir.join(CONFIG_FILE_NAME)).find(|candidate| candidate.is_file())
}

/// Parse and validate one config file.
pub fn read_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let config: SiteConfig =
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    validated(config)
}

/// Load the configuration for a project.
///
/// An explicit path wins; otherwise the file is searched for upward from
/// `cwd`. Relative paths are taken from `cwd`.
pub fn load_project(explicit: Option<&Path>, cwd: &Path) -> Result<LoadedConfig, ConfigError> {
    let path = match explicit {
        Some(path) => Some(cwd.join(path)),
        None => locate_config(cwd),
    };

    let Some(path) = path else {
        return Ok(LoadedConfig { config: defaults_for(cwd), root: cwd.to_path_buf(), source: ConfigSource::Defaults });
    };

    let config = read_config(&path)?;
    let root = path.parent().map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
    Ok(LoadedConfig { config, root, source: ConfigSource::File(path) })
}

/// Defaults for a project rooted at `dir`, named after the directory.
pub fn defaults_for(dir: &Path) -> SiteConfig {
    let project = match dir.file_name() {
        Some(name) => ProjectConfig { name: name.to_string_lossy().into_owned(), ..ProjectConfig::default() },
        None => ProjectConfig::default(),
    };
    SiteConfig { project, ..SiteConfig::default() }
}

/// Defaults for the working directory.
pub fn default_config() -> SiteConfig {
    match env::current_dir() {
        Ok(cwd) => defaults_for(&cwd),
        Err(_) => SiteConfig::default(),
    }
}

/// Apply command-line overrides, then validate again.
pub fn apply_overrides(mut config: SiteConfig, overrides: &CliOverrides) -> Result<SiteConfig, ConfigError> {
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    validated(config)
}

fn validated(config: SiteConfig) -> Result<SiteConfig, ConfigError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Validation(errors.iter().map(ToString::to_string).collect()))
    }
}
