//! Configuration schema types for `sitepipe.toml`
//!
//! Defines the structure and validation rules for sitepipe project configuration.
//! Every section is optional; the defaults describe the conventional
//! `source/` → `build/` layout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,
    /// Source tree root
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Destination tree root (cleaned on every build)
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_name(), src: default_src(), out: default_out() }
    }
}

fn default_name() -> String {
    "site".to_string()
}

fn default_src() -> PathBuf {
    PathBuf::from("source")
}

fn default_out() -> PathBuf {
    PathBuf::from("build")
}

/// Dev server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind (0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Send permissive CORS headers
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), cors: true }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Image encoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// JPEG re-encode quality (1-100)
    #[serde(default = "default_quality")]
    pub jpeg_quality: u8,
    /// WebP encode quality (1-100)
    #[serde(default = "default_quality")]
    pub webp_quality: u8,
}

fn default_quality() -> u8 {
    75
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { jpeg_quality: default_quality(), webp_quality: default_quality() }
    }
}

/// Stylesheet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Write `.map` files next to compiled stylesheets
    #[serde(default = "default_true")]
    pub source_maps: bool,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self { source_maps: true }
    }
}

/// Complete sitepipe.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Project layout
    #[serde(default)]
    pub project: ProjectConfig,
    /// Dev server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Image settings
    #[serde(default)]
    pub images: ImagesConfig,
    /// Stylesheet settings
    #[serde(default)]
    pub styles: StylesConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "images.webp_quality")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sitepipe.toml: '{}' {}", self.field, self.message)
    }
}

impl SiteConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        // Cleaning the output would wipe the sources
        if self.project.src == self.project.out {
            errors.push(ConfigValidationError {
                field: "project.out".to_string(),
                message: "must differ from project.src".to_string(),
            });
        }

        for (field, quality) in [
            ("images.jpeg_quality", self.images.jpeg_quality),
            ("images.webp_quality", self.images.webp_quality),
        ] {
            if !(1..=100).contains(&quality) {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must be between 1 and 100".to_string(),
                });
            }
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Address string for the dev server
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
