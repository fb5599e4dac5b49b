//! Sitepipe - Static site asset pipeline
//!
//! This library provides functionality to:
//! - Compile, prefix and minify stylesheets, minify HTML and scripts
//! - Recompress images, encode WebP variants, clean SVGs and build an icon sprite
//! - Compose these tasks into series and parallel pipelines
//! - Serve the output tree with live reload and rerun tasks on file changes

pub mod build;
pub mod cli;
pub mod config;
pub mod server;
pub mod tasks;
pub mod transforms;
pub mod watch;
