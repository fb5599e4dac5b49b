//! Build orchestration for sitepipe.
//!
//! Runs named jobs over the source tree and writes results into the output
//! tree.
//!
//! # Overview
//!
//! The build system consists of:
//! - **Discovery**: Find source files using glob patterns relative to the source root
//! - **Tasks**: Read files, run them through transformation steps, write them out
//! - **Pipelines**: Compose jobs in series or in parallel
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{BuildContext, Pipeline};
//! use sitepipe::config::load_project;
//! use sitepipe::server::ReloadHandle;
//! use sitepipe::tasks::TaskCatalog;
//!
//! let loaded = load_project(None, &std::env::current_dir()?)?;
//! let context = BuildContext::new(loaded.config, loaded.root);
//! let catalog = TaskCatalog::new(&context, ReloadHandle::new());
//!
//! let result = catalog.build()?.execute(&context).await;
//! println!("{}", result.summary());
//! ```

pub mod claim;
pub mod context;
pub mod discovery;
pub mod pipeline;
pub mod record;
pub mod result;
pub mod task;

pub use claim::*;
pub use context::*;
pub use discovery::*;
pub use pipeline::*;
pub use record::*;
pub use result::*;
pub use task::*;
