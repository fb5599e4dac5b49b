//! Transformation steps applied to file records.
//!
//! A step consumes the records produced by the previous step and returns the
//! records for the next one. Most steps work on one file at a time and only
//! implement [`Step::apply`]; aggregate steps such as the sprite builder
//! override [`Step::apply_all`].

pub mod html;
pub mod images;
pub mod scripts;
pub mod styles;
pub mod svg;

pub use html::MinifyHtml;
pub use images::{OptimizeImages, WebpEncode};
pub use scripts::MinifyJs;
pub use styles::{CompileSass, PostCss};
pub use svg::{OptimizeSvg, SvgStore};

use crate::build::FileRecord;
use std::path::PathBuf;
use thiserror::Error;

/// A step failed on one file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{step}: {file}: {message}")]
pub struct StepError {
    /// Step name
    pub step: &'static str,
    /// File the step failed on
    pub file: PathBuf,
    /// Error message from the underlying library
    pub message: String,
}

impl StepError {
    /// Create a step error for a record.
    pub fn new(step: &'static str, record: &FileRecord, message: impl std::fmt::Display) -> Self {
        Self { step, file: record.source.clone(), message: message.to_string() }
    }
}

/// What a task does when a step fails on a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Fail the task
    #[default]
    Fail,
    /// Log the error, drop the file and keep going
    Skip,
}

/// Outcome of running one step over a batch of records.
#[derive(Debug, Default)]
pub struct StepOutput {
    /// Records passed to the next step
    pub records: Vec<FileRecord>,
    /// Errors that were skipped
    pub skipped: Vec<StepError>,
}

/// A transformation step.
pub trait Step: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Transform one record.
    fn apply(&self, record: FileRecord) -> Result<Option<FileRecord>, StepError>;

    /// Transform a batch of records, honouring the task's error policy.
    ///
    /// Returning `Ok(None)` from [`Step::apply`] drops the record silently.
    fn apply_all(&self, records: Vec<FileRecord>, on_error: OnError) -> Result<StepOutput, StepError> {
        let mut output = StepOutput { records: Vec::with_capacity(records.len()), skipped: Vec::new() };
        for record in records {
            match self.apply(record) {
                Ok(Some(record)) => output.records.push(record),
                Ok(None) => {}
                Err(e) if on_error == OnError::Skip => {
                    tracing::error!(step = self.name(), file = %e.file.display(), "{}", e.message);
                    output.skipped.push(e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(output)
    }
}

/// Rename every record to a fixed file name.
#[derive(Debug, Clone)]
pub struct Rename {
    name: String,
}

impl Rename {
    /// Rename to `name`, keeping the directory.
    pub fn to(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Step for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn apply(&self, mut record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        record.set_file_name(&self.name);
        Ok(Some(record))
    }
}
