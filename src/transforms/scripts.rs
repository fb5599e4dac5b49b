//! JavaScript minification.

use super::{Step, StepError};
use crate::build::FileRecord;

/// Strip comments and whitespace from scripts with `minifier`.
#[derive(Debug, Clone, Default)]
pub struct MinifyJs;

impl MinifyJs {
    /// Create the step.
    pub fn new() -> Self {
        Self
    }
}

impl Step for MinifyJs {
    fn name(&self) -> &'static str {
        "jsmin"
    }

    fn apply(&self, mut record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        let source = record.text().map_err(|e| StepError::new(self.name(), &record, e))?;
        let minified = minifier::js::minify(source).to_string();
        record.contents = minified.into_bytes();
        Ok(Some(record))
    }
}
