//! HTML minification.

use super::{Step, StepError};
use crate::build::FileRecord;
use minify_html::{minify, Cfg};

/// Collapse whitespace and drop comments in HTML pages.
///
/// Inline `<style>` and `<script>` contents are left as written.
#[derive(Debug, Clone, Default)]
pub struct MinifyHtml;

impl MinifyHtml {
    /// Create the step.
    pub fn new() -> Self {
        Self
    }
}

impl Step for MinifyHtml {
    fn name(&self) -> &'static str {
        "htmlmin"
    }

    fn apply(&self, mut record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        let cfg = Cfg::new();
        record.contents = minify(&record.contents, &cfg);
        Ok(Some(record))
    }
}
