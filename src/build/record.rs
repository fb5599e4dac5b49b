//! File records flowing through a task's transformation steps.

use crate::build::SourceFile;
use std::path::{Path, PathBuf};

/// One file in flight between discovery and the destination write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path of the file this record was read from
    pub source: PathBuf,
    /// Absolute base directory the relative path is taken from
    pub base: PathBuf,
    /// Output path relative to the task destination
    pub relative: PathBuf,
    /// File contents
    pub contents: Vec<u8>,
    /// Source map produced by a step, written next to the file
    pub source_map: Option<String>,
}

impl FileRecord {
    /// Create a record for a discovered file with its contents.
    pub fn from_source(file: SourceFile, contents: Vec<u8>) -> Self {
        Self {
            source: file.path,
            base: file.base,
            relative: file.relative,
            contents,
            source_map: None,
        }
    }

    /// Create a record directly (used by tests and aggregate steps).
    pub fn new(base: impl Into<PathBuf>, relative: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let base = base.into();
        let relative = relative.into();
        Self { source: base.join(&relative), base, relative, contents: contents.into(), source_map: None }
    }

    /// The output file name.
    pub fn file_name(&self) -> Option<&str> {
        self.relative.file_name().and_then(|n| n.to_str())
    }

    /// The output file stem.
    pub fn file_stem(&self) -> Option<&str> {
        self.relative.file_stem().and_then(|n| n.to_str())
    }

    /// Lowercased extension of the output path.
    pub fn extension(&self) -> Option<String> {
        self.relative.extension().map(|e| e.to_string_lossy().to_lowercase())
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.contents)
    }

    /// Replace the file name, keeping the directory.
    pub fn set_file_name(&mut self, name: &str) {
        self.relative.set_file_name(name);
    }

    /// Replace the extension.
    pub fn set_extension(&mut self, extension: &str) {
        self.relative.set_extension(extension);
    }

    /// Directory of the source file, used to resolve imports.
    pub fn source_dir(&self) -> &Path {
        self.source.parent().unwrap_or(&self.base)
    }
}
