//! Stylesheet steps: Sass compilation, then prefixing and minification.

use super::{Step, StepError};
use crate::build::FileRecord;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

/// Compile `.scss` records to CSS with `grass`.
///
/// Imports resolve relative to the file's own directory. The output record
/// gets a `.css` extension.
#[derive(Debug, Clone, Default)]
pub struct CompileSass;

impl CompileSass {
    pub fn new() -> Self {
        Self
    }
}

impl Step for CompileSass {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn apply(&self, mut record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        // Partials are only compiled through imports
        if record.file_name().is_some_and(|n| n.starts_with('_')) {
            return Ok(None);
        }

        let input = record.text().map_err(|e| StepError::new(self.name(), &record, e))?.to_string();

        let source_dir = record.source_dir().to_path_buf();
        let options = grass::Options::default()
            .style(grass::OutputStyle::Expanded)
            .load_path(source_dir.as_path());

        let css = grass::from_string(input, &options).map_err(|e| StepError::new(self.name(), &record, e))?;

        record.contents = css.into_bytes();
        record.set_extension("css");
        Ok(Some(record))
    }
}

/// Browser targets for vendor prefixing.
///
/// Versions are encoded as `major << 16 | minor << 8 | patch`.
pub fn default_browsers() -> Browsers {
    Browsers {
        chrome: Some(100 << 16),
        edge: Some(100 << 16),
        firefox: Some(100 << 16),
        safari: Some(14 << 16),
        ios_saf: Some(14 << 16),
        samsung: Some(16 << 16),
        ..Browsers::default()
    }
}

/// Add vendor prefixes and minify CSS with `lightningcss`.
///
/// With source maps enabled the record carries a map of the minified output
/// back to the compiled stylesheet.
#[derive(Debug, Clone)]
pub struct PostCss {
    browsers: Browsers,
    source_maps: bool,
}

impl PostCss {
    /// Create a post-processor for the default browser targets.
    pub fn new() -> Self {
        Self { browsers: default_browsers(), source_maps: false }
    }

    /// Override the browser targets.
    pub fn with_browsers(mut self, browsers: Browsers) -> Self {
        self.browsers = browsers;
        self
    }

    /// Produce source maps.
    pub fn with_source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }
}

impl Default for PostCss {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for PostCss {
    fn name(&self) -> &'static str {
        "postcss"
    }

    fn apply(&self, mut record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        let code = record.text().map_err(|e| StepError::new(self.name(), &record, e))?.to_string();
        let filename = record.relative.to_string_lossy().replace('\\', "/");
        let targets = Targets::from(self.browsers);

        let mut stylesheet = StyleSheet::parse(
            &code,
            ParserOptions { filename: filename.clone(), ..ParserOptions::default() },
        )
        .map_err(|e| StepError::new(self.name(), &record, e))?;

        stylesheet
            .minify(MinifyOptions { targets, ..MinifyOptions::default() })
            .map_err(|e| StepError::new(self.name(), &record, e))?;

        let mut source_map = if self.source_maps {
            let mut map = SourceMap::new("/");
            map.add_source(&filename);
            map.set_source_content(0, &code)
                .map_err(|e| StepError::new(self.name(), &record, format!("{:?}", e)))?;
            Some(map)
        } else {
            None
        };

        let output = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                targets,
                source_map: source_map.as_mut(),
                ..PrinterOptions::default()
            })
            .map_err(|e| StepError::new(self.name(), &record, e))?;

        record.source_map = match source_map.as_mut() {
            Some(map) => Some(
                map.to_json(None)
                    .map_err(|e| StepError::new(self.name(), &record, format!("{:?}", e)))?,
            ),
            None => None,
        };
        record.contents = output.code.into_bytes();
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_compile_sass_nested_rules() {
        let record = FileRecord::new("/src/sass", "style.scss", "$c: red;\n.a { .b { color: $c; } }\n");
        let out = CompileSass::new().apply(record).unwrap().unwrap();

        let css = String::from_utf8(out.contents).unwrap();
        assert!(css.contains(".a .b"));
        assert!(css.contains("color: red"));
        assert_eq!(out.relative, PathBuf::from("style.css"));
    }

    #[test]
    fn test_compile_sass_resolves_imports_from_source_dir() {
        let temp = TempDir::new().unwrap();
        let sass = temp.path().join("sass");
        fs::create_dir_all(sass.join("blocks")).unwrap();
        fs::write(sass.join("blocks/_header.scss"), ".header { margin: 0; }").unwrap();
        let entry = "@import \"blocks/header\";\nbody { padding: 0; }\n";
        fs::write(sass.join("style.scss"), entry).unwrap();

        let record = FileRecord::new(&sass, "style.scss", entry);
        let out = CompileSass::new().apply(record).unwrap().unwrap();
        let css = String::from_utf8(out.contents).unwrap();
        assert!(css.contains(".header"));
        assert!(css.contains("body"));
    }

    #[test]
    fn test_compile_sass_syntax_error() {
        let record = FileRecord::new("/src/sass", "style.scss", ".a { color: red;");
        let err = CompileSass::new().apply(record).unwrap_err();
        assert_eq!(err.step, "sass");
        assert_eq!(err.file, PathBuf::from("/src/sass/style.scss"));
    }

    #[test]
    fn test_compile_sass_skips_partials() {
        let record = FileRecord::new("/src/sass", "_vars.scss", "$a: 1;");
        assert!(CompileSass::new().apply(record).unwrap().is_none());
    }

    #[test]
    fn test_postcss_minifies() {
        let record = FileRecord::new("/src", "style.css", ".a {\n  color: #ff0000;\n  margin: 0px 0px;\n}\n");
        let out = PostCss::new().apply(record).unwrap().unwrap();
        let css = String::from_utf8(out.contents).unwrap();
        assert!(css.starts_with(".a{"));
        assert!(css.contains("color:red"));
        assert!(!css.contains('\n'));
        assert!(out.source_map.is_none());
    }

    #[test]
    fn test_postcss_prefixes_for_old_safari() {
        let browsers = Browsers { safari: Some(8 << 16), ..Browsers::default() };
        let record = FileRecord::new("/src", "style.css", ".a { user-select: none; }");
        let out = PostCss::new().with_browsers(browsers).apply(record).unwrap().unwrap();
        let css = String::from_utf8(out.contents).unwrap();
        assert!(css.contains("-webkit-user-select:none"));
    }

    #[test]
    fn test_postcss_source_map() {
        let record = FileRecord::new("/src", "style.css", ".a { color: red; }\n.b { color: blue; }\n");
        let out = PostCss::new().with_source_maps(true).apply(record).unwrap().unwrap();
        let map = out.source_map.expect("source map");
        assert!(map.contains("\"mappings\""));
        assert!(map.contains("style.css"));
    }
}
