//! Source file discovery for the build system.
//!
//! Resolves a task's glob patterns against the source tree. Patterns support
//! `{a,b}` alternation and a leading `!` for exclusion, and every matched
//! file remembers the base directory its relative output path is taken from.

use glob::{glob_with, MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
    /// IO error during file enumeration
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// Options shared by every pattern match: `*` never crosses a separator.
pub(crate) const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    // `*` and `**` skip dotfiles and dot directories
    require_literal_leading_dot: true,
};

/// Glob patterns selecting a task's input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    /// Patterns relative to the source root; `!` prefix excludes
    patterns: Vec<String>,
    /// Explicit base directory relative to the source root
    base: Option<PathBuf>,
}

impl SourceSet {
    /// Create a source set from one or more patterns.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { patterns: patterns.into_iter().map(Into::into).collect(), base: None }
    }

    /// Use an explicit base instead of each pattern's glob parent.
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Positive patterns after brace expansion.
    pub fn includes(&self) -> Vec<String> {
        self.patterns.iter().filter(|p| !p.starts_with('!')).flat_map(|p| expand_braces(p)).collect()
    }

    /// Exclusion patterns (without the `!`) after brace expansion.
    pub fn excludes(&self) -> Vec<String> {
        self.patterns
            .iter()
            .filter_map(|p| p.strip_prefix('!'))
            .flat_map(expand_braces)
            .collect()
    }

    /// Check whether a path relative to the source root is selected.
    pub fn matches(&self, relative: &Path) -> Result<bool, DiscoveryError> {
        let included = compile(&self.includes())?.iter().any(|p| p.matches_path_with(relative, MATCH_OPTIONS));
        if !included {
            return Ok(false);
        }
        let excluded = compile(&self.excludes())?.iter().any(|p| p.matches_path_with(relative, MATCH_OPTIONS));
        Ok(!excluded)
    }
}

/// A file selected by a [`SourceSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Absolute base directory
    pub base: PathBuf,
    /// Path relative to `base`
    pub relative: PathBuf,
}

/// Discover the files a source set selects under `src_dir`.
///
/// Files are deduplicated (the first pattern that matches a file decides its
/// base) and returned sorted by path. No match is not an error.
pub fn discover(src_dir: &Path, sources: &SourceSet) -> Result<Vec<SourceFile>, DiscoveryError> {
    let excludes = compile(&sources.excludes())?;
    let escaped_root = Pattern::escape(&src_dir.to_string_lossy());

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in sources.includes() {
        let full_pattern = format!("{}/{}", escaped_root, pattern);
        let paths = glob_with(&full_pattern, MATCH_OPTIONS).map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;
        let include = Pattern::new(&pattern).map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;

        let base = match &sources.base {
            Some(base) => src_dir.join(base),
            None => src_dir.join(glob_parent(&pattern)),
        };

        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("error reading path: {}", e);
                    continue;
                }
            };
            if !path.is_file() || seen.contains(&path) {
                continue;
            }

            let Ok(from_root) = path.strip_prefix(src_dir) else { continue };
            // `**` may still descend into dot directories
            if !include.matches_path_with(from_root, MATCH_OPTIONS) {
                continue;
            }
            if excludes.iter().any(|p| p.matches_path_with(from_root, MATCH_OPTIONS)) {
                continue;
            }

            let relative = match path.strip_prefix(&base) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => from_root.to_path_buf(),
            };

            seen.insert(path.clone());
            files.push(SourceFile { base: base.clone(), relative, path });
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, DiscoveryError> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| DiscoveryError::InvalidPattern(p.clone(), e)))
        .collect()
}

/// Expand `{a,b}` alternations into separate patterns.
///
/// Nested groups are expanded recursively; a pattern without braces is
/// returned unchanged.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    // Find the matching close brace and the top-level commas inside
    let mut depth = 0;
    let mut close = None;
    let mut splits = Vec::new();
    for (i, c) in pattern[open..].char_indices() {
        let i = open + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(i),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(splits);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| {
            let alternative = &pattern[w[0] + 1..w[1]];
            expand_braces(&format!("{}{}{}", prefix, alternative, suffix))
        })
        .collect()
}

/// The literal directory prefix of a glob pattern.
///
/// `img/**/*.png` → `img`, `sass/style.scss` → `sass`, `*.html` → ``.
pub fn glob_parent(pattern: &str) -> PathBuf {
    let mut parent = PathBuf::new();
    let path = Path::new(pattern);
    let mut components = path.components().peekable();

    while let Some(component) = components.next() {
        // The last component is the file part, never the parent
        if components.peek().is_none() {
            break;
        }
        match component {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                if part.contains(['*', '?', '[', '{']) {
                    break;
                }
                parent.push(part.as_ref());
            }
            Component::CurDir => {}
            other => parent.push(other.as_os_str()),
        }
    }

    parent
}
