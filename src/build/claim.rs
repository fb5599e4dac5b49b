//! Output claims: which destination paths a task may write.
//!
//! Jobs in a parallel composition share the destination tree without
//! locking. Each transformation task declares the paths it writes; a
//! parallel composition refuses members whose claims overlap, and tasks
//! refuse to write outside their own claim.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// What part of a claimed directory is owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimKind {
    /// Every file
    All,
    /// Files with one of these (lowercase) extensions
    Extensions(Vec<String>),
    /// Exactly one file name
    File(String),
}

/// A set of destination paths, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputClaim {
    dir: PathBuf,
    recursive: bool,
    kind: ClaimKind,
    except: Vec<String>,
}

/// Two members of a parallel composition may write the same path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{first}' and '{second}' may both write {overlap}")]
pub struct ClaimConflict {
    /// First job name
    pub first: String,
    /// Second job name
    pub second: String,
    /// Human-readable description of the shared paths
    pub overlap: String,
}

impl OutputClaim {
    /// Claim the whole tree under `dir`.
    pub fn tree(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), recursive: true, kind: ClaimKind::All, except: Vec::new() }
    }

    /// Claim files with the given extensions directly inside `dir`.
    pub fn extensions<I, S>(dir: impl Into<PathBuf>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions.into_iter().map(|e| e.as_ref().to_lowercase()).collect();
        Self { dir: dir.into(), recursive: false, kind: ClaimKind::Extensions(extensions), except: Vec::new() }
    }

    /// Claim one file.
    pub fn file(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self { dir: dir.into(), recursive: false, kind: ClaimKind::File(name.into()), except: Vec::new() }
    }

    /// Extend the claim to subdirectories of `dir`.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Leave a file name out of the claim.
    pub fn except(mut self, name: impl Into<String>) -> Self {
        self.except.push(name.into());
        self
    }

    /// Check whether a destination path (relative to the output root) is claimed.
    pub fn contains(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else { return false };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return false };

        let in_dir = if self.recursive { parent.starts_with(&self.dir) } else { parent == self.dir };
        if !in_dir || self.except.iter().any(|e| e == name) {
            return false;
        }

        match &self.kind {
            ClaimKind::All => true,
            ClaimKind::Extensions(exts) => extension_of(name).is_some_and(|ext| exts.contains(&ext)),
            ClaimKind::File(file) => file == name,
        }
    }

    /// Check whether two claims can name the same path.
    pub fn overlaps(&self, other: &OutputClaim) -> bool {
        match (&self.kind, &other.kind) {
            (ClaimKind::File(name), _) => other.contains(&self.dir.join(name)) && !self.except.contains(name),
            (_, ClaimKind::File(_)) => other.overlaps(self),
            (ClaimKind::All, _) | (_, ClaimKind::All) => self.dirs_overlap(other),
            (ClaimKind::Extensions(a), ClaimKind::Extensions(b)) => {
                self.dirs_overlap(other) && a.iter().any(|ext| b.contains(ext))
            }
        }
    }

    fn dirs_overlap(&self, other: &OutputClaim) -> bool {
        self.dir == other.dir
            || (self.recursive && other.dir.starts_with(&self.dir))
            || (other.recursive && self.dir.starts_with(&other.dir))
    }
}

impl std::fmt::Display for OutputClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dir = self.dir.display().to_string();
        let dir = if dir.is_empty() { ".".to_string() } else { dir };
        let sep = if self.recursive { "/**/" } else { "/" };
        match &self.kind {
            ClaimKind::All => write!(f, "{}{}*", dir, sep),
            ClaimKind::Extensions(exts) => write!(f, "{}{}*.{{{}}}", dir, sep, exts.join(",")),
            ClaimKind::File(name) => write!(f, "{}{}{}", dir, sep, name),
        }
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name).extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Verify that claims held by different jobs are pairwise disjoint.
pub fn check_disjoint(claims: &[(String, Vec<OutputClaim>)]) -> Result<(), ClaimConflict> {
    for (i, (first, first_claims)) in claims.iter().enumerate() {
        for (second, second_claims) in &claims[i + 1..] {
            for a in first_claims {
                for b in second_claims {
                    if a.overlaps(b) {
                        return Err(ClaimConflict {
                            first: first.clone(),
                            second: second.clone(),
                            overlap: format!("{} / {}", a, b),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}
