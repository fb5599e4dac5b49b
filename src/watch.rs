//! Watch mode: rerun pipelines when source files change.
//!
//! File events are debounced by `notify-debouncer-mini` and forwarded into the
//! runtime over a channel. Each debounced batch runs every matching
//! [`WatchRule`] once, in rule order. A failing rule is logged and watching
//! continues.

use crate::build::discovery::MATCH_OPTIONS;
use crate::build::{BuildContext, BuildResult, DiscoveryError, Job, JobOutput, Pipeline, TaskError};
use async_trait::async_trait;
use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error during watch mode
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),

    /// Failed to add watch path
    #[error("failed to watch {}: {source}", .path.display())]
    WatchPath {
        /// Directory that could not be watched
        path: PathBuf,
        /// Underlying error
        #[source]
        source: notify::Error,
    },

    /// Source directory not found
    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The event channel closed
    #[error("watch channel closed")]
    ChannelClosed,
}

/// Binds a glob pattern (relative to the source tree) to a pipeline.
#[derive(Debug, Clone)]
pub struct WatchRule {
    pattern: Pattern,
    pipeline: Pipeline,
}

impl WatchRule {
    /// Create a rule.
    pub fn new(pattern: &str, pipeline: Pipeline) -> Result<Self, DiscoveryError> {
        let compiled = Pattern::new(pattern).map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;
        Ok(Self { pattern: compiled, pipeline })
    }

    /// The glob pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// The pipeline run on change.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Check a path relative to the source tree.
    pub fn matches(&self, relative: &Path) -> bool {
        self.pattern.matches_path_with(relative, MATCH_OPTIONS)
    }
}

/// Rules triggered by a batch of changed paths, each once and in rule order.
pub fn triggered_rules<'a>(rules: &'a [WatchRule], changed: &[PathBuf]) -> Vec<&'a WatchRule> {
    rules.iter().filter(|rule| changed.iter().any(|path| rule.matches(path))).collect()
}

/// Tracks failing rules across runs for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Rules whose last run failed or skipped files
    failing: HashSet<String>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rule run; returns true when a failing rule ran cleanly again.
    pub fn update(&mut self, rule: &str, result: &BuildResult) -> bool {
        let clean = result.is_success() && result.all_warnings().is_empty();
        if clean {
            self.failing.remove(rule)
        } else {
            self.failing.insert(rule.to_string());
            false
        }
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    /// Get the number of failing rules
    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Job that watches the source tree and dispatches [`WatchRule`]s.
///
/// Never completes on its own.
#[derive(Debug, Clone)]
pub struct Watcher {
    rules: Vec<WatchRule>,
}

impl Watcher {
    /// Create the job.
    pub fn new(rules: Vec<WatchRule>) -> Self {
        Self { rules }
    }

    /// Run every rule matching `changed` (paths relative to the source tree).
    ///
    /// Returns the results of the rules that ran, in order.
    pub async fn dispatch(
        &self,
        ctx: &BuildContext,
        changed: &[PathBuf],
        tracker: &mut ErrorTracker,
    ) -> Vec<(String, BuildResult)> {
        let mut runs = Vec::new();
        for rule in triggered_rules(&self.rules, changed) {
            tracing::debug!(pattern = rule.pattern(), "running {}", rule.pipeline().label());
            let result = rule.pipeline().execute(ctx).await;

            if tracker.update(rule.pattern(), &result) {
                tracing::info!("Fixed: {}", rule.pattern());
            } else if !result.is_success() {
                tracing::warn!("{} failed, still watching", rule.pipeline().label());
            }
            runs.push((rule.pattern().to_string(), result));
        }
        runs
    }
}

#[async_trait]
impl Job for Watcher {
    fn name(&self) -> &str {
        "watcher"
    }

    async fn run(&self, ctx: &BuildContext) -> Result<JobOutput, TaskError> {
        let src_dir = ctx.src_dir();
        if !src_dir.is_dir() {
            return Err(WatchError::SourceNotFound(src_dir).into());
        }
        // Events arrive with canonical paths on some platforms
        let canonical = src_dir.canonicalize().unwrap_or_else(|_| src_dir.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let debounce = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
        let mut debouncer = new_debouncer(debounce, move |events: DebounceEventResult| {
            let _ = tx.send(events);
        })
        .map_err(WatchError::WatcherInit)?;

        debouncer
            .watcher()
            .watch(&src_dir, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: src_dir.clone(), source })?;

        tracing::info!("Watching {} for changes...", src_dir.display());
        let mut tracker = ErrorTracker::new();

        while let Some(batch) = rx.recv().await {
            match batch {
                Ok(events) => {
                    let mut changed: Vec<PathBuf> = events
                        .iter()
                        .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                        .filter_map(|e| {
                            e.path
                                .strip_prefix(&canonical)
                                .or_else(|_| e.path.strip_prefix(&src_dir))
                                .ok()
                                .map(Path::to_path_buf)
                        })
                        .collect();
                    changed.sort();
                    changed.dedup();

                    for path in &changed {
                        tracing::info!("Changed: {}", path.display());
                    }
                    self.dispatch(ctx, &changed, &mut tracker).await;
                }
                Err(e) => {
                    // Non-fatal, keep watching
                    tracing::warn!("watch error: {:?}", e);
                }
            }
        }

        Err(WatchError::ChannelClosed.into())
    }
}
