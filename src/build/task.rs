//! Jobs: transformation tasks and the clean step.
//!
//! Every unit a pipeline can run implements [`Job`]. A [`Task`] reads the
//! files its [`SourceSet`] selects, runs them through its steps and writes the
//! results under its destination, refusing paths outside its
//! [`OutputClaim`]s.

use crate::build::{discover, BuildContext, DiscoveryError, FileRecord, OutputClaim, SourceSet};
use crate::server::{ReloadHandle, ServerError};
use crate::transforms::{OnError, Step, StepError};
use crate::watch::WatchError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Fatal job failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// Invalid source pattern or unreadable source tree
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A step failed under the fail policy
    #[error(transparent)]
    Step(#[from] StepError),

    /// Reading or writing a file failed
    #[error("{}: {source}", .path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A task tried to write outside its output claim
    #[error("'{task}' is not allowed to write {}", .path.display())]
    Unclaimed {
        /// Task name
        task: String,
        /// Destination path relative to the output root
        path: PathBuf,
    },

    /// The dev server failed to start
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The watcher failed
    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl TaskError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        TaskError::Io { path: path.to_path_buf(), source }
    }
}

/// What a finished job produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobOutput {
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Recoverable errors that were logged and skipped
    pub warnings: Vec<String>,
}

/// Anything a pipeline can run.
#[async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs and results.
    fn name(&self) -> &str;

    /// Destination paths this job writes, relative to the output root.
    fn claims(&self) -> Vec<OutputClaim> {
        Vec::new()
    }

    /// Run the job to completion.
    async fn run(&self, ctx: &BuildContext) -> Result<JobOutput, TaskError>;
}

/// A named transformation task.
pub struct Task {
    name: String,
    sources: SourceSet,
    steps: Vec<Box<dyn Step>>,
    dest: PathBuf,
    on_error: OnError,
    claims: Vec<OutputClaim>,
    source_maps: bool,
    notify: Option<ReloadHandle>,
}

impl Task {
    /// Create a task copying `sources` into `dest` (relative to the output root).
    pub fn new(name: impl Into<String>, sources: SourceSet, dest: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            sources,
            steps: Vec::new(),
            dest: normalize(dest.as_ref()),
            on_error: OnError::Fail,
            claims: Vec::new(),
            source_maps: false,
            notify: None,
        }
    }

    /// Append a transformation step.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Set the error policy.
    pub fn on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// Add an output claim. Without any, the task claims its whole destination tree.
    pub fn claim(mut self, claim: OutputClaim) -> Self {
        self.claims.push(claim);
        self
    }

    /// Write source maps carried by records next to the files.
    pub fn write_source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }

    /// Notify browsers about each written file through a reload handle.
    pub fn notify(mut self, handle: ReloadHandle) -> Self {
        self.notify = Some(handle);
        self
    }

    /// Destination relative to the output root.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    fn check_claim(&self, relative: &Path) -> Result<(), TaskError> {
        if self.claims().iter().any(|c| c.contains(relative)) {
            Ok(())
        } else {
            Err(TaskError::Unclaimed { task: self.name.clone(), path: relative.to_path_buf() })
        }
    }

    async fn read_sources(&self, src_dir: &Path) -> Result<Vec<FileRecord>, TaskError> {
        let files = discover(src_dir, &self.sources)?;
        let mut records = Vec::with_capacity(files.len());
        for file in files {
            let contents = fs::read(&file.path).await.map_err(|e| TaskError::io(&file.path, e))?;
            records.push(FileRecord::from_source(file, contents));
        }
        Ok(records)
    }

    async fn write(&self, out_dir: &Path, record: FileRecord) -> Result<Vec<PathBuf>, TaskError> {
        let relative = normalize(&self.dest.join(&record.relative));
        self.check_claim(&relative)?;

        let target = out_dir.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| TaskError::io(parent, e))?;
        }

        let mut written = Vec::with_capacity(2);
        let mut contents = record.contents;

        if let (true, Some(map)) = (self.source_maps, record.source_map) {
            let map_name = format!("{}.map", relative.file_name().map(|n| n.to_string_lossy()).unwrap_or_default());
            let map_relative = relative.with_file_name(&map_name);
            self.check_claim(&map_relative)?;

            contents.extend_from_slice(format!("\n/*# sourceMappingURL={} */", map_name).as_bytes());
            let map_target = out_dir.join(&map_relative);
            fs::write(&map_target, map).await.map_err(|e| TaskError::io(&map_target, e))?;
            written.push(map_target);
        }

        fs::write(&target, contents).await.map_err(|e| TaskError::io(&target, e))?;
        tracing::debug!(task = %self.name, file = %relative.display(), "wrote");

        if let Some(handle) = &self.notify {
            handle.stylesheet(&relative);
        }

        written.insert(0, target);
        Ok(written)
    }
}

#[async_trait]
impl Job for Task {
    fn name(&self) -> &str {
        &self.name
    }

    fn claims(&self) -> Vec<OutputClaim> {
        if self.claims.is_empty() {
            vec![OutputClaim::tree(self.dest.clone())]
        } else {
            self.claims.clone()
        }
    }

    async fn run(&self, ctx: &BuildContext) -> Result<JobOutput, TaskError> {
        let mut records = self.read_sources(&ctx.src_dir()).await?;
        if records.is_empty() {
            tracing::debug!(task = %self.name, "no matching sources");
            return Ok(JobOutput::default());
        }

        let mut output = JobOutput::default();
        for step in &self.steps {
            let stepped = step.apply_all(records, self.on_error)?;
            output.warnings.extend(stepped.skipped.iter().map(ToString::to_string));
            records = stepped.records;
        }

        let out_dir = ctx.out_dir();
        for record in records {
            output.outputs.extend(self.write(&out_dir, record).await?);
        }
        Ok(output)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("sources", &self.sources)
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("dest", &self.dest)
            .field("on_error", &self.on_error)
            .finish()
    }
}

/// Remove the whole output tree.
#[derive(Debug, Clone, Default)]
pub struct Clean;

#[async_trait]
impl Job for Clean {
    fn name(&self) -> &str {
        "clean"
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::tree("")]
    }

    async fn run(&self, ctx: &BuildContext) -> Result<JobOutput, TaskError> {
        let out_dir = ctx.out_dir();
        if out_dir == ctx.project_root() || ctx.src_dir().starts_with(&out_dir) {
            return Err(TaskError::io(
                &out_dir,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "refusing to remove a directory holding sources"),
            ));
        }

        match fs::remove_dir_all(&out_dir).await {
            Ok(()) => tracing::debug!("removed {}", out_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(TaskError::io(&out_dir, e)),
        }
        Ok(JobOutput::default())
    }
}

/// Drop `.` components so `.` and `` name the same destination.
fn normalize(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}
