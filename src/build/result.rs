//! Outcomes of job and pipeline runs.

use std::path::PathBuf;
use std::time::Duration;

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Ran to completion
    Success,
    /// Never started; an earlier member of its series failed
    Skipped,
    /// Returned an error, kept as its message
    Failed(String),
}

impl TaskStatus {
    /// True only for [`TaskStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }

    /// True only for [`TaskStatus::Failed`].
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => f.write_str("success"),
            TaskStatus::Skipped => f.write_str("skipped"),
            TaskStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// One job's run: status, written files, timing and skipped-file warnings.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Job name as logged
    pub name: String,
    /// How the job ended
    pub status: TaskStatus,
    /// Absolute paths written, maps included
    pub outputs: Vec<PathBuf>,
    /// Wall time of the job
    pub duration: Duration,
    /// Files dropped under the skip error policy
    pub warnings: Vec<String>,
}

impl TaskResult {
    fn with_status(name: impl Into<String>, status: TaskStatus, duration: Duration) -> Self {
        Self { name: name.into(), status, outputs: Vec::new(), duration, warnings: Vec::new() }
    }

    /// A job that finished and wrote `outputs`.
    pub fn success(name: impl Into<String>, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { outputs, ..Self::with_status(name, TaskStatus::Success, duration) }
    }

    /// A job that never started.
    pub fn skipped(name: impl Into<String>) -> Self {
        Self::with_status(name, TaskStatus::Skipped, Duration::ZERO)
    }

    /// A job that returned `error`.
    pub fn failed(name: impl Into<String>, error: String, duration: Duration) -> Self {
        Self::with_status(name, TaskStatus::Failed(error), duration)
    }

    /// Attach skipped-file warnings.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Whether the job succeeded. Warnings do not count against it.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Every job result of a pipeline run, in completion order.
///
/// A run succeeds only when every job ran and succeeded; skipped members
/// count against it.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Job results in completion order
    pub tasks: Vec<TaskResult>,
    /// Wall time of the whole run
    pub total_duration: Duration,
}

impl BuildResult {
    /// An empty run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one job result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Append the job results of a nested run.
    pub fn merge(&mut self, other: BuildResult) {
        self.tasks.extend(other.tasks);
    }

    /// Set the run's wall time.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// First result recorded for a job name.
    pub fn get(&self, name: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.name == name)
    }

    fn count(&self, status: impl Fn(&TaskStatus) -> bool) -> usize {
        self.tasks.iter().filter(|r| status(&r.status)).count()
    }

    /// Jobs that succeeded.
    pub fn success_count(&self) -> usize {
        self.count(TaskStatus::is_success)
    }

    /// Jobs that never started.
    pub fn skipped_count(&self) -> usize {
        self.count(|s| *s == TaskStatus::Skipped)
    }

    /// Jobs that returned an error.
    pub fn failed_count(&self) -> usize {
        self.count(TaskStatus::is_failure)
    }

    /// Whether every recorded job succeeded.
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(TaskResult::is_success)
    }

    /// Every file written, in job order.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| &r.outputs).collect()
    }

    /// Every skipped-file warning, in job order.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.tasks.iter().flat_map(|r| &r.warnings).collect()
    }

    /// Results of the jobs that failed.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Final log paragraph of a run.
    ///
    /// ```text
    /// Build failed after 312 ms: scripts
    ///   scripts: jsmin: js/a.js: invalid utf-8
    ///   not run: reload
    ///   warning: sass: sass/style.scss: expected "}"
    /// ```
    pub fn summary(&self) -> String {
        let elapsed = format_duration(self.total_duration);
        let mut text = if self.is_success() {
            format!(
                "Build succeeded: {} tasks, {} files in {}",
                self.tasks.len(),
                self.all_outputs().len(),
                elapsed
            )
        } else {
            let failed: Vec<&str> = self.failures().iter().map(|r| r.name.as_str()).collect();
            let mut text = format!("Build failed after {}: {}", elapsed, failed.join(", "));
            for task in self.failures() {
                if let TaskStatus::Failed(err) = &task.status {
                    text.push_str(&format!("\n  {}: {}", task.name, err));
                }
            }
            let not_run: Vec<&str> =
                self.tasks.iter().filter(|r| r.status == TaskStatus::Skipped).map(|r| r.name.as_str()).collect();
            if !not_run.is_empty() {
                text.push_str(&format!("\n  not run: {}", not_run.join(", ")));
            }
            text
        };

        for warning in self.all_warnings() {
            text.push_str(&format!("\n  warning: {}", warning));
        }
        text
    }
}

/// `42 ms` below a second, `1.50 s` above.
pub fn format_duration(duration: Duration) -> String {
    match duration.as_millis() {
        ms if ms < 1000 => format!("{} ms", ms),
        _ => format!("{:.2} s", duration.as_secs_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(results: Vec<TaskResult>) -> BuildResult {
        let mut build = BuildResult::new();
        for result in results {
            build.add_result(result);
        }
        build
    }

    #[test]
    fn test_status() {
        assert!(TaskStatus::Success.is_success());
        assert!(!TaskStatus::Skipped.is_success());
        assert!(!TaskStatus::Skipped.is_failure());
        assert_eq!(TaskStatus::Failed("boom".to_string()).to_string(), "failed: boom");
    }

    #[test]
    fn test_skipped_member_fails_run() {
        let build = run(vec![
            TaskResult::success("clean", vec![], Duration::ZERO),
            TaskResult::failed("copy", "permission denied".to_string(), Duration::ZERO),
            TaskResult::skipped("styles"),
        ]);

        assert_eq!((build.success_count(), build.failed_count(), build.skipped_count()), (1, 1, 1));
        assert!(!build.is_success());
        assert!(build.get("copy").is_some_and(|r| r.status.is_failure()));
    }

    #[test]
    fn test_warnings_do_not_fail_run() {
        let build = run(vec![TaskResult::success("styles", vec![], Duration::ZERO)
            .with_warnings(vec!["sass: sass/style.scss: expected \"}\"".to_string()])]);

        assert!(build.is_success());
        assert_eq!(build.all_warnings().len(), 1);
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut first = run(vec![TaskResult::success("html", vec![PathBuf::from("index.html")], Duration::ZERO)]);
        first.merge(run(vec![TaskResult::success(
            "styles",
            vec![PathBuf::from("css/style.min.css"), PathBuf::from("css/style.min.css.map")],
            Duration::ZERO,
        )]));

        let names: Vec<_> = first.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["html", "styles"]);
        assert_eq!(first.all_outputs().len(), 3);
    }

    #[test]
    fn test_success_summary() {
        let build = run(vec![TaskResult::success("html", vec![PathBuf::from("index.html")], Duration::ZERO)])
            .with_duration(Duration::from_millis(100));
        assert_eq!(build.summary(), "Build succeeded: 1 tasks, 1 files in 100 ms");
    }

    #[test]
    fn test_failure_summary() {
        let build = run(vec![
            TaskResult::success("styles", vec![], Duration::ZERO).with_warnings(vec!["sass: bad".to_string()]),
            TaskResult::failed("scripts", "jsmin: js/a.js: bad".to_string(), Duration::ZERO),
            TaskResult::skipped("reload"),
        ])
        .with_duration(Duration::from_millis(1500));

        assert_eq!(
            build.summary(),
            "Build failed after 1.50 s: scripts\n  scripts: jsmin: js/a.js: bad\n  not run: reload\n  warning: sass: bad"
        );
    }
}
