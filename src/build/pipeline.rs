//! Pipeline orchestration.
//!
//! A pipeline is a tree of jobs composed in series or in parallel. Series
//! members run strictly one after another and stop at the first failure.
//! Parallel members start together on the one runtime thread; the
//! composition waits for all of them and fails if any failed.

use crate::build::{check_disjoint, format_duration, BuildContext, BuildResult, ClaimConflict, Job, OutputClaim, TaskResult};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Instant;

/// A composition of jobs.
#[derive(Clone)]
pub enum Pipeline {
    /// A single job
    Job(Arc<dyn Job>),
    /// Members run in order
    Series(Vec<Pipeline>),
    /// Members run concurrently
    Parallel(Vec<Pipeline>),
}

impl Pipeline {
    /// Wrap a job.
    pub fn job(job: impl Job + 'static) -> Self {
        Pipeline::Job(Arc::new(job))
    }

    /// Compose members in series.
    pub fn series(members: impl IntoIterator<Item = Pipeline>) -> Self {
        Pipeline::Series(members.into_iter().collect())
    }

    /// Compose members in parallel.
    ///
    /// Fails when two members may write the same destination path.
    pub fn parallel(members: impl IntoIterator<Item = Pipeline>) -> Result<Self, ClaimConflict> {
        let members: Vec<Pipeline> = members.into_iter().collect();
        let claims: Vec<(String, Vec<OutputClaim>)> = members.iter().map(|m| (m.label(), m.claims())).collect();
        check_disjoint(&claims)?;
        Ok(Pipeline::Parallel(members))
    }

    /// Every output claim held by jobs in this pipeline.
    pub fn claims(&self) -> Vec<OutputClaim> {
        match self {
            Pipeline::Job(job) => job.claims(),
            Pipeline::Series(members) | Pipeline::Parallel(members) => {
                members.iter().flat_map(Pipeline::claims).collect()
            }
        }
    }

    /// Names of the jobs in run order.
    pub fn job_names(&self) -> Vec<String> {
        match self {
            Pipeline::Job(job) => vec![job.name().to_string()],
            Pipeline::Series(members) | Pipeline::Parallel(members) => {
                members.iter().flat_map(Pipeline::job_names).collect()
            }
        }
    }

    /// Human-readable description, e.g. `series(html, reload)`.
    pub fn label(&self) -> String {
        match self {
            Pipeline::Job(job) => job.name().to_string(),
            Pipeline::Series(members) => {
                format!("series({})", members.iter().map(Pipeline::label).collect::<Vec<_>>().join(", "))
            }
            Pipeline::Parallel(members) => {
                format!("parallel({})", members.iter().map(Pipeline::label).collect::<Vec<_>>().join(", "))
            }
        }
    }

    /// Run the pipeline to completion.
    pub async fn execute(&self, ctx: &BuildContext) -> BuildResult {
        let start = Instant::now();
        let result = self.run(ctx).await;
        result.with_duration(start.elapsed())
    }

    fn run<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, BuildResult> {
        async move {
            match self {
                Pipeline::Job(job) => {
                    let mut result = BuildResult::new();
                    result.add_result(run_job(job.as_ref(), ctx).await);
                    result
                }
                Pipeline::Series(members) => {
                    let mut result = BuildResult::new();
                    let mut remaining = members.iter();
                    for member in remaining.by_ref() {
                        let member_result = member.run(ctx).await;
                        let failed = member_result.failed_count() > 0;
                        result.merge(member_result);
                        if failed {
                            break;
                        }
                    }
                    for member in remaining {
                        for name in member.job_names() {
                            result.add_result(TaskResult::skipped(name));
                        }
                    }
                    result
                }
                Pipeline::Parallel(members) => {
                    let mut result = BuildResult::new();
                    for member_result in join_all(members.iter().map(|m| m.run(ctx))).await {
                        result.merge(member_result);
                    }
                    result
                }
            }
        }
        .boxed()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

async fn run_job(job: &dyn Job, ctx: &BuildContext) -> TaskResult {
    let name = job.name();
    let start = Instant::now();
    tracing::info!("Starting '{}'...", name);

    match job.run(ctx).await {
        Ok(output) => {
            let duration = start.elapsed();
            tracing::info!("Finished '{}' after {}", name, format_duration(duration));
            TaskResult::success(name, output.outputs, duration).with_warnings(output.warnings)
        }
        Err(e) => {
            let duration = start.elapsed();
            tracing::error!("'{}' errored after {}", name, format_duration(duration));
            tracing::error!("{}", e);
            TaskResult::failed(name, e.to_string(), duration)
        }
    }
}
