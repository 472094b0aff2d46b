//! # Parallel Scheduling / 并行调度
//!
//! Runs every planned job as its own task, bounded by a concurrency limit.
//! Jobs share no state. The only cross-job signal is cancellation: the
//! global stop token (Ctrl-C) and, for `fail_fast` job families, a family
//! token cancelled by the first required failure.
//!
//! 将每个计划作业作为独立任务运行，受并发限制约束。作业之间不共享状态。
//! 唯一的跨作业信号是取消：全局停止令牌（Ctrl-C），以及 `fail_fast` 作业族的族令牌。

use colored::*;
use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::aggregator::{ResultAggregator, RunSummary};
use crate::core::execution::run_job;
use crate::core::models::{JobResult, JobStatus, SETUP_STEP_NAME, StepOutcome, StepStatus};
use crate::core::planner::PlannedJob;
use crate::infra::provisioner::Provisioner;
use crate::infra::t;

/// Runs `jobs` with at most `concurrency` in flight and aggregates their results.
///
/// # Arguments
/// * `jobs` - The planned jobs, in plan order
/// * `provisioner` - Supplies one environment per job
/// * `concurrency` - Maximum number of jobs running at once (at least 1)
/// * `stop` - Global cancellation, e.g. from a Ctrl-C handler
///
/// 以最多 `concurrency` 个并发运行 `jobs` 并聚合它们的结果。
pub async fn run_plan(
    jobs: Vec<PlannedJob>,
    provisioner: Arc<dyn Provisioner>,
    concurrency: usize,
    stop: CancellationToken,
) -> RunSummary {
    let started = Instant::now();
    let mut family_tokens: HashMap<String, CancellationToken> = HashMap::new();

    let tasks = jobs
        .into_iter()
        .enumerate()
        .map(|(position, job)| {
            let family_token = if job.fail_fast {
                Some(
                    family_tokens
                        .entry(job.entry.job.clone())
                        .or_insert_with(|| stop.child_token())
                        .clone(),
                )
            } else {
                None
            };
            let token = family_token.clone().unwrap_or_else(|| stop.clone());
            let provisioner = Arc::clone(&provisioner);
            let entry = job.entry.clone();
            let required = job.required;

            async move {
                let handle = tokio::spawn(async move {
                    run_job(job, provisioner.as_ref(), token).await
                });

                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        let mut result = JobResult::started(entry, required);
                        result.record(StepOutcome {
                            status: StepStatus::Failure,
                            output: t!("run.job_panicked", error = e).to_string(),
                            ..StepOutcome::skipped(SETUP_STEP_NAME)
                        });
                        result.finish(JobStatus::Failure, Duration::ZERO)
                    }
                };

                if let Some(family_token) = family_token {
                    let first_failure = result.is_unexpected_failure()
                        && result.status != JobStatus::Cancelled
                        && !family_token.is_cancelled();
                    if first_failure {
                        println!(
                            "{}",
                            t!("run.fail_fast_triggered", name = result.name()).yellow()
                        );
                        family_token.cancel();
                    }
                }

                (position, result)
            }
        })
        .collect::<Vec<_>>();

    let mut aggregator = ResultAggregator::new();
    let mut results = stream::iter(tasks).buffer_unordered(concurrency.max(1));
    while let Some((position, result)) = results.next().await {
        aggregator.record(position, result);
    }

    aggregator.finish(started.elapsed())
}
