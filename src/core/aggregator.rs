//! # Result Aggregation / 结果聚合
//!
//! Collects finalized [`JobResult`]s and decides the overall status of the
//! run. The aggregator is an explicit value handed around by the scheduler,
//! never global state.
//!
//! 收集最终的 [`JobResult`] 并决定运行的总体状态。

use serde::Serialize;
use std::time::Duration;

use crate::core::models::{JobResult, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Success,
    Failure,
}

impl OverallStatus {
    /// Process exit code a calling system observes.
    pub fn exit_code(self) -> u8 {
        match self {
            OverallStatus::Success => 0,
            OverallStatus::Failure => 1,
        }
    }
}

/// Per-status counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub timeout: usize,
    pub cancelled: usize,
    /// Failing entries that were allowed to fail.
    pub allowed_failures: usize,
}

#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Vec<(usize, JobResult)>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the finalized result of the job at plan position `position`.
    /// 记录计划位置 `position` 处作业的最终结果。
    pub fn record(&mut self, position: usize, result: JobResult) {
        self.results.push((position, result));
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Failure if any required entry failed, timed out or was cancelled.
    pub fn overall_status(&self) -> OverallStatus {
        if self.results.iter().any(|(_, r)| r.is_unexpected_failure()) {
            OverallStatus::Failure
        } else {
            OverallStatus::Success
        }
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            total: self.results.len(),
            ..Default::default()
        };
        for (_, result) in &self.results {
            match result.status {
                JobStatus::Success => counts.success += 1,
                JobStatus::Failure => counts.failure += 1,
                JobStatus::Skipped => counts.skipped += 1,
                JobStatus::Timeout => counts.timeout += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
            if result.is_allowed_failure() {
                counts.allowed_failures += 1;
            }
        }
        counts
    }

    /// Consumes the aggregator into a summary with results in plan order.
    pub fn finish(mut self, wall_time: Duration) -> RunSummary {
        let status = self.overall_status();
        let counts = self.counts();
        self.results.sort_by_key(|(position, _)| *position);
        RunSummary {
            status,
            counts,
            wall_time,
            results: self.results.into_iter().map(|(_, r)| r).collect(),
        }
    }
}

/// The final, read-only view of a run.
/// 运行的最终只读视图。
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: OverallStatus,
    pub counts: StatusCounts,
    #[serde(serialize_with = "secs")]
    pub wall_time: Duration,
    pub results: Vec<JobResult>,
}

impl RunSummary {
    pub fn unexpected_failures(&self) -> Vec<&JobResult> {
        self.results
            .iter()
            .filter(|r| r.is_unexpected_failure())
            .collect()
    }
}

fn secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matrix::{Bindings, MatrixEntry};

    fn result(index: usize, status: JobStatus, required: bool) -> JobResult {
        JobResult::started(MatrixEntry::new("test", index, Bindings::new()), required)
            .finish(status, Duration::ZERO)
    }

    #[test]
    fn any_required_failure_fails_the_run() {
        let mut agg = ResultAggregator::new();
        agg.record(0, result(0, JobStatus::Success, true));
        agg.record(1, result(1, JobStatus::Failure, true));
        agg.record(2, result(2, JobStatus::Success, true));
        assert_eq!(agg.overall_status(), OverallStatus::Failure);
        assert_eq!(agg.overall_status().exit_code(), 1);
    }

    #[test]
    fn timeout_counts_as_failure() {
        let mut agg = ResultAggregator::new();
        agg.record(0, result(0, JobStatus::Timeout, true));
        assert_eq!(agg.overall_status(), OverallStatus::Failure);
    }

    #[test]
    fn allowed_failures_and_skips_do_not_fail() {
        let mut agg = ResultAggregator::new();
        agg.record(0, result(0, JobStatus::Success, true));
        agg.record(1, result(1, JobStatus::Failure, false));
        agg.record(2, result(2, JobStatus::Skipped, true));
        assert_eq!(agg.overall_status(), OverallStatus::Success);

        let counts = agg.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.failure, 1);
        assert_eq!(counts.allowed_failures, 1);
        assert_eq!(counts.skipped, 1);
    }

    #[test]
    fn summary_is_in_plan_order() {
        let mut agg = ResultAggregator::new();
        agg.record(2, result(2, JobStatus::Success, true));
        agg.record(0, result(0, JobStatus::Success, true));
        agg.record(1, result(1, JobStatus::Failure, true));

        let summary = agg.finish(Duration::from_secs(1));
        let order: Vec<_> = summary.results.iter().map(|r| r.entry.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(summary.unexpected_failures().len(), 1);
        assert_eq!(summary.status, OverallStatus::Failure);
    }

    #[test]
    fn empty_run_succeeds() {
        let summary = ResultAggregator::new().finish(Duration::ZERO);
        assert_eq!(summary.status, OverallStatus::Success);
        assert!(summary.results.is_empty());
    }
}
