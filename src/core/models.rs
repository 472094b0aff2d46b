//! # Data Models Module / 数据模型模块
//!
//! Outcome types shared by the job runner, the aggregator and the reporters.
//!
//! 作业运行器、聚合器和报告器共享的结果类型。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::core::matrix::MatrixEntry;
use crate::infra::t;

/// Name of the implicit first step that provisions the environment.
pub const SETUP_STEP_NAME: &str = "Set up environment";

/// Lifecycle of a single job.
/// 单个作业的生命周期。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Provisioning,
    /// Index of the step currently executing.
    Running(usize),
    Finished(JobStatus),
}

/// Terminal status of a job.
/// 作业的终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failure,
    /// The entry never started: its job-level gate was false, or it was
    /// cancelled before starting.
    /// 条目从未启动：作业级门控为假，或在启动前被取消。
    Skipped,
    Timeout,
    /// Stopped while running by fail-fast or an interrupt.
    /// 在运行中被快速失败或中断停止。
    Cancelled,
}

impl JobStatus {
    /// Whether this status fails the run when the entry is required.
    pub fn is_failing(self) -> bool {
        matches!(
            self,
            JobStatus::Failure | JobStatus::Timeout | JobStatus::Cancelled
        )
    }

    pub fn label(self, locale: &str) -> String {
        match self {
            JobStatus::Success => t!("status.success", locale = locale).to_string(),
            JobStatus::Failure => t!("status.failure", locale = locale).to_string(),
            JobStatus::Skipped => t!("status.skipped", locale = locale).to_string(),
            JobStatus::Timeout => t!("status.timeout", locale = locale).to_string(),
            JobStatus::Cancelled => t!("status.cancelled", locale = locale).to_string(),
        }
    }

    /// CSS class used by the HTML report.
    pub fn css_class(self) -> &'static str {
        match self {
            JobStatus::Success => "status-success",
            JobStatus::Failure => "status-failure",
            JobStatus::Skipped => "status-skipped",
            JobStatus::Timeout => "status-timeout",
            JobStatus::Cancelled => "status-cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Skipped => "skipped",
            JobStatus::Timeout => "timeout",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
    /// Gated off by its condition. Never affects the job status.
    /// 被其条件门控关闭。从不影响作业状态。
    Skipped,
    Timeout,
    Cancelled,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Success => "success",
            StepStatus::Failure => "failure",
            StepStatus::Skipped => "skipped",
            StepStatus::Timeout => "timeout",
            StepStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What happened to one step of one job.
/// 一个作业中一个步骤的结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,
    pub status: StepStatus,
    /// Exit code of the step process, when it exited on its own.
    pub exit_code: Option<i32>,
    /// The interpolated command, for the logs.
    #[serde(default)]
    pub command: String,
    /// Combined stdout and stderr.
    pub output: String,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// The step failed but was marked `continue_on_error`.
    #[serde(default)]
    pub ignored_failure: bool,
}

impl StepOutcome {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Skipped,
            exit_code: None,
            command: String::new(),
            output: String::new(),
            duration: Duration::ZERO,
            ignored_failure: false,
        }
    }
}

/// Outcome of one matrix entry.
///
/// Created when the job starts, appended to as each step completes and
/// finalized with [`JobResult::finish`].
///
/// 一个矩阵条目的结果。在作业开始时创建，每个步骤完成时追加，并通过 [`JobResult::finish`] 最终确定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub entry: MatrixEntry,
    pub status: JobStatus,
    pub steps: Vec<StepOutcome>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// `false` when the entry matched its job's `allow_failure` condition.
    pub required: bool,
    /// Image the environment was provisioned for, if any.
    #[serde(default)]
    pub image: Option<String>,
}

impl JobResult {
    /// A result in progress. Its status is `Success` until a step says otherwise.
    pub fn started(entry: MatrixEntry, required: bool) -> Self {
        Self {
            entry,
            status: JobStatus::Success,
            steps: Vec::new(),
            duration: Duration::ZERO,
            required,
            image: None,
        }
    }

    /// A result for an entry that never ran.
    pub fn skipped(entry: MatrixEntry, required: bool) -> Self {
        Self {
            status: JobStatus::Skipped,
            ..Self::started(entry, required)
        }
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.steps.push(outcome);
    }

    pub fn finish(mut self, status: JobStatus, duration: Duration) -> Self {
        self.status = status;
        self.duration = duration;
        self
    }

    pub fn name(&self) -> String {
        self.entry.display_name()
    }

    /// A failing status on an entry whose failure is not allowed.
    /// 不允许失败的条目上的失败状态。
    pub fn is_unexpected_failure(&self) -> bool {
        self.required && self.status.is_failing()
    }

    pub fn is_allowed_failure(&self) -> bool {
        !self.required && self.status.is_failing()
    }

    /// The last step that did not succeed, if any.
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().rev().find(|s| {
            matches!(
                s.status,
                StepStatus::Failure | StepStatus::Timeout | StepStatus::Cancelled
            ) && !s.ignored_failure
        })
    }

    /// Full log of the job: every executed step's command and output.
    pub fn log(&self) -> String {
        let mut log = String::new();
        for step in &self.steps {
            log.push_str(&format!("==> {} [{}]\n", step.name, step.status));
            if !step.command.is_empty() {
                log.push_str(&format!("$ {}\n", step.command));
            }
            log.push_str(&step.output);
            if !step.output.is_empty() && !step.output.ends_with('\n') {
                log.push('\n');
            }
        }
        log
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
