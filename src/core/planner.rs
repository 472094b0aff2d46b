//! # Execution Planner Module / 执行计划模块
//!
//! Turns a workflow into a list of fully resolved jobs: trigger matching,
//! matrix expansion, condition parsing and checking, interpolation of every
//! template, and optional distribution across runners. Every configuration
//! error surfaces here, before a single job starts.
//!
//! 将工作流转换为完全解析的作业列表：触发器匹配、矩阵展开、条件解析和检查、
//! 所有模板的插值，以及可选的多运行器分配。所有配置错误都在此处暴露，早于任何作业启动。

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::core::condition::{self, Condition};
use crate::core::config::{JobConfig, StepConfig, Triggers, Workflow, validate_structure};
use crate::core::error::{ConfigError, ConfigResult};
use crate::core::interpolate::{interpolate, interpolate_map};
use crate::core::matrix::{MatrixEntry, expand_job};
use crate::infra::command::Shell;

/// Kind of event that launched the run.
/// 启动运行的事件类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Push,
    PullRequest,
}

impl FromStr for TriggerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(TriggerEvent::Push),
            "pull_request" | "pull-request" | "pr" => Ok(TriggerEvent::PullRequest),
            other => Err(format!(
                "unknown event '{other}', expected 'push' or 'pull_request'"
            )),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Push => f.write_str("push"),
            TriggerEvent::PullRequest => f.write_str("pull_request"),
        }
    }
}

/// An event on a branch (the pushed branch, or the pull request's target branch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub event: TriggerEvent,
    pub branch: String,
}

impl Trigger {
    pub fn new(event: TriggerEvent, branch: impl Into<String>) -> Self {
        Self {
            event,
            branch: branch.into(),
        }
    }

    /// Whether the workflow's `[on]` table accepts this event.
    pub fn matches(&self, on: &Triggers) -> bool {
        let filter = match self.event {
            TriggerEvent::Push => on.push.as_ref(),
            TriggerEvent::PullRequest => on.pull_request.as_ref(),
        };
        filter.is_some_and(|f| f.matches(&self.branch))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// `None` is a manual run, which always proceeds.
    pub trigger: Option<Trigger>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
}

/// A step with every template resolved for one entry.
/// 为一个条目解析了所有模板的步骤。
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub name: String,
    pub script: String,
    pub condition: Option<Condition>,
    pub continue_on_error: bool,
    /// Step-level variables; they override the job's.
    pub env: Vec<(String, String)>,
    pub shell: Shell,
    pub working_directory: Option<String>,
}

/// One entry of one job family, ready to run.
/// 一个作业族中的一个条目，准备运行。
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub entry: MatrixEntry,
    pub image: Option<String>,
    /// Result of the job-level `if`.
    pub enabled: bool,
    /// `false` when `allow_failure` matched this entry.
    pub required: bool,
    pub timeout: Duration,
    pub fail_fast: bool,
    /// Workflow and job variables, job values winning.
    pub env: Vec<(String, String)>,
    pub steps: Vec<PlannedStep>,
}

impl PlannedJob {
    pub fn name(&self) -> String {
        self.entry.display_name()
    }
}

/// Represents a complete execution plan for a workflow.
/// 表示工作流的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    pub jobs: Vec<PlannedJob>,
    /// Entries across all job families before distribution.
    pub total_entries: usize,
    /// Entries whose job-level gate was false.
    pub gated_entries: usize,
    /// Entries allowed to fail.
    pub optional_entries: usize,
    pub is_distributed: bool,
    /// The trigger did not match `[on]`; nothing will run.
    pub trigger_mismatch: bool,
}

/// Creates an execution plan for the given workflow.
///
/// The whole workflow is validated even when the trigger does not match, so
/// configuration errors are never hidden by an unrelated event.
///
/// 为给定的工作流创建执行计划。即使触发器不匹配，也会验证整个工作流。
pub fn plan_execution(workflow: &Workflow, options: &PlanOptions) -> ConfigResult<ExecutionPlan> {
    validate_structure(workflow)?;

    let mut jobs = Vec::new();
    for job in &workflow.jobs {
        jobs.extend(plan_job(workflow, job)?);
    }

    let total_entries = jobs.len();
    let gated_entries = jobs.iter().filter(|j| !j.enabled).count();
    let optional_entries = jobs.iter().filter(|j| !j.required).count();

    let trigger_mismatch = options
        .trigger
        .as_ref()
        .is_some_and(|trigger| !trigger.matches(&workflow.on));
    if trigger_mismatch {
        jobs.clear();
    }

    let (jobs, is_distributed) = match (options.total_runners, options.runner_index) {
        (Some(total), Some(index)) => {
            if index >= total {
                return Err(ConfigError::RunnerIndexOutOfRange { index, total });
            }
            let distributed = jobs
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total == index)
                .map(|(_, job)| job)
                .collect();
            (distributed, true)
        }
        (None, None) => (jobs, false),
        _ => return Err(ConfigError::IncompleteSharding),
    };

    Ok(ExecutionPlan {
        jobs,
        total_entries,
        gated_entries,
        optional_entries,
        is_distributed,
        trigger_mismatch,
    })
}

fn parse_optional(expr: Option<&str>) -> ConfigResult<Option<Condition>> {
    expr.map(condition::parse).transpose()
}

fn plan_job(workflow: &Workflow, job: &JobConfig) -> ConfigResult<Vec<PlannedJob>> {
    let entries = expand_job(job)?;
    let gate = parse_optional(job.condition.as_deref())?;
    let allow_failure = parse_optional(job.allow_failure.as_deref())?;
    let step_conditions = job
        .steps
        .iter()
        .map(|s| parse_optional(s.condition.as_deref()))
        .collect::<ConfigResult<Vec<_>>>()?;

    entries
        .into_iter()
        .map(|entry| {
            let display = entry.display_name();
            plan_entry(workflow, job, &gate, &allow_failure, &step_conditions, entry)
                .map_err(|e| e.in_entry(&job.name, &display))
        })
        .collect()
}

fn plan_entry(
    workflow: &Workflow,
    job: &JobConfig,
    gate: &Option<Condition>,
    allow_failure: &Option<Condition>,
    step_conditions: &[Option<Condition>],
    entry: MatrixEntry,
) -> ConfigResult<PlannedJob> {
    let bindings = &entry.bindings;

    let enabled = match gate {
        Some(gate) => gate.evaluate(bindings)?,
        None => true,
    };
    let required = match allow_failure {
        Some(cond) => !cond.evaluate(bindings)?,
        None => true,
    };

    let image = job
        .image
        .as_deref()
        .map(|image| interpolate(image, bindings))
        .transpose()?;

    let mut env = interpolate_map(&workflow.env, bindings)?;
    for (key, value) in interpolate_map(&job.env, bindings)? {
        env.retain(|(k, _)| *k != key);
        env.push((key, value));
    }

    let steps = job
        .steps
        .iter()
        .zip(step_conditions)
        .map(|(step, cond)| plan_step(workflow, job, step, cond.clone(), &entry))
        .collect::<ConfigResult<Vec<_>>>()?;

    Ok(PlannedJob {
        image,
        enabled,
        required,
        timeout: job.timeout(),
        fail_fast: job.fail_fast,
        env,
        steps,
        entry,
    })
}

fn plan_step(
    workflow: &Workflow,
    job: &JobConfig,
    step: &StepConfig,
    condition: Option<Condition>,
    entry: &MatrixEntry,
) -> ConfigResult<PlannedStep> {
    let bindings = &entry.bindings;
    if let Some(cond) = &condition {
        cond.check_bindings(bindings)?;
    }

    let shell = Shell::resolve(&[
        step.shell.as_deref(),
        job.shell.as_deref(),
        workflow.shell.as_deref(),
    ])?;

    Ok(PlannedStep {
        name: interpolate(&step.display_name(), bindings)?,
        script: interpolate(&step.run, bindings)?,
        condition,
        continue_on_error: step.continue_on_error,
        env: interpolate_map(&step.env, bindings)?,
        shell,
        working_directory: step
            .working_directory
            .as_deref()
            .map(|dir| interpolate(dir, bindings))
            .transpose()?,
    })
}
