//! # Job Execution Engine Module / 作业执行引擎模块
//!
//! Runs one planned matrix entry: provisioning, then each step in declared
//! order, under a single per-job deadline and a cancellation token.
//!
//! ```text
//! pending → provisioning → running(step_i) → { success | failure | timeout | cancelled }
//! ```
//!
//! 运行一个计划好的矩阵条目：先供应环境，然后按声明顺序执行每个步骤，
//! 受单个作业截止时间和取消令牌的约束。

use colored::*;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::models::{
    JobResult, JobState, JobStatus, SETUP_STEP_NAME, StepOutcome, StepStatus,
};
use crate::core::planner::{PlannedJob, PlannedStep};
use crate::infra::command::spawn_and_capture;
use crate::infra::fs::resolve_working_dir;
use crate::infra::provisioner::{Environment, Provisioner};
use crate::infra::t;

/// Stand-in deadline when a job's ceiling does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// How a single step process ended.
enum StepRun {
    Exited(std::io::Result<ExitStatus>, String),
    TimedOut,
    Cancelled,
}

/// Drives one job through its state machine.
/// 驱动一个作业完成其状态机。
pub struct JobRunner<'a> {
    job: PlannedJob,
    provisioner: &'a dyn Provisioner,
    cancel: CancellationToken,
    state: JobState,
}

impl<'a> JobRunner<'a> {
    pub fn new(job: PlannedJob, provisioner: &'a dyn Provisioner, cancel: CancellationToken) -> Self {
        Self {
            job,
            provisioner,
            cancel,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Runs the job to a terminal state and returns its finalized result.
    ///
    /// The environment is torn down whatever the outcome.
    ///
    /// 将作业运行到终止状态并返回其最终结果。无论结果如何，环境都会被拆除。
    pub async fn run(&mut self) -> JobResult {
        let name = self.job.name();
        let entry = self.job.entry.clone();
        let required = self.job.required;

        if !self.job.enabled {
            println!("{}", t!("run.job_gated", name = name).dimmed());
            return self.finish(JobResult::skipped(entry, required), JobStatus::Skipped, Duration::ZERO);
        }
        if self.cancel.is_cancelled() {
            println!("{}", t!("run.job_skipped_cancelled", name = name).dimmed());
            return self.finish(JobResult::skipped(entry, required), JobStatus::Skipped, Duration::ZERO);
        }

        let started = Instant::now();
        let deadline = started
            .checked_add(self.job.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut result = JobResult::started(entry, required);

        println!("{}", t!("run.job_started", name = name).blue());
        self.state = JobState::Provisioning;

        let env = match self.provision(deadline).await {
            Ok(env) => env,
            Err((outcome, status)) => {
                result.record(outcome);
                let elapsed = started.elapsed();
                self.report_end(&name, status, elapsed);
                return self.finish(result, status, elapsed);
            }
        };
        result.image = env.image.clone();

        let status = self.run_steps(&env, &mut result, deadline).await;
        self.provisioner.teardown(env).await;

        let elapsed = started.elapsed();
        self.report_end(&name, status, elapsed);
        self.finish(result, status, elapsed)
    }

    fn finish(&mut self, result: JobResult, status: JobStatus, duration: Duration) -> JobResult {
        self.state = JobState::Finished(status);
        result.finish(status, duration)
    }

    /// Provisioning counts as the implicit first step: its failure, timeout
    /// or cancellation is recorded under [`SETUP_STEP_NAME`].
    async fn provision(&self, deadline: Instant) -> Result<Environment, (StepOutcome, JobStatus)> {
        let started = Instant::now();
        let image = self.job.image.as_deref();
        let setup_outcome = |status: StepStatus, output: String| StepOutcome {
            status,
            output,
            duration: started.elapsed(),
            ..StepOutcome::skipped(SETUP_STEP_NAME)
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err((
                setup_outcome(StepStatus::Cancelled, String::new()),
                JobStatus::Cancelled,
            )),
            res = tokio::time::timeout_at(deadline, self.provisioner.provision(&self.job.entry, image)) => match res {
                Ok(Ok(env)) => Ok(env),
                Ok(Err(e)) => {
                    println!("{}", t!("run.provision_failed", name = self.job.name(), error = format!("{e:#}")).red());
                    Err((setup_outcome(StepStatus::Failure, format!("{e:#}")), JobStatus::Failure))
                }
                Err(_) => Err((
                    setup_outcome(StepStatus::Timeout, t!("run.timeout_message").to_string()),
                    JobStatus::Timeout,
                )),
            },
        }
    }

    async fn run_steps(&mut self, env: &Environment, result: &mut JobResult, deadline: Instant) -> JobStatus {
        let name = self.job.name();
        let steps = self.job.steps.clone();

        for (index, step) in steps.iter().enumerate() {
            match &step.condition {
                Some(cond) => match cond.evaluate(&self.job.entry.bindings) {
                    Ok(true) => {}
                    Ok(false) => {
                        println!("{}", t!("run.step_skipped", job = name, step = step.name).dimmed());
                        result.record(StepOutcome::skipped(&step.name));
                        continue;
                    }
                    Err(e) => {
                        result.record(StepOutcome {
                            status: StepStatus::Failure,
                            output: e.to_string(),
                            ..StepOutcome::skipped(&step.name)
                        });
                        return JobStatus::Failure;
                    }
                },
                None => {}
            }

            if Instant::now() >= deadline {
                println!("{}", t!("run.job_timeout", name = name, timeout = self.job.timeout.as_secs()).red());
                return JobStatus::Timeout;
            }
            if self.cancel.is_cancelled() {
                return JobStatus::Cancelled;
            }

            self.state = JobState::Running(index);
            let outcome = self.run_step(step, env, deadline).await;
            let status = outcome.status;
            let ignored = outcome.ignored_failure;
            result.record(outcome);

            match status {
                StepStatus::Success | StepStatus::Skipped => {}
                StepStatus::Failure if ignored => {}
                StepStatus::Failure => return JobStatus::Failure,
                StepStatus::Timeout => {
                    println!("{}", t!("run.job_timeout", name = name, timeout = self.job.timeout.as_secs()).red());
                    return JobStatus::Timeout;
                }
                StepStatus::Cancelled => return JobStatus::Cancelled,
            }
        }
        JobStatus::Success
    }

    async fn run_step(&self, step: &PlannedStep, env: &Environment, deadline: Instant) -> StepOutcome {
        let started = Instant::now();
        let mut outcome = StepOutcome {
            command: step.script.clone(),
            ..StepOutcome::skipped(&step.name)
        };

        let workdir = match resolve_working_dir(&env.workdir, step.working_directory.as_deref()) {
            Ok(dir) => dir,
            Err(e) => {
                outcome.status = StepStatus::Failure;
                outcome.output = format!("{e:#}");
                return self.settle(step, outcome, started);
            }
        };

        let mut cmd = step.shell.command(&step.script);
        cmd.current_dir(&workdir)
            .envs(env.vars.iter().map(|(k, v)| (k, v)))
            .envs(self.job.env.iter().map(|(k, v)| (k, v)))
            .envs(step.env.iter().map(|(k, v)| (k, v)));

        let run = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => StepRun::Cancelled,
            res = tokio::time::timeout_at(deadline, spawn_and_capture(cmd)) => match res {
                Ok((status, output)) => StepRun::Exited(status, output),
                Err(_) => StepRun::TimedOut,
            },
        };

        match run {
            StepRun::Exited(Ok(status), output) => {
                outcome.exit_code = status.code();
                outcome.output = output;
                outcome.status = if status.success() {
                    StepStatus::Success
                } else {
                    StepStatus::Failure
                };
            }
            StepRun::Exited(Err(e), output) => {
                outcome.status = StepStatus::Failure;
                outcome.output = format!(
                    "{}\n{output}",
                    t!("run.spawn_failed", program = step.shell.program, error = e)
                );
            }
            StepRun::TimedOut => {
                outcome.status = StepStatus::Timeout;
                outcome.output = t!("run.timeout_message").to_string();
            }
            StepRun::Cancelled => {
                outcome.status = StepStatus::Cancelled;
                outcome.output = t!("run.cancelled_message").to_string();
            }
        }

        self.settle(step, outcome, started)
    }

    fn settle(&self, step: &PlannedStep, mut outcome: StepOutcome, started: Instant) -> StepOutcome {
        outcome.duration = started.elapsed();
        if outcome.status == StepStatus::Failure && step.continue_on_error {
            outcome.ignored_failure = true;
        }

        let secs = format!("{:.2}", outcome.duration.as_secs_f64());
        let line = match outcome.status {
            StepStatus::Success => t!("run.step_passed", job = self.job.name(), step = step.name, duration = secs).green(),
            StepStatus::Failure if outcome.ignored_failure => {
                t!("run.step_failed_ignored", job = self.job.name(), step = step.name, duration = secs).yellow()
            }
            StepStatus::Failure => t!("run.step_failed", job = self.job.name(), step = step.name, duration = secs).red(),
            StepStatus::Timeout => t!("run.step_timeout", job = self.job.name(), step = step.name).red(),
            StepStatus::Cancelled => t!("run.step_cancelled", job = self.job.name(), step = step.name).yellow(),
            StepStatus::Skipped => t!("run.step_skipped", job = self.job.name(), step = step.name).dimmed(),
        };
        println!("{line}");
        outcome
    }

    fn report_end(&self, name: &str, status: JobStatus, elapsed: Duration) {
        let secs = format!("{:.2}", elapsed.as_secs_f64());
        let line = match status {
            JobStatus::Success => t!("run.job_passed", name = name, duration = secs).green(),
            JobStatus::Failure => t!("run.job_failed", name = name, duration = secs).red(),
            JobStatus::Timeout => t!("run.job_timed_out", name = name, duration = secs).red(),
            JobStatus::Cancelled => t!("run.job_cancelled", name = name).yellow(),
            JobStatus::Skipped => t!("run.job_skipped_cancelled", name = name).dimmed(),
        };
        println!("{line}");
    }
}

/// Convenience wrapper around [`JobRunner`].
pub async fn run_job(job: PlannedJob, provisioner: &dyn Provisioner, cancel: CancellationToken) -> JobResult {
    JobRunner::new(job, provisioner, cancel).run().await
}
