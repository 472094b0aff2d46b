//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command, which plans the workflow,
//! runs every matrix entry and reports one overall status.
//!
//! 此模块实现了 `run` 命令，它规划工作流、运行每个矩阵条目并报告一个总体状态。

use anyhow::{Context, Result};
use colored::*;
use std::{path::Path, path::PathBuf, sync::Arc};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        OverallStatus,
        config::{self, Workflow},
        planner::{self, ExecutionPlan, PlanOptions, Trigger, TriggerEvent},
        scheduler::run_plan,
    },
    infra::{fs::absolute_path, provisioner::LocalProvisioner, t},
    reporting::{
        console::{print_summary, print_unexpected_failure_details},
        html::generate_html_report,
        json::write_json_report,
    },
};

/// Arguments of the `run` subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of entries running at once.
    pub jobs: Option<usize>,
    pub config: PathBuf,
    pub project_dir: PathBuf,
    pub event: Option<TriggerEvent>,
    pub branch: Option<String>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
    /// Run each entry in a temporary copy of the project.
    pub isolate: bool,
    /// Explicit `--lang`, which overrides the workflow's `language`.
    pub lang: Option<String>,
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// The overall status of the run. Configuration errors are returned as
/// errors so the binary can tell them apart from a failed run.
///
/// 使用提供的参数执行运行命令。
pub async fn execute(args: RunArgs) -> Result<OverallStatus> {
    let (workflow, config_path) = load_config(&args.config)?;
    let locale = match &args.lang {
        Some(lang) => crate::resolve_locale(lang),
        None => crate::resolve_locale(&workflow.language),
    };
    rust_i18n::set_locale(&locale);
    let locale = locale.as_str();

    let project_root = absolute_path(&args.project_dir).with_context(|| {
        t!("run.project_dir_not_found", locale = locale, path = args.project_dir.display())
    })?;

    println!(
        "{}",
        t!("run.loading_workflow", locale = locale, path = config_path.display())
    );
    println!(
        "{}",
        t!("run.project_root", locale = locale, path = project_root.display())
    );

    let options = PlanOptions {
        trigger: match (args.event, &args.branch) {
            (Some(event), Some(branch)) => Some(Trigger::new(event, branch.clone())),
            _ => None,
        },
        total_runners: args.total_runners,
        runner_index: args.runner_index,
    };
    let plan = planner::plan_execution(&workflow, &options)
        .with_context(|| t!("run.plan_failed", locale = locale, path = config_path.display()))?;

    if plan.trigger_mismatch {
        if let Some(trigger) = &options.trigger {
            println!(
                "{}",
                t!(
                    "run.trigger_not_matched",
                    locale = locale,
                    event = trigger.event,
                    branch = trigger.branch
                )
                .yellow()
            );
        }
        return Ok(OverallStatus::Success);
    }

    print_plan_overview(&plan, &options, locale);

    if plan.jobs.is_empty() {
        println!("{}", t!("run.no_jobs_to_run", locale = locale).green());
        return Ok(OverallStatus::Success);
    }

    let stop = setup_signal_handler(locale);
    let provisioner = Arc::new(LocalProvisioner::new(&project_root).isolated(args.isolate));
    let concurrency = args.jobs.unwrap_or(num_cpus::get() / 2 + 1);

    let summary = run_plan(plan.jobs, provisioner, concurrency, stop.clone()).await;

    print_summary(&summary, locale);

    if let Some(report_path) = &args.html {
        println!("\n{}", t!("run.html_report", locale = locale, path = report_path.display()));
        if let Err(e) = generate_html_report(&summary, workflow.name.as_deref(), report_path, locale) {
            eprintln!("{} {:#}", t!("run.report_failed", locale = locale).red(), e);
        }
    }
    if let Some(report_path) = &args.json {
        println!("\n{}", t!("run.json_report", locale = locale, path = report_path.display()));
        if let Err(e) = write_json_report(&summary, report_path) {
            eprintln!("{} {:#}", t!("run.report_failed", locale = locale).red(), e);
        }
    }

    let failures = summary.unexpected_failures();
    print_unexpected_failure_details(&failures, locale);

    if stop.is_cancelled() {
        println!("\n{}", t!("run.interrupted", locale = locale).yellow().bold());
        return Ok(OverallStatus::Failure);
    }
    match summary.status {
        OverallStatus::Success => {
            println!("\n{}", t!("run.all_passed", locale = locale).green().bold());
        }
        OverallStatus::Failure => {
            println!(
                "\n{}",
                t!("run.run_failed", locale = locale, count = failures.len()).red().bold()
            );
        }
    }
    Ok(summary.status)
}

/// Loads and structurally validates the workflow file.
pub(crate) fn load_config(config_path_arg: &Path) -> Result<(Workflow, PathBuf)> {
    let workflow = config::load_workflow(config_path_arg)
        .with_context(|| t!("run.config_load_failed", path = config_path_arg.display()))?;
    let config_path = absolute_path(config_path_arg)?;
    Ok((workflow, config_path))
}

fn print_plan_overview(plan: &ExecutionPlan, options: &PlanOptions, locale: &str) {
    if let Some(trigger) = &options.trigger {
        println!(
            "{}",
            t!("run.triggered_by", locale = locale, event = trigger.event, branch = trigger.branch).cyan()
        );
    }
    if plan.gated_entries > 0 {
        println!(
            "{}",
            t!("run.gated_entries", locale = locale, count = plan.gated_entries).cyan()
        );
    }
    if plan.optional_entries > 0 {
        println!(
            "{}",
            t!("run.optional_entries", locale = locale, count = plan.optional_entries).yellow()
        );
    }

    if let (true, Some(total), Some(index)) = (plan.is_distributed, options.total_runners, options.runner_index) {
        println!(
            "{}",
            t!(
                "run.split_runner",
                locale = locale,
                index = index + 1,
                total = total,
                count = plan.jobs.len(),
                all = plan.total_entries
            )
            .bold()
        );
    } else {
        println!(
            "{}",
            t!("run.single_runner", locale = locale, count = plan.jobs.len()).bold()
        );
    }
}

/// Sets up a signal handler for graceful shutdown.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("\n{}", t!("run.shutdown_signal", locale = &locale).yellow());
                token_clone.cancel();
            }
            Err(e) => {
                eprintln!("{}", t!("run.signal_unavailable", locale = &locale, error = e).yellow());
            }
        }
    });

    token
}
