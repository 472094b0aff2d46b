//! # Console Reporting Module / 控制台报告模块
//!
//! Colored, localized summaries printed once every entry has finished.
//!
//! 在每个条目完成后打印的彩色本地化摘要。

use colored::*;

use crate::core::aggregator::RunSummary;
use crate::core::models::{JobResult, JobStatus};
use crate::core::planner::ExecutionPlan;
use crate::infra::t;

/// Prints a table of every entry with its status and duration.
///
/// ```text
/// --- Matrix Summary ---
///   - Success    | test (imgtag=3.8, crypto_ver=3.3)          |      12.31s
///   - Failure    | test (imgtag=2.7, crypto_ver=2.5)          |       4.02s  [pytest]
///   - Skipped    | docs                                       |         N/A
/// ```
pub fn print_summary(summary: &RunSummary, locale: &str) {
    println!("\n{}", t!("summary.banner", locale = locale).bold());

    for result in &summary.results {
        let status_str = result.status.label(locale);
        let status_colored = match result.status {
            JobStatus::Success => status_str.green(),
            JobStatus::Skipped => status_str.dimmed(),
            _ if !result.required => status_str.yellow(),
            _ => status_str.red(),
        };
        let duration_str = if result.status == JobStatus::Skipped {
            "N/A".to_string()
        } else {
            format!("{:.2}s", result.duration.as_secs_f64())
        };
        let failed_step = result
            .failed_step()
            .map(|s| format!(" [{}]", s.name))
            .unwrap_or_default();
        let allowed = if result.is_allowed_failure() {
            format!(" {}", t!("summary.allowed_failure", locale = locale))
        } else {
            String::new()
        };

        println!(
            "  - {:<10} | {:<50} | {:>10}{}{}",
            status_colored,
            result.name(),
            duration_str,
            failed_step,
            allowed.yellow()
        );
    }

    let counts = &summary.counts;
    println!(
        "\n{}",
        t!(
            "summary.counts",
            locale = locale,
            total = counts.total,
            success = counts.success,
            failure = counts.failure,
            timeout = counts.timeout,
            cancelled = counts.cancelled,
            skipped = counts.skipped,
            wall = format!("{:.2}", summary.wall_time.as_secs_f64())
        )
    );
}

/// Prints the log of every failing required entry.
/// Returns early when there is nothing to show.
///
/// 打印每个失败的必需条目的日志。
pub fn print_unexpected_failure_details(failures: &[&JobResult], locale: &str) {
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("summary.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}' ({})",
            i + 1,
            failures.len(),
            t!("summary.failure_header", locale = locale).red(),
            result.name().cyan(),
            result.status.label(locale)
        );

        if let Some(step) = result.failed_step() {
            let exit = step
                .exit_code
                .map(|code| t!("summary.exit_code", locale = locale, code = code).to_string())
                .unwrap_or_default();
            println!(
                "\n--- {} ---\n",
                t!("summary.step_log", locale = locale, step = step.name, exit = exit).yellow()
            );
            if !step.command.is_empty() {
                println!("$ {}", step.command.dimmed());
            }
            println!("{}", step.output.trim_end());
        }
        println!("\n{}", "-".repeat(80));
    }
}

/// Prints the expanded plan, one line per entry, with each step's gate result.
/// Used by `validate`.
pub fn print_plan(plan: &ExecutionPlan, locale: &str) {
    println!(
        "{}",
        t!("validate.plan_header", locale = locale, count = plan.jobs.len()).bold()
    );
    for job in &plan.jobs {
        let mut marks = Vec::new();
        if !job.enabled {
            marks.push(t!("validate.gated", locale = locale).to_string());
        }
        if !job.required {
            marks.push(t!("validate.optional", locale = locale).to_string());
        }
        let marks = if marks.is_empty() {
            String::new()
        } else {
            format!(" ({})", marks.join(", "))
        };
        println!("  - {}{}", job.name().cyan(), marks.yellow());
        if let Some(image) = &job.image {
            println!("      image: {image}");
        }
        for step in &job.steps {
            let runs = step
                .condition
                .as_ref()
                .map(|c| c.evaluate(&job.entry.bindings).unwrap_or(false))
                .unwrap_or(true);
            let mark = if runs { "run ".green() } else { "skip".dimmed() };
            println!("      [{}] {}", mark, step.name);
        }
    }
}
