//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders a self-contained HTML report of a run with `maud`: summary
//! counters, one row per matrix entry, and the step log of every failing
//! entry behind a toggle.
//!
//! 使用 `maud` 渲染运行的独立 HTML 报告：汇总计数、每个矩阵条目一行，
//! 以及每个失败条目的步骤日志（可展开查看）。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

use crate::core::aggregator::RunSummary;
use crate::core::models::{JobResult, JobStatus, StepStatus};
use crate::infra::t;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 2em; color: #24292f; }
h1 { font-size: 1.6em; }
.meta { color: #57606a; margin-bottom: 1.5em; }
.summary-container { display: flex; gap: 1.5em; margin-bottom: 2em; }
.summary-item { display: flex; flex-direction: column; align-items: center; padding: 0.8em 1.4em; border: 1px solid #d0d7de; border-radius: 6px; }
.summary-item .count { font-size: 1.8em; font-weight: 600; }
.summary-item .label { color: #57606a; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: 0.5em 0.8em; border-bottom: 1px solid #d0d7de; vertical-align: top; }
.status-cell { display: inline-block; padding: 0.1em 0.6em; border-radius: 1em; font-weight: 600; }
.status-success { background: #dafbe1; color: #1a7f37; }
.status-failure { background: #ffebe9; color: #cf222e; }
.status-timeout { background: #fff1e5; color: #bc4c00; }
.status-cancelled { background: #fff8c5; color: #9a6700; }
.status-skipped { background: #eaeef2; color: #57606a; }
.allowed { color: #9a6700; font-size: 0.85em; margin-left: 0.5em; }
.output-toggle { cursor: pointer; color: #0969da; font-size: 0.85em; margin-top: 0.3em; }
.output-content { background: #f6f8fa; padding: 1em; overflow-x: auto; white-space: pre-wrap; }
.steps { margin: 0; padding-left: 1.2em; color: #57606a; font-size: 0.9em; }
"#;

/// Embedded JavaScript for HTML report interactivity / HTML 报告交互性的嵌入式 JavaScript
const HTML_SCRIPT: &str = r#"
function toggleOutput(id) {
  var row = document.getElementById(id);
  row.style.display = row.style.display === 'none' ? 'table-row' : 'none';
}
"#;

/// Generates an HTML report from a run summary and writes it to `output_path`.
///
/// # Arguments / 参数
/// * `summary` - The finished run
/// * `title` - The workflow's display name, if any
/// * `output_path` - Where the report is written
/// * `locale` - The locale for labels
///
/// # Errors / 错误
/// Returns an error if the file cannot be written.
///
/// 从运行摘要生成 HTML 报告并写入 `output_path`。
pub fn generate_html_report(
    summary: &RunSummary,
    title: Option<&str>,
    output_path: &Path,
    locale: &str,
) -> Result<()> {
    let markup = render_report(summary, title, locale);
    fs::write(output_path, markup.into_string())
        .with_context(|| format!("Failed to write HTML report to {}", output_path.display()))
}

/// Renders the report without writing it.
pub fn render_report(summary: &RunSummary, title: Option<&str>, locale: &str) -> Markup {
    let heading = title
        .map(|name| t!("html_report.title_named", locale = locale, name = name).to_string())
        .unwrap_or_else(|| t!("html_report.title", locale = locale).to_string());
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string();
    let counts = &summary.counts;

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (heading) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (heading) }
                div class="meta" {
                    (t!("html_report.generated_at", locale = locale, time = generated))
                    " · "
                    (t!("html_report.overall", locale = locale, status = summary_status(summary, locale)))
                    " · "
                    (format!("{:.2}s", summary.wall_time.as_secs_f64()))
                }
                div class="summary-container" {
                    (summary_item(counts.total, "", &t!("html_report.summary.total", locale = locale)))
                    (summary_item(counts.success, "status-success", &t!("html_report.summary.passed", locale = locale)))
                    (summary_item(counts.failure + counts.timeout + counts.cancelled, "status-failure", &t!("html_report.summary.failed", locale = locale)))
                    (summary_item(counts.skipped, "status-skipped", &t!("html_report.summary.skipped", locale = locale)))
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.name", locale = locale)) }
                            th { (t!("html_report.table.image", locale = locale)) }
                            th { (t!("html_report.table.status", locale = locale)) }
                            th { (t!("html_report.table.duration", locale = locale)) }
                            th { (t!("html_report.table.steps", locale = locale)) }
                        }
                    }
                    tbody {
                        @for (i, result) in summary.results.iter().enumerate() {
                            (result_rows(i, result, locale))
                        }
                    }
                }
                script { (PreEscaped(HTML_SCRIPT)) }
            }
        }
    }
}

fn summary_status(summary: &RunSummary, locale: &str) -> String {
    match summary.status {
        crate::core::OverallStatus::Success => JobStatus::Success.label(locale),
        crate::core::OverallStatus::Failure => JobStatus::Failure.label(locale),
    }
}

fn summary_item(count: usize, class: &str, label: &str) -> Markup {
    html! {
        div class="summary-item" {
            span class={ "count " (class) } { (count) }
            span class="label" { (label) }
        }
    }
}

fn result_rows(i: usize, result: &JobResult, locale: &str) -> Markup {
    let output_id = format!("output-{i}");
    let duration = if result.status == JobStatus::Skipped {
        "N/A".to_string()
    } else {
        format!("{:.2}s", result.duration.as_secs_f64())
    };
    let failing = result.status.is_failing();

    html! {
        tr {
            td { (result.name()) }
            td { (result.image.as_deref().unwrap_or("-")) }
            td {
                div class={ "status-cell " (result.status.css_class()) } { (result.status.label(locale)) }
                @if result.is_allowed_failure() {
                    span class="allowed" { (t!("summary.allowed_failure", locale = locale)) }
                }
                @if failing {
                    div class="output-toggle" onclick=(format!("toggleOutput('{output_id}')")) {
                        (t!("html_report.toggle_output", locale = locale))
                    }
                }
            }
            td { (duration) }
            td {
                ul class="steps" {
                    @for step in &result.steps {
                        li {
                            (step.name) ": " (step_label(step.status, locale))
                            @if step.ignored_failure {
                                " (" (t!("html_report.ignored", locale = locale)) ")"
                            }
                        }
                    }
                }
            }
        }
        @if failing {
            tr id=(output_id) style="display:none;" {
                td colspan="5" {
                    pre class="output-content" { (result.log()) }
                }
            }
        }
    }
}

fn step_label(status: StepStatus, locale: &str) -> String {
    let status = match status {
        StepStatus::Success => JobStatus::Success,
        StepStatus::Failure => JobStatus::Failure,
        StepStatus::Skipped => JobStatus::Skipped,
        StepStatus::Timeout => JobStatus::Timeout,
        StepStatus::Cancelled => JobStatus::Cancelled,
    };
    status.label(locale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregator::ResultAggregator;
    use crate::core::matrix::{Bindings, MatrixEntry};
    use crate::core::models::StepOutcome;
    use std::time::Duration;

    #[test]
    fn report_escapes_output_and_lists_entries() {
        let bindings = Bindings::from([("img".to_string(), "A".to_string())]);
        let mut failed = JobResult::started(MatrixEntry::new("test", 0, bindings), true);
        failed.record(StepOutcome {
            status: StepStatus::Failure,
            exit_code: Some(1),
            output: "<script>alert(1)</script>".to_string(),
            ..StepOutcome::skipped("pytest")
        });
        let failed = failed.finish(JobStatus::Failure, Duration::from_secs(2));
        let docs = JobResult::skipped(MatrixEntry::new("docs", 0, Bindings::new()), true);

        let mut agg = ResultAggregator::new();
        agg.record(0, failed);
        agg.record(1, docs);
        let summary = agg.finish(Duration::from_secs(3));

        let html = render_report(&summary, Some("tests"), "en").into_string();
        assert!(html.contains("test (img=A)"));
        assert!(html.contains("docs"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("status-failure"));
    }

    #[test]
    fn writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        let summary = ResultAggregator::new().finish(Duration::ZERO);
        generate_html_report(&summary, None, &path, "en").unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("<!DOCTYPE html>"));
    }
}
