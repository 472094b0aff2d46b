//! # JSON Reporting Module / JSON 报告模块
//!
//! Machine-readable run summary for downstream tooling.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::core::aggregator::RunSummary;

/// Serializes `summary` as pretty-printed JSON into `output_path`.
/// 将 `summary` 序列化为格式化的 JSON 并写入 `output_path`。
pub fn write_json_report(summary: &RunSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))
}
