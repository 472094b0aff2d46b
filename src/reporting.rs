//! # Reporting Module / 报告模块
//!
//! This module handles the display and export of run results: colorful,
//! localized summaries on the console, a styled HTML report and a JSON
//! summary.
//!
//! 此模块处理运行结果的显示和导出：控制台上的彩色本地化摘要、
//! 样式化的 HTML 报告和 JSON 摘要。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_summary, print_unexpected_failure_details};
pub use html::generate_html_report;
pub use json::write_json_report;
