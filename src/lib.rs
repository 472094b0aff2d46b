//! # Matrix CI Library / Matrix CI 库
//!
//! This library provides the core functionality for `matrix-ci`, a
//! configuration-driven orchestrator that expands a job's matrix of
//! environments into independent jobs, runs their steps in parallel and
//! reports one overall status.
//!
//! 此库为 `matrix-ci` 提供核心功能，这是一个配置驱动的编排器，
//! 它将作业的环境矩阵展开为独立作业，并行运行其步骤并报告一个总体状态。
//!
//! ## Modules / 模块
//!
//! - `core` - Workflow model, matrix expansion, conditions, planning and the job runner
//! - `infra` - Infrastructure services like process spawning, workspaces and provisioning
//! - `reporting` - Console, HTML and JSON reports
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 工作流模型、矩阵展开、条件、计划和作业运行器
//! - `infra` - 基础设施服务，如进程创建、工作区和环境供应
//! - `reporting` - 控制台、HTML 和 JSON 报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;

/// Picks the best available locale for `requested`.
///
/// The full tag (e.g. "zh-CN") is tried first, then the language part
/// (e.g. "en" from "en-US"), and finally the default language ("en").
///
/// 为 `requested` 选择最合适的可用语言环境。
pub fn resolve_locale(requested: &str) -> String {
    let available_locales = rust_i18n::available_locales!();

    if available_locales.contains(&requested) {
        return requested.to_string();
    }
    requested
        .split(['-', '_'])
        .next()
        .and_then(|lang| {
            available_locales
                .iter()
                .find(|available| available.split('-').next() == Some(lang))
        })
        .map(|lang| lang.to_string())
        .unwrap_or_else(|| "en".to_string())
}

/// Initializes i18n from the system locale and returns the selected locale.
pub fn init() -> String {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let lang = resolve_locale(&locale);
    rust_i18n::set_locale(&lang);
    lang
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_and_partial_locales() {
        assert_eq!(resolve_locale("zh-CN"), "zh-CN");
        assert_eq!(resolve_locale("zh_TW"), "zh-CN");
        assert_eq!(resolve_locale("en-US"), "en");
        assert_eq!(resolve_locale("fr-FR"), "en");
    }
}
