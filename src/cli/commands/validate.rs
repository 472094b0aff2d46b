//! # Validate Command Module / 验证命令模块
//!
//! Loads and plans the workflow without running anything, then prints the
//! expanded matrix.
//!
//! 加载并规划工作流而不运行任何内容，然后打印展开后的矩阵。

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use crate::cli::commands::run::load_config;
use crate::core::planner::{PlanOptions, plan_execution};
use crate::infra::t;
use crate::reporting::console::print_plan;

pub fn execute(config: &Path, lang: Option<&str>) -> Result<()> {
    let (workflow, config_path) = load_config(config)?;
    let locale = crate::resolve_locale(lang.unwrap_or(&workflow.language));
    rust_i18n::set_locale(&locale);
    let locale = locale.as_str();

    let plan = plan_execution(&workflow, &PlanOptions::default())
        .with_context(|| t!("run.plan_failed", locale = locale, path = config_path.display()))?;

    print_plan(&plan, locale);
    println!(
        "\n{}",
        t!(
            "validate.ok",
            locale = locale,
            path = config_path.display(),
            jobs = workflow.jobs.len(),
            entries = plan.total_entries
        )
        .green()
        .bold()
    );
    Ok(())
}
