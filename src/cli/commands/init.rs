//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command, which writes a starter
//! workflow file either from a fixed template or through an interactive
//! wizard.
//!
//! 此模块实现了 `init` 命令，它通过固定模板或交互式向导写入初始工作流文件。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, MultiSelect, theme::ColorfulTheme};
use std::collections::BTreeMap;
use std::{fs, path::Path};

use crate::core::config::{BranchFilter, JobConfig, MatrixConfig, StepConfig, Triggers, Workflow};
use crate::core::planner::{PlanOptions, plan_execution};
use crate::infra::t;

const DEFAULT_WORKFLOW: &str = r#"# Matrix CI Workflow / 矩阵 CI 工作流

# Language for console output / 控制台输出的语言
language = "en"
name = "tests"

# Events that launch the matrix / 启动矩阵的事件
[on.push]
branches = ["main"]

[on.pull_request]
branches = ["main"]

# One job per include entry / 每个 include 条目对应一个作业
[[jobs]]
name = "test"
image = "python:${{ matrix.imgtag }}"
timeout_minutes = 20
fail_fast = false
# Entries matching this condition may fail / 匹配此条件的条目允许失败
allow_failure = "contains(matrix.imgtag, 'rc')"

[jobs.matrix]
name = "python"
keys = ["imgtag", "crypto_ver"]
include = [
    { imgtag = "2.7", crypto_ver = "2.5" },
    { imgtag = "3.8", crypto_ver = "3.3" },
    { imgtag = "3.11", crypto_ver = "41.0" },
    { imgtag = "3.13-rc", crypto_ver = "42.0" },
]

[[jobs.steps]]
name = "Install"
run = "pip install -e . cryptography==${{ matrix.crypto_ver }} pytest"

# Skipped on the 2.7 entry / 在 2.7 条目上跳过
[[jobs.steps]]
name = "Lint"
if = "!contains(matrix.imgtag, '2.7')"
run = "pip install flake8 && flake8 --max-line-length=79 ."

[[jobs.steps]]
name = "Test"
run = "pytest -q"

# A job without a matrix runs once / 没有矩阵的作业只运行一次
[[jobs]]
name = "docs"
image = "python:3.11"
timeout_minutes = 10

[[jobs.steps]]
name = "Build docs"
run = "pip install sphinx && sphinx-build -W sites/docs docs_out"
continue_on_error = true
"#;

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path for the new workflow file
/// * `force` - Whether to overwrite an existing file without asking
/// * `non_interactive` - Write the default template instead of running the wizard
/// * `language` - UI language, also written into the generated workflow
pub fn execute(output: &Path, force: bool, non_interactive: bool, language: &str) -> Result<()> {
    if non_interactive {
        if output.exists() && !force {
            println!("{}", t!("init.file_exists", path = output.display()).red());
            println!("{}", t!("init.use_force").yellow());
            return Ok(());
        }
        let content = DEFAULT_WORKFLOW.replacen(
            "language = \"en\"",
            &format!("language = \"{language}\""),
            1,
        );
        write_workflow(output, &content)?;
    } else {
        run_init_wizard(output, force, language)?;
    }

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init.success", path = output.display()).bold()
    );
    println!("{}", t!("init.next_steps", path = output.display()));
    Ok(())
}

fn write_workflow(output: &Path, content: &str) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| t!("init.create_parent_dir_failed", path = parent.display()))?;
        }
    }
    fs::write(output, content).with_context(|| t!("init.write_failed", path = output.display()))
}

/// Runs the interactive wizard and writes the resulting workflow.
///
/// 运行交互式向导并写入生成的工作流。
fn run_init_wizard(output: &Path, force: bool, language: &str) -> Result<()> {
    let theme = ColorfulTheme::default();
    println!("\n{}", t!("init.wizard_welcome").bold().cyan());
    println!("{}\n", t!("init.wizard_description"));

    if output.exists() && !force {
        let overwrite = Confirm::with_theme(&theme)
            .with_prompt(t!("init.overwrite_prompt", path = output.display()))
            .default(false)
            .interact()
            .context(t!("init.confirmation_failed").to_string())?;
        if !overwrite {
            anyhow::bail!(t!("init.aborted").to_string());
        }
    }

    let versions: String = Input::with_theme(&theme)
        .with_prompt(t!("init.versions_prompt"))
        .default("3.8, 3.11, 3.12".into())
        .interact_text()?;
    let versions: Vec<String> = versions
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    let templates = [
        t!("init.template_install").to_string(),
        t!("init.template_lint").to_string(),
        t!("init.template_test").to_string(),
        t!("init.template_docs").to_string(),
    ];
    let selections = MultiSelect::with_theme(&theme)
        .with_prompt(t!("init.template_prompt"))
        .items(&templates)
        .defaults(&[true, true, true, false])
        .interact()?;

    let mut steps = Vec::new();
    if selections.contains(&0) {
        steps.push(step("Install", "pip install -e . pytest"));
    }
    if selections.contains(&1) {
        steps.push(step("Lint", "pip install flake8 && flake8 ."));
    }
    if selections.contains(&2) {
        let command: String = Input::with_theme(&theme)
            .with_prompt(t!("init.test_command_prompt"))
            .default("pytest -q".into())
            .interact_text()?;
        steps.push(step("Test", &command));
    }
    if steps.is_empty() {
        println!("{}", t!("init.no_steps_selected").yellow());
        steps.push(step("Test", "pytest -q"));
    }

    let workflow = wizard_workflow(language, &versions, steps, selections.contains(&3));
    plan_execution(&workflow, &PlanOptions::default())
        .context(t!("init.invalid_workflow").to_string())?;

    let content = toml::to_string_pretty(&workflow).context(t!("init.serialize_failed").to_string())?;
    write_workflow(output, &content)
}

/// Assembles the wizard's answers into a workflow. Without versions there
/// is no matrix, so the image is pinned instead of interpolated.
fn wizard_workflow(language: &str, versions: &[String], steps: Vec<StepConfig>, with_docs: bool) -> Workflow {
    let matrix = (!versions.is_empty()).then(|| MatrixConfig {
        name: "python".to_string(),
        keys: vec!["python".to_string()],
        include: versions
            .iter()
            .map(|v| BTreeMap::from([("python".to_string(), toml::Value::String(v.clone()))]))
            .collect(),
    });
    let image = if matrix.is_some() {
        "python:${{ matrix.python }}"
    } else {
        "python:3.12"
    };

    let mut jobs = vec![JobConfig {
        image: Some(image.to_string()),
        timeout_minutes: Some(20),
        matrix,
        steps,
        ..job("test")
    }];
    if with_docs {
        jobs.push(JobConfig {
            image: Some("python:3.11".to_string()),
            steps: vec![step("Build docs", "pip install sphinx && sphinx-build -W docs docs_out")],
            ..job("docs")
        });
    }

    Workflow {
        language: language.to_string(),
        name: Some("tests".to_string()),
        on: Triggers {
            push: Some(BranchFilter { branches: vec!["main".to_string()] }),
            pull_request: Some(BranchFilter { branches: vec!["main".to_string()] }),
        },
        env: BTreeMap::new(),
        shell: None,
        jobs,
    }
}

fn job(name: &str) -> JobConfig {
    JobConfig {
        name: name.to_string(),
        image: None,
        condition: None,
        timeout_minutes: None,
        timeout_secs: None,
        fail_fast: false,
        allow_failure: None,
        env: BTreeMap::new(),
        shell: None,
        matrix: None,
        steps: Vec::new(),
    }
}

fn step(name: &str, run: &str) -> StepConfig {
    StepConfig {
        name: Some(name.to_string()),
        run: run.to_string(),
        condition: None,
        continue_on_error: false,
        env: BTreeMap::new(),
        shell: None,
        working_directory: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_plans_cleanly() {
        let workflow: Workflow = toml::from_str(DEFAULT_WORKFLOW).unwrap();
        let plan = plan_execution(&workflow, &PlanOptions::default()).unwrap();
        assert_eq!(plan.total_entries, 5);
        assert_eq!(plan.optional_entries, 1);

        let py27 = &plan.jobs[0];
        assert_eq!(py27.image.as_deref(), Some("python:2.7"));
        let lint = &py27.steps[1];
        assert!(!lint.condition.as_ref().unwrap().evaluate(&py27.entry.bindings).unwrap());
    }

    #[test]
    fn wizard_without_versions_pins_the_image() {
        let workflow = wizard_workflow("en", &[], vec![step("Test", "pytest -q")], false);
        let plan = plan_execution(&workflow, &PlanOptions::default()).unwrap();
        assert_eq!(plan.total_entries, 1);
        assert_eq!(plan.jobs[0].image.as_deref(), Some("python:3.12"));

        let reparsed: Workflow = toml::from_str(&toml::to_string_pretty(&workflow).unwrap()).unwrap();
        assert!(plan_execution(&reparsed, &PlanOptions::default()).is_ok());
    }

    #[test]
    fn wizard_versions_become_matrix_entries() {
        let versions = vec!["3.8".to_string(), "3.12".to_string()];
        let workflow = wizard_workflow("en", &versions, vec![step("Test", "pytest -q")], true);
        let plan = plan_execution(&workflow, &PlanOptions::default()).unwrap();
        assert_eq!(plan.total_entries, 3);
        assert_eq!(plan.jobs[1].image.as_deref(), Some("python:3.12"));
        assert_eq!(plan.jobs[2].entry.job, "docs");
    }

    #[test]
    fn non_interactive_respects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Workflow.toml");
        fs::write(&path, "keep").unwrap();

        execute(&path, false, true, "en").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");

        execute(&path, true, true, "zh-CN").unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("language = \"zh-CN\""));
    }
}
