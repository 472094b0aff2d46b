//! # Internationalization Integration Tests / 国际化集成测试
//!
//! Console output follows `--lang`, falling back to the workflow's `language`.
//!
//! 控制台输出遵循 `--lang`，否则使用工作流的 `language`。
#![cfg(unix)]

mod common;

use assert_cmd::prelude::*;
use common::{setup_project, write_workflow};
use predicates::prelude::*;
use std::process::Command;

fn workflow(language: &str) -> String {
    format!(
        r#"
language = "{language}"

[[jobs]]
name = "测试"

[[jobs.steps]]
run = "true"
"#
    )
}

#[test]
fn test_workflow_language_is_used() {
    let project = setup_project();
    let config = write_workflow(project.path(), "zh.toml", &workflow("zh-CN"));

    Command::cargo_bin("matrix-ci")
        .unwrap()
        .args(["run", "--config"])
        .arg(&config)
        .arg("--project-dir")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("--- 矩阵摘要 ---"))
        .stdout(predicate::str::contains("所有必需条目均已通过"));
}

#[test]
fn test_lang_flag_overrides_workflow_language() {
    let project = setup_project();
    let config = write_workflow(project.path(), "zh.toml", &workflow("zh-CN"));

    Command::cargo_bin("matrix-ci")
        .unwrap()
        .args(["--lang", "en", "run", "--config"])
        .arg(&config)
        .arg("--project-dir")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("--- Matrix Summary ---"));
}

#[test]
fn test_unknown_language_falls_back_to_english() {
    let project = setup_project();
    let config = write_workflow(project.path(), "fr.toml", &workflow("fr-FR"));

    Command::cargo_bin("matrix-ci")
        .unwrap()
        .args(["run", "--config"])
        .arg(&config)
        .arg("--project-dir")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("--- Matrix Summary ---"));
}
