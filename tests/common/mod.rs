// Shared test helpers for integration tests
#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use matrix_ci::core::RunSummary;
use matrix_ci::core::config::Workflow;
use matrix_ci::core::matrix::MatrixEntry;
use matrix_ci::core::planner::{PlanOptions, PlannedJob, plan_execution};
use matrix_ci::core::scheduler::run_plan;
use matrix_ci::infra::provisioner::{Environment, LocalProvisioner, Provisioner};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;

/// An empty project directory for steps to run in.
pub fn setup_project() -> TempDir {
    tempdir().expect("Failed to create temporary directory")
}

/// Writes `content` as a workflow file inside `dir`.
pub fn write_workflow(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write workflow");
    path
}

pub fn plan(content: &str) -> Vec<PlannedJob> {
    let workflow: Workflow = toml::from_str(content).expect("Invalid workflow TOML");
    plan_execution(&workflow, &PlanOptions::default())
        .expect("Failed to plan workflow")
        .jobs
}

/// Plans `content` and runs it on the host inside `project`.
pub async fn run_workflow(content: &str, project: &Path, concurrency: usize) -> RunSummary {
    run_plan(
        plan(content),
        Arc::new(LocalProvisioner::new(project)),
        concurrency,
        CancellationToken::new(),
    )
    .await
}

/// A provisioner that can never supply an environment.
pub struct BrokenProvisioner;

#[async_trait]
impl Provisioner for BrokenProvisioner {
    async fn provision(&self, _entry: &MatrixEntry, image: Option<&str>) -> Result<Environment> {
        bail!("image '{}' not found", image.unwrap_or("none"))
    }
}

/// A host provisioner that holds its thread for `delay` before handing out
/// the environment, so the job's ceiling can pass during setup.
pub struct SlowProvisioner {
    pub inner: LocalProvisioner,
    pub delay: Duration,
}

#[async_trait]
impl Provisioner for SlowProvisioner {
    async fn provision(&self, entry: &MatrixEntry, image: Option<&str>) -> Result<Environment> {
        std::thread::sleep(self.delay);
        self.inner.provision(entry, image).await
    }
}
