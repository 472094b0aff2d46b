//! # Environment Provisioning / 环境供应
//!
//! The seam between the job runner and whatever supplies an isolated
//! execution context. Container provisioning is left to other
//! implementations of [`Provisioner`]; [`LocalProvisioner`] runs steps on the
//! host, optionally in a throwaway copy of the project.
//!
//! 作业运行器与提供隔离执行上下文的组件之间的接缝。
//! [`LocalProvisioner`] 在主机上运行步骤，可选择在项目的一次性副本中运行。

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::core::matrix::MatrixEntry;
use crate::infra::fs::create_workspace;

/// An execution context owned by exactly one job.
/// 由恰好一个作业拥有的执行上下文。
#[derive(Debug)]
pub struct Environment {
    pub workdir: PathBuf,
    pub image: Option<String>,
    /// Variables exported to every step of the job.
    pub vars: Vec<(String, String)>,
    /// Keeps an isolated workspace alive; removing it on drop is the teardown.
    _workspace: Option<TempDir>,
}

impl Environment {
    pub fn new(workdir: PathBuf, image: Option<String>) -> Self {
        Self {
            workdir,
            image,
            vars: Vec::new(),
            _workspace: None,
        }
    }

    fn with_workspace(workspace: TempDir, image: Option<String>) -> Self {
        Self {
            workdir: workspace.path().to_path_buf(),
            image,
            vars: Vec::new(),
            _workspace: Some(workspace),
        }
    }
}

/// Supplies one environment per job and tears it down afterwards.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Prepares the environment for `entry`. `image` is the job's interpolated image selector.
    async fn provision(&self, entry: &MatrixEntry, image: Option<&str>) -> Result<Environment>;

    /// Releases the environment. Called whatever the job outcome was.
    async fn teardown(&self, env: Environment) {
        drop(env);
    }
}

/// Runs jobs on the host.
/// 在主机上运行作业。
#[derive(Debug, Clone)]
pub struct LocalProvisioner {
    project_dir: PathBuf,
    isolate: bool,
}

impl LocalProvisioner {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            isolate: false,
        }
    }

    /// Give every job its own temporary copy of the project.
    pub fn isolated(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    async fn provision(&self, entry: &MatrixEntry, image: Option<&str>) -> Result<Environment> {
        if !self.project_dir.is_dir() {
            bail!(
                "Project directory '{}' does not exist",
                self.project_dir.display()
            );
        }

        let image = image.map(str::to_string);
        let mut env = if self.isolate {
            let project_dir = self.project_dir.clone();
            let name = entry.display_name();
            let workspace =
                tokio::task::spawn_blocking(move || create_workspace(&project_dir, &name)).await??;
            Environment::with_workspace(workspace, image)
        } else {
            Environment::new(self.project_dir.clone(), image)
        };

        if let Some(image) = &env.image {
            env.vars.push(("MATRIX_IMAGE".to_string(), image.clone()));
        }
        env.vars.push(("MATRIX_JOB".to_string(), entry.job.clone()));
        env.vars
            .push(("MATRIX_ENTRY_INDEX".to_string(), entry.index.to_string()));
        for (key, value) in &entry.bindings {
            env.vars.push((binding_var_name(key), value.clone()));
        }

        Ok(env)
    }
}

/// `crypto-ver` becomes `MATRIX_CRYPTO_VER`.
pub fn binding_var_name(key: &str) -> String {
    let upper: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("MATRIX_{upper}")
}
