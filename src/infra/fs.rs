//! # File System Operations Module / 文件系统操作模块
//!
//! Isolated job workspaces and path helpers.
//!
//! 隔离的作业工作区和路径辅助函数。

use anyhow::{Context, Result};
use fs_extra::dir::CopyOptions;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Top-level entries never copied into an isolated workspace.
const SKIPPED_ENTRIES: &[&str] = &["target", ".git"];

/// Creates a temporary workspace holding a copy of `project_root`.
///
/// The directory is removed when the returned `TempDir` is dropped.
///
/// 创建一个包含 `project_root` 副本的临时工作区。
/// 当返回的 `TempDir` 被丢弃时，该目录将被删除。
pub fn create_workspace(project_root: &Path, entry_name: &str) -> Result<TempDir> {
    let sanitized_name = entry_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();

    let temp_dir = tempfile::Builder::new()
        .prefix(&format!("matrix_ci_{sanitized_name}_"))
        .tempdir()
        .context("Failed to create temporary workspace")?;

    copy_project(project_root, temp_dir.path()).with_context(|| {
        format!(
            "Failed to copy project '{}' into workspace '{}'",
            project_root.display(),
            temp_dir.path().display()
        )
    })?;

    Ok(temp_dir)
}

/// Copies the content of `from` into the existing directory `to`, leaving out build output and VCS data.
pub fn copy_project(from: &Path, to: &Path) -> Result<()> {
    let items = fs::read_dir(from)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            !SKIPPED_ENTRIES.iter().any(|skipped| name == *skipped)
        })
        .map(|entry| entry.path())
        .collect::<Vec<PathBuf>>();

    let mut options = CopyOptions::new();
    options.overwrite = true;
    fs_extra::copy_items(&items, to, &options)?;
    Ok(())
}

/// Resolves a step's `working_directory` against the environment's work directory.
/// `~` and `$VAR` are expanded first.
pub fn resolve_working_dir(base: &Path, dir: Option<&str>) -> Result<PathBuf> {
    let Some(dir) = dir else {
        return Ok(base.to_path_buf());
    };
    let expanded = shellexpand::full(dir)
        .with_context(|| format!("Failed to expand working directory: {dir}"))?;
    Ok(base.join(expanded.as_ref()))
}

/// Gets the absolute path from a potentially relative path.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_copies_project_without_target() {
        let project = tempfile::tempdir().unwrap();
        fs::write(project.path().join("setup.py"), "print('hi')").unwrap();
        fs::create_dir_all(project.path().join("pkg")).unwrap();
        fs::write(project.path().join("pkg/mod.py"), "x = 1").unwrap();
        fs::create_dir_all(project.path().join("target/debug")).unwrap();

        let workspace = create_workspace(project.path(), "test (img=A)").unwrap();
        assert!(workspace.path().join("setup.py").is_file());
        assert!(workspace.path().join("pkg/mod.py").is_file());
        assert!(!workspace.path().join("target").exists());

        let path = workspace.path().to_path_buf();
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn working_dir_is_relative_to_base() {
        let base = Path::new("/work");
        assert_eq!(resolve_working_dir(base, None).unwrap(), PathBuf::from("/work"));
        assert_eq!(
            resolve_working_dir(base, Some("docs")).unwrap(),
            PathBuf::from("/work/docs")
        );
    }
}
