//! # Workflow Configuration / 工作流配置
//!
//! Serde models for the workflow file (`Workflow.toml` by default) and the
//! structural checks that can be made before the matrix is expanded.
//!
//! 工作流文件（默认为 `Workflow.toml`）的 Serde 模型，
//! 以及在矩阵展开之前即可进行的结构检查。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::error::{ConfigError, ConfigResult};

/// Default per-job ceiling when a job sets neither `timeout_minutes` nor `timeout_secs`.
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 30;

/// Longest per-job ceiling a workflow may ask for (one week).
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// The whole workflow, loaded from a TOML file.
/// 从 TOML 文件加载的完整工作流。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Workflow {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,

    /// Display name of the workflow.
    #[serde(default)]
    pub name: Option<String>,

    /// Events that launch the matrix.
    /// 启动矩阵的事件。
    #[serde(default)]
    pub on: Triggers,

    /// Environment shared by every step of every job. Values may contain placeholders.
    /// 所有作业的所有步骤共享的环境变量。值可以包含占位符。
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Default shell for every step, e.g. `"bash -eo pipefail -c"`.
    #[serde(default)]
    pub shell: Option<String>,

    /// The job families, in declaration order.
    /// 按声明顺序排列的作业族。
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Trigger table: `[on]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Triggers {
    #[serde(default)]
    pub push: Option<BranchFilter>,
    #[serde(default)]
    pub pull_request: Option<BranchFilter>,
}

/// Branch list for one event kind. An empty list matches every branch.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BranchFilter {
    #[serde(default)]
    pub branches: Vec<String>,
}

impl BranchFilter {
    pub fn matches(&self, branch: &str) -> bool {
        self.branches.is_empty() || self.branches.iter().any(|b| b == "*" || b == branch)
    }
}

/// One job family: a set of steps run once for every matrix entry.
/// 一个作业族：为每个矩阵条目运行一次的一组步骤。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    /// Unique name of the job family, used in logs and reports.
    /// 作业族的唯一名称，用于日志和报告。
    pub name: String,

    /// Runtime image selector handed to the provisioner. May contain placeholders.
    /// 交给环境供应器的运行时镜像选择器。可以包含占位符。
    #[serde(default)]
    pub image: Option<String>,

    /// Gate for the whole entry. An entry gated off is reported as skipped.
    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    #[serde(default)]
    pub timeout_minutes: Option<u64>,

    /// Finer-grained alternative to `timeout_minutes`. Takes precedence when both are set.
    /// `timeout_minutes` 的更细粒度替代。同时设置时优先使用。
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// When `true`, the first failing required entry cancels its siblings.
    /// 为 `true` 时，第一个失败的必需条目会取消其同级条目。
    #[serde(default)]
    pub fail_fast: bool,

    /// Entries matching this condition may fail without failing the run.
    /// 匹配此条件的条目可以失败，而不会导致整个运行失败。
    #[serde(default)]
    pub allow_failure: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub shell: Option<String>,

    /// The explicit include matrix. Absent means a single entry with no bindings.
    /// 显式的 include 矩阵。缺省表示一个没有绑定的单一条目。
    #[serde(default)]
    pub matrix: Option<MatrixConfig>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl JobConfig {
    /// The job's time ceiling.
    pub fn timeout(&self) -> Duration {
        match (self.timeout_secs, self.timeout_minutes) {
            (Some(secs), _) => Duration::from_secs(secs),
            (None, Some(minutes)) => Duration::from_secs(minutes.saturating_mul(60)),
            (None, None) => Duration::from_secs(DEFAULT_TIMEOUT_MINUTES * 60),
        }
    }
}

/// `[jobs.matrix]`: an axis expressed as an explicit list of value-sets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatrixConfig {
    /// Axis name, only used for display.
    #[serde(default = "default_matrix_name")]
    pub name: String,

    /// Sub-keys every entry must bind. When empty, the union of all entry keys is used.
    /// 每个条目必须绑定的子键。为空时，使用所有条目键的并集。
    #[serde(default)]
    pub keys: Vec<String>,

    /// The value-sets, one job per element. Duplicates are kept.
    /// 值集合，每个元素对应一个作业。重复项会被保留。
    #[serde(default)]
    pub include: Vec<BTreeMap<String, toml::Value>>,
}

fn default_matrix_name() -> String {
    "matrix".to_string()
}

/// `[[jobs.steps]]`: one unit of work.
/// `[[jobs.steps]]`：一个工作单元。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepConfig {
    /// Display name. Defaults to the first line of `run`.
    #[serde(default)]
    pub name: Option<String>,

    /// The script body, interpolated against the entry's bindings before execution.
    /// 脚本主体，在执行前根据条目的绑定进行插值。
    pub run: String,

    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    /// Record a failure of this step but keep going.
    /// 记录此步骤的失败但继续执行。
    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub shell: Option<String>,

    /// Directory to run in, relative to the environment's work directory. `~` and `$VAR` are expanded.
    #[serde(default)]
    pub working_directory: Option<String>,
}

impl StepConfig {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let first_line = self.run.lines().next().unwrap_or_default().trim();
                format!("Run {first_line}")
            }
        }
    }
}

/// Reads, parses and structurally validates a workflow file.
///
/// Matrix expansion and condition checks happen later in the planner, which
/// needs the expanded entries.
///
/// 读取、解析并在结构上验证工作流文件。
/// 矩阵展开和条件检查稍后在计划器中进行。
pub fn load_workflow(path: &Path) -> ConfigResult<Workflow> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let workflow: Workflow = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_structure(&workflow)?;
    Ok(workflow)
}

/// Checks that do not depend on matrix expansion.
pub fn validate_structure(workflow: &Workflow) -> ConfigResult<()> {
    if workflow.jobs.is_empty() {
        return Err(ConfigError::NoJobs);
    }

    let mut seen = HashSet::new();
    for job in &workflow.jobs {
        if !seen.insert(job.name.as_str()) {
            return Err(ConfigError::DuplicateJob(job.name.clone()));
        }
        if job.steps.is_empty() {
            return Err(ConfigError::NoSteps(job.name.clone()));
        }
        let timeout = job.timeout();
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout(job.name.clone()));
        }
        if timeout.as_secs() > MAX_TIMEOUT_SECS {
            return Err(ConfigError::TimeoutTooLarge {
                job: job.name.clone(),
                max_secs: MAX_TIMEOUT_SECS,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
language = "en"
name = "tests"

[on.push]
branches = ["main"]

[on.pull_request]
branches = ["main"]

[[jobs]]
name = "test"
image = "python:${{ matrix.imgtag }}"
timeout_minutes = 30

[jobs.matrix]
include = [
    { imgtag = "3.8", crypto_ver = "3.3" },
    { imgtag = "2.7", crypto_ver = "2.5" },
]

[[jobs.steps]]
name = "lint"
if = "!contains(matrix.imgtag, '2.7')"
run = "flake8"

[[jobs.steps]]
run = "pytest"
"#;

    #[test]
    fn parses_full_workflow() {
        let workflow: Workflow = toml::from_str(SAMPLE).unwrap();
        assert_eq!(workflow.language, "en");
        assert_eq!(workflow.jobs.len(), 1);

        let job = &workflow.jobs[0];
        assert_eq!(job.name, "test");
        assert!(!job.fail_fast);
        assert_eq!(job.timeout(), Duration::from_secs(30 * 60));
        assert_eq!(job.matrix.as_ref().unwrap().include.len(), 2);
        assert_eq!(
            job.steps[0].condition.as_deref(),
            Some("!contains(matrix.imgtag, '2.7')")
        );
        assert_eq!(job.steps[1].display_name(), "Run pytest");
        assert_eq!(workflow.on.push.unwrap().branches, vec!["main"]);
    }

    #[test]
    fn timeout_secs_takes_precedence() {
        let job: JobConfig = toml::from_str(
            r#"
name = "t"
timeout_minutes = 5
timeout_secs = 7
steps = [{ run = "true" }]
"#,
        )
        .unwrap();
        assert_eq!(job.timeout(), Duration::from_secs(7));
    }

    #[test]
    fn default_language_and_timeout() {
        let workflow: Workflow = toml::from_str(
            r#"
[[jobs]]
name = "docs"
steps = [{ run = "make html" }]
"#,
        )
        .unwrap();
        assert_eq!(workflow.language, "en");
        assert_eq!(
            workflow.jobs[0].timeout(),
            Duration::from_secs(DEFAULT_TIMEOUT_MINUTES * 60)
        );
        assert!(validate_structure(&workflow).is_ok());
    }

    #[test]
    fn rejects_duplicate_jobs_and_missing_steps() {
        let workflow: Workflow = toml::from_str(
            r#"
[[jobs]]
name = "a"
steps = [{ run = "true" }]

[[jobs]]
name = "a"
steps = [{ run = "true" }]
"#,
        )
        .unwrap();
        assert!(matches!(
            validate_structure(&workflow),
            Err(ConfigError::DuplicateJob(name)) if name == "a"
        ));

        let workflow: Workflow = toml::from_str("[[jobs]]\nname = \"empty\"\n").unwrap();
        assert!(matches!(
            validate_structure(&workflow),
            Err(ConfigError::NoSteps(_))
        ));
    }

    #[test]
    fn rejects_empty_workflow_and_zero_timeout() {
        let workflow: Workflow = toml::from_str("language = \"en\"").unwrap();
        assert!(matches!(validate_structure(&workflow), Err(ConfigError::NoJobs)));

        let workflow: Workflow = toml::from_str(
            "[[jobs]]\nname = \"z\"\ntimeout_secs = 0\nsteps = [{ run = \"true\" }]\n",
        )
        .unwrap();
        assert!(matches!(
            validate_structure(&workflow),
            Err(ConfigError::ZeroTimeout(_))
        ));
    }

    #[test]
    fn rejects_oversized_timeouts() {
        for field in ["timeout_minutes", "timeout_secs"] {
            let workflow: Workflow = toml::from_str(&format!(
                "[[jobs]]\nname = \"huge\"\n{field} = 9223372036854775807\nsteps = [{{ run = \"true\" }}]\n"
            ))
            .unwrap();
            assert!(matches!(
                validate_structure(&workflow),
                Err(ConfigError::TimeoutTooLarge { job, .. }) if job == "huge"
            ));
        }

        let workflow: Workflow = toml::from_str(&format!(
            "[[jobs]]\nname = \"week\"\ntimeout_secs = {MAX_TIMEOUT_SECS}\nsteps = [{{ run = \"true\" }}]\n"
        ))
        .unwrap();
        assert!(validate_structure(&workflow).is_ok());
    }

    #[test]
    fn branch_filter_matching() {
        let any = BranchFilter::default();
        assert!(any.matches("feature/x"));

        let main_only = BranchFilter {
            branches: vec!["main".into()],
        };
        assert!(main_only.matches("main"));
        assert!(!main_only.matches("dev"));

        let wildcard = BranchFilter {
            branches: vec!["*".into()],
        };
        assert!(wildcard.matches("dev"));
    }
}
