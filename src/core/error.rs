//! # Configuration Errors / 配置错误
//!
//! Every problem that can be detected before a single job starts is reported
//! through [`ConfigError`]. These errors abort the whole run; they are never
//! turned into job failures.
//!
//! 所有可以在任何作业启动之前检测到的问题都通过 [`ConfigError`] 报告。
//! 这些错误会中止整个运行，永远不会被转换为作业失败。

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read workflow file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse workflow file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("workflow defines no jobs")]
    NoJobs,

    #[error("job name '{0}' is used more than once")]
    DuplicateJob(String),

    #[error("job '{0}' has no steps")]
    NoSteps(String),

    #[error("job '{job}': matrix include list is empty")]
    EmptyMatrix { job: String },

    #[error("job '{job}': matrix entry #{index} is missing required key '{key}'")]
    MissingKey {
        job: String,
        index: usize,
        key: String,
    },

    #[error("job '{job}': matrix entry #{index} has a non-scalar value for key '{key}'")]
    NonScalarValue {
        job: String,
        index: usize,
        key: String,
    },

    #[error("invalid condition '{expr}': {message}")]
    InvalidCondition { expr: String, message: String },

    #[error("condition references unbound key '{key}'")]
    UnboundKey { key: String },

    #[error("job '{job}', entry '{entry}': {source}")]
    InEntry {
        job: String,
        entry: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("unterminated placeholder in '{0}'")]
    UnterminatedPlaceholder(String),

    #[error("unsupported placeholder '{0}', expected 'matrix.<key>'")]
    UnsupportedPlaceholder(String),

    #[error("invalid shell '{0}'")]
    InvalidShell(String),

    #[error("timeout for job '{0}' must be greater than zero")]
    ZeroTimeout(String),

    #[error("timeout for job '{job}' exceeds the maximum of {max_secs} seconds")]
    TimeoutTooLarge { job: String, max_secs: u64 },

    #[error("runner index {index} must be less than total runners {total}")]
    RunnerIndexOutOfRange { index: usize, total: usize },

    #[error("both --total-runners and --runner-index must be provided")]
    IncompleteSharding,
}

impl ConfigError {
    /// Attaches the job and entry the error was found in.
    pub fn in_entry(self, job: &str, entry: &str) -> Self {
        ConfigError::InEntry {
            job: job.to_string(),
            entry: entry.to_string(),
            source: Box::new(self),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
