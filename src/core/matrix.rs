//! # Matrix Expansion / 矩阵展开
//!
//! A matrix is an explicit `include` list, never a generated cross product.
//! Expansion validates every value-set and turns it into an immutable
//! [`MatrixEntry`], preserving order and duplicates.
//!
//! 矩阵是一个显式的 `include` 列表，而不是生成的笛卡尔积。
//! 展开会验证每个值集合并将其转换为不可变的 [`MatrixEntry`]，保留顺序和重复项。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::config::{JobConfig, MatrixConfig};
use crate::core::error::{ConfigError, ConfigResult};

/// Key to value bindings of one matrix entry.
pub type Bindings = BTreeMap<String, String>;

/// A named dimension of variation, expressed as an explicit list of value-sets.
/// 一个命名的变化维度，表示为显式的值集合列表。
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    /// Sub-keys each value-set must bind.
    pub keys: Vec<String>,
    pub value_sets: Vec<BTreeMap<String, toml::Value>>,
}

impl Axis {
    /// Builds the axis for a job's `[jobs.matrix]` table.
    ///
    /// When `keys` is not declared, the required keys are the union of the
    /// keys appearing in any value-set.
    pub fn from_config(config: &MatrixConfig) -> Self {
        let keys = if config.keys.is_empty() {
            config
                .include
                .iter()
                .flat_map(|set| set.keys().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            config.keys.clone()
        };

        Self {
            name: config.name.clone(),
            keys,
            value_sets: config.include.clone(),
        }
    }
}

/// One concrete combination of axis values. Immutable once expanded.
/// 一个具体的轴值组合。展开后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    /// Name of the job family this entry belongs to.
    pub job: String,
    /// Position in the include list.
    pub index: usize,
    pub bindings: Bindings,
}

impl MatrixEntry {
    pub fn new(job: impl Into<String>, index: usize, bindings: Bindings) -> Self {
        Self {
            job: job.into(),
            index,
            bindings,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.bindings.get(key).map(String::as_str)
    }

    /// Display name used in logs and reports, e.g. `test (imgtag=3.8, crypto_ver=3.3)`.
    /// 用于日志和报告的显示名称。
    pub fn display_name(&self) -> String {
        if self.bindings.is_empty() {
            return self.job.clone();
        }
        let values = self
            .bindings
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} ({})", self.job, values)
    }
}

impl fmt::Display for MatrixEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Expands an axis into entries for `job`.
///
/// # Errors
/// - [`ConfigError::EmptyMatrix`] when the include list is empty
/// - [`ConfigError::MissingKey`] when a value-set lacks a required key
/// - [`ConfigError::NonScalarValue`] when a value is an array, table or datetime
///
/// 将轴展开为 `job` 的条目。任何错误都会中止整个展开。
pub fn expand(job: &str, axis: &Axis) -> ConfigResult<Vec<MatrixEntry>> {
    if axis.value_sets.is_empty() {
        return Err(ConfigError::EmptyMatrix {
            job: job.to_string(),
        });
    }

    axis.value_sets
        .iter()
        .enumerate()
        .map(|(index, set)| {
            if let Some(missing) = axis.keys.iter().find(|key| !set.contains_key(*key)) {
                return Err(ConfigError::MissingKey {
                    job: job.to_string(),
                    index,
                    key: missing.clone(),
                });
            }

            let bindings = set
                .iter()
                .map(|(key, value)| {
                    scalar_to_string(value)
                        .map(|v| (key.clone(), v))
                        .ok_or_else(|| ConfigError::NonScalarValue {
                            job: job.to_string(),
                            index,
                            key: key.clone(),
                        })
                })
                .collect::<ConfigResult<Bindings>>()?;

            Ok(MatrixEntry::new(job, index, bindings))
        })
        .collect()
}

/// Expands a job's matrix, or yields its single unbound entry when it has none.
pub fn expand_job(job: &JobConfig) -> ConfigResult<Vec<MatrixEntry>> {
    match &job.matrix {
        Some(matrix) => expand(&job.name, &Axis::from_config(matrix)),
        None => Ok(vec![MatrixEntry::new(&job.name, 0, Bindings::new())]),
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
