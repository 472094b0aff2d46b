//! # Core Module / 核心模块
//!
//! Workflow configuration, matrix expansion, conditional gates, planning,
//! job execution and result aggregation.
//!
//! 工作流配置、矩阵展开、条件门控、计划、作业执行和结果聚合。

pub mod aggregator;
pub mod condition;
pub mod config;
pub mod error;
pub mod execution;
pub mod interpolate;
pub mod matrix;
pub mod models;
pub mod planner;
pub mod scheduler;

// Re-exports
pub use aggregator::{OverallStatus, ResultAggregator, RunSummary};
pub use config::Workflow;
pub use error::ConfigError;
pub use execution::run_job;
pub use models::{JobResult, JobStatus};
