//! # Infrastructure Module / 基础设施模块
//!
//! Command execution, file system operations, environment provisioning and
//! i18n support.
//!
//! 命令执行、文件系统操作、环境供应和国际化支持。

pub mod command;
pub mod fs;
pub mod provisioner;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
