//! # Commands / 命令
//!
//! One module per subcommand.

pub mod init;
pub mod run;
pub mod validate;
