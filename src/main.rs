use colored::*;
use matrix_ci::cli;
use matrix_ci::core::ConfigError;
use std::process::ExitCode;

/// Exit code for configuration errors, distinct from a failed run (1).
const CONFIG_ERROR_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run().await {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if e.chain().any(|cause| cause.is::<ConfigError>()) {
                ExitCode::from(CONFIG_ERROR_EXIT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
