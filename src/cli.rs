//! # Command-Line Interface / 命令行接口
//!
//! Builds the `clap` command tree with localized help text and dispatches to
//! the `run`, `validate` and `init` commands.
//!
//! 使用本地化帮助文本构建 `clap` 命令树，并分派到 `run`、`validate` 和 `init` 命令。

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};

use crate::core::OverallStatus;
use crate::core::planner::TriggerEvent;
use crate::infra::t;

pub mod commands;

/// Default workflow file, relative to the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "Workflow.toml";

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for `--lang <VALUE>` or `--lang=<VALUE>`.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--lang") {
        return args.get(pos + 1).cloned();
    }
    args.iter()
        .find_map(|arg| arg.strip_prefix("--lang="))
        .map(str::to_string)
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("cli.arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value(DEFAULT_CONFIG_FILE)
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn build_cli(locale: &str) -> Command {
    Command::new("matrix-ci")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.arg_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cli.cmd_run_about", locale = locale).to_string())
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("cli.arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(config_arg(locale))
                .arg(
                    Arg::new("project-dir")
                        .long("project-dir")
                        .help(t!("cli.arg_project_dir", locale = locale).to_string())
                        .value_name("PROJECT_DIR")
                        .default_value(".")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("event")
                        .long("event")
                        .help(t!("cli.arg_event", locale = locale).to_string())
                        .value_name("EVENT")
                        .value_parser(clap::value_parser!(TriggerEvent))
                        .action(ArgAction::Set)
                        .requires("branch"),
                )
                .arg(
                    Arg::new("branch")
                        .long("branch")
                        .help(t!("cli.arg_branch", locale = locale).to_string())
                        .value_name("BRANCH")
                        .action(ArgAction::Set)
                        .requires("event"),
                )
                .arg(
                    Arg::new("total-runners")
                        .long("total-runners")
                        .help(t!("cli.arg_total_runners", locale = locale).to_string())
                        .value_name("TOTAL_RUNNERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("runner-index"),
                )
                .arg(
                    Arg::new("runner-index")
                        .long("runner-index")
                        .help(t!("cli.arg_runner_index", locale = locale).to_string())
                        .value_name("RUNNER_INDEX")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("total-runners"),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("cli.arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("cli.arg_json", locale = locale).to_string())
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("isolate")
                        .long("isolate")
                        .help(t!("cli.arg_isolate", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about(t!("cli.cmd_validate_about", locale = locale).to_string())
                .arg(config_arg(locale)),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("cli.arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("cli.arg_output", locale = locale).to_string())
                        .value_name("OUTPUT")
                        .default_value(DEFAULT_CONFIG_FILE)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("cli.arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn run_args(matches: &ArgMatches, lang: Option<String>) -> commands::run::RunArgs {
    commands::run::RunArgs {
        jobs: matches.get_one::<usize>("jobs").copied(),
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        project_dir: matches
            .get_one::<PathBuf>("project-dir")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".")),
        event: matches.get_one::<TriggerEvent>("event").copied(),
        branch: matches.get_one::<String>("branch").cloned(),
        total_runners: matches.get_one::<usize>("total-runners").copied(),
        runner_index: matches.get_one::<usize>("runner-index").copied(),
        html: matches.get_one::<PathBuf>("html").cloned(),
        json: matches.get_one::<PathBuf>("json").cloned(),
        isolate: matches.get_flag("isolate"),
        lang,
    }
}

/// Parses the command line and runs the selected command.
///
/// Returns the overall status of the run; `validate` and `init` report
/// success when they complete.
///
/// 解析命令行并运行所选命令。返回运行的总体状态。
pub async fn run() -> Result<OverallStatus> {
    // Pre-parse language and initialize i18n first.
    let requested = pre_parse_language();
    let language = match &requested {
        Some(lang) => {
            let lang = crate::resolve_locale(lang);
            rust_i18n::set_locale(&lang);
            lang
        }
        None => crate::init(),
    };

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            commands::run::execute(run_args(run_matches, requested)).await
        }
        Some(("validate", validate_matches)) => {
            let config = validate_matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            commands::validate::execute(&config, requested.as_deref())?;
            Ok(OverallStatus::Success)
        }
        Some(("init", init_matches)) => {
            let non_interactive = init_matches.get_flag("non-interactive");
            let force = init_matches.get_flag("force");
            let output = init_matches
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

            if requested.is_none() {
                println!(
                    "{}",
                    t!("init.language_detected", locale = &language, lang = &language)
                );
            }
            commands::init::execute(&output, force, non_interactive, &language)?;
            Ok(OverallStatus::Success)
        }
        // `subcommand_required` makes clap exit before reaching here.
        _ => Ok(OverallStatus::Success),
    }
}
