use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::commands;
use crate::core::error::LauncherError;
use crate::core::modpack::{InstallState, InstallStatus};
use crate::core::state::AppState;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILED: u8 = 1;
pub const EXIT_USAGE: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Status { refresh: bool },
    Progress,
    Install,
    Update,
    Cancel,
    Mods,
    Toggle(String),
    EnableAll,
    DisableAll,
    Delete(String),
    Import(PathBuf),
    Quarantine,
    Launch { defer_signal: bool },
    LaunchSignal { action: Option<String> },
    Verify,
    DependencyCheck,
    ClearCache,
    ResetProfile,
    CompileCheck,
    CopyLog,
    CopyTroubleshoot,
    ServerLogs { lines: Option<usize> },
    LatestLog { lines: Option<usize> },
    Troubleshoot,
    Help,
    Version,
}

fn parse_lines(args: &[String]) -> Result<Option<usize>, String> {
    match args {
        [] => Ok(None),
        [flag, value] if flag == "--lines" || flag == "-n" => value
            .parse::<usize>()
            .map(Some)
            .map_err(|_| format!("--lines expects a number, got {value}")),
        _ => Err(format!("Unexpected arguments: {}", args.join(" "))),
    }
}

fn one_value(command: &str, args: &[String]) -> Result<String, String> {
    match args {
        [value] if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(format!("{command} takes exactly one argument")),
    }
}

fn no_args(command: CliCommand, args: &[String]) -> Result<CliCommand, String> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(format!("Unexpected arguments: {}", args.join(" ")))
    }
}

pub fn parse_args(args: &[String]) -> Result<CliCommand, String> {
    let Some((head, rest)) = args.split_first() else {
        return Ok(CliCommand::Help);
    };

    match head.as_str() {
        "help" | "--help" | "-h" => Ok(CliCommand::Help),
        "version" | "--version" | "-V" => Ok(CliCommand::Version),
        "status" => match rest {
            [] => Ok(CliCommand::Status { refresh: false }),
            [flag] if flag == "--refresh" => Ok(CliCommand::Status { refresh: true }),
            _ => Err(format!("Unexpected arguments: {}", rest.join(" "))),
        },
        "progress" => no_args(CliCommand::Progress, rest),
        "install" => no_args(CliCommand::Install, rest),
        "update" => no_args(CliCommand::Update, rest),
        "cancel" => no_args(CliCommand::Cancel, rest),
        "mods" => match rest.split_first() {
            None => Ok(CliCommand::Mods),
            Some((sub, tail)) => match sub.as_str() {
                "list" => no_args(CliCommand::Mods, tail),
                "toggle" => one_value("mods toggle", tail).map(CliCommand::Toggle),
                "enable-all" => no_args(CliCommand::EnableAll, tail),
                "disable-all" => no_args(CliCommand::DisableAll, tail),
                "delete" => one_value("mods delete", tail).map(CliCommand::Delete),
                "import" => one_value("mods import", tail)
                    .map(|path| CliCommand::Import(PathBuf::from(path))),
                "quarantine" => no_args(CliCommand::Quarantine, tail),
                other => Err(format!("Unknown mods command: {other}")),
            },
        },
        "launch" => match rest {
            [] => Ok(CliCommand::Launch {
                defer_signal: false,
            }),
            [flag] if flag == "--defer-signal" => Ok(CliCommand::Launch { defer_signal: true }),
            _ => Err(format!("Unexpected arguments: {}", rest.join(" "))),
        },
        "launch-signal" => match rest {
            [] => Ok(CliCommand::LaunchSignal { action: None }),
            [action] => Ok(CliCommand::LaunchSignal {
                action: Some(action.clone()),
            }),
            _ => Err("launch-signal takes at most one action".into()),
        },
        "verify" => no_args(CliCommand::Verify, rest),
        "dependency-check" => no_args(CliCommand::DependencyCheck, rest),
        "clear-cache" => no_args(CliCommand::ClearCache, rest),
        "reset-profile" => no_args(CliCommand::ResetProfile, rest),
        "compile-check" => no_args(CliCommand::CompileCheck, rest),
        "copy-log" => no_args(CliCommand::CopyLog, rest),
        "copy-troubleshoot" => no_args(CliCommand::CopyTroubleshoot, rest),
        "logs" => parse_lines(rest).map(|lines| CliCommand::ServerLogs { lines }),
        "latest-log" => parse_lines(rest).map(|lines| CliCommand::LatestLog { lines }),
        "troubleshoot" => no_args(CliCommand::Troubleshoot, rest),
        other => Err(format!("Unknown command: {other}")),
    }
}

pub fn print_version() {
    println!("p1lot-launcher v{}", env!("CARGO_PKG_VERSION"));
}

pub fn print_help() {
    print_version();
    println!();
    println!("Usage: p1lot-launcher <command> [options]");
    println!();
    println!("Modpack:");
    println!("  status [--refresh]          Installed and latest modpack versions");
    println!("  progress                    Current install state");
    println!("  install                     Install the modpack unless already current");
    println!("  update                      Reinstall the latest modpack");
    println!("  cancel                      Cancel a running install");
    println!("Mods:");
    println!("  mods [list]                 List mods with their enabled state");
    println!("  mods toggle <name>          Flip a mod's enabled state");
    println!("  mods enable-all             Enable every mod");
    println!("  mods disable-all            Disable every mod");
    println!("  mods delete <name>          Delete a mod folder and its entry");
    println!("  mods import <path>          Import a mod folder or .zip");
    println!("  mods quarantine             Move mods blamed by the runtime log aside");
    println!("Launch:");
    println!("  launch [--defer-signal]     Start Northstar and wait for the game");
    println!("  launch-signal [action]      Write the launch signal file");
    println!("Maintenance:");
    println!("  verify                      Check paths, binaries and mod manifests");
    println!("  dependency-check            Enabled entries with no installed mod");
    println!("  clear-cache                 Delete the compiled script cache");
    println!("  reset-profile               Disable all mods and clear the cache");
    println!("  compile-check               Clear the cache, verify, tail the service log");
    println!("  copy-log                    Copy the newest runtime log to the data dir");
    println!("  copy-troubleshoot           Write troubleshoot info and verify results");
    println!("  logs [--lines N]            Tail the service log");
    println!("  latest-log [--lines N]      Tail the newest runtime log");
    println!("  troubleshoot                Paths and mod counts for bug reports");
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("Cannot serialize response: {err}"),
    }
}

fn respond<T: Serialize>(result: Result<T, LauncherError>) -> u8 {
    match result {
        Ok(value) => {
            emit(&value);
            EXIT_OK
        }
        Err(err) => {
            emit(&err);
            EXIT_FAILED
        }
    }
}

/// Follow the install channel until the attempt settles. Ctrl-C cancels it.
async fn follow_install(state: &AppState) -> InstallState {
    let mut rx = state.install.subscribe();
    let mut last_progress = None;
    loop {
        let current = rx.borrow_and_update().clone();
        if last_progress != Some(current.progress) {
            info!(
                "[{:?}] {}% {}",
                current.phase, current.progress, current.message
            );
            last_progress = Some(current.progress);
        }
        if current.is_terminal() {
            return current;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return state.install.snapshot();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling install");
                state.install.cancel();
            }
        }
    }
}

async fn run_install(state: &AppState, force: bool) -> u8 {
    let started = if force {
        commands::update(state).await
    } else {
        commands::install(state).await
    };
    if let Err(err) = started {
        emit(&err);
        return EXIT_FAILED;
    }

    let settled = follow_install(state).await;
    emit(&settled);
    if settled.status == InstallStatus::Complete {
        EXIT_OK
    } else {
        EXIT_FAILED
    }
}

pub async fn execute(state: Arc<AppState>, command: CliCommand) -> u8 {
    let state = state.as_ref();
    match command {
        CliCommand::Help => {
            print_help();
            EXIT_OK
        }
        CliCommand::Version => {
            print_version();
            EXIT_OK
        }
        CliCommand::Status { refresh } => respond(commands::status(state, refresh).await),
        CliCommand::Progress => respond(commands::progress(state).await),
        CliCommand::Install => run_install(state, false).await,
        CliCommand::Update => run_install(state, true).await,
        CliCommand::Cancel => respond(commands::cancel_install(state).await),
        CliCommand::Mods => respond(commands::list_mods(state).await),
        CliCommand::Toggle(name) => respond(commands::toggle_mod(state, name).await),
        CliCommand::EnableAll => respond(commands::enable_all_mods(state).await),
        CliCommand::DisableAll => respond(commands::disable_all_mods(state).await),
        CliCommand::Delete(name) => respond(commands::delete_mod(state, name).await),
        CliCommand::Import(path) => respond(commands::import_mods(state, path).await),
        CliCommand::Quarantine => respond(commands::quarantine_mods(state).await),
        CliCommand::Launch { defer_signal } => match commands::launch(state, defer_signal).await {
            Ok(outcome) => {
                emit(&outcome);
                if outcome.is_success() {
                    EXIT_OK
                } else {
                    EXIT_FAILED
                }
            }
            Err(err) => {
                emit(&err);
                EXIT_FAILED
            }
        },
        CliCommand::LaunchSignal { action } => respond(commands::launch_signal(state, action).await),
        CliCommand::Verify => respond(commands::verify(state).await),
        CliCommand::DependencyCheck => respond(commands::dependency_check(state).await),
        CliCommand::ClearCache => respond(commands::clear_cache(state).await),
        CliCommand::ResetProfile => respond(commands::reset_profile(state).await),
        CliCommand::CompileCheck => respond(commands::compile_check(state).await),
        CliCommand::CopyLog => respond(commands::copy_latest_log(state).await),
        CliCommand::CopyTroubleshoot => respond(commands::copy_troubleshoot(state).await),
        CliCommand::ServerLogs { lines } => respond(commands::server_logs(state, lines).await),
        CliCommand::LatestLog { lines } => respond(commands::latest_log(state, lines).await),
        CliCommand::Troubleshoot => respond(commands::troubleshoot(state).await),
    }
}
