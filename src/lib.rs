mod cli;
pub mod commands;
pub mod core;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::CliCommand;
use crate::core::logging::init_logging;
use crate::core::state::settings::{data_dir_for, install_root};
use crate::core::state::{AppPaths, AppState};

/// How long shutdown waits for blocking-pool tasks. A started launch leaves
/// output pumps and the exit watcher attached to the game's launcher.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Drive `future` to completion, then shut the runtime down without waiting
/// on blocking tasks beyond [`SHUTDOWN_GRACE`].
fn block_then_shutdown<F: Future>(runtime: tokio::runtime::Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    output
}

/// Entry point for the binary. Returns the process exit code.
pub fn run() -> u8 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match cli::parse_args(&args) {
        Ok(CliCommand::Help) => {
            cli::print_help();
            return cli::EXIT_OK;
        }
        Ok(CliCommand::Version) => {
            cli::print_version();
            return cli::EXIT_OK;
        }
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("Run `p1lot-launcher help` for usage.");
            return cli::EXIT_USAGE;
        }
    };

    let paths = AppPaths::new(data_dir_for(&install_root()));
    let _logging = init_logging(&paths.logs_dir());
    tracing::info!("P1L0T launcher v{} starting", env!("CARGO_PKG_VERSION"));

    let state = match AppState::new(paths) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            tracing::error!("Cannot initialize launcher state: {}", err);
            return cli::EXIT_FAILED;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("Cannot start async runtime: {}", err);
            return cli::EXIT_FAILED;
        }
    };

    block_then_shutdown(runtime, cli::execute(state, command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn shutdown_does_not_wait_for_lingering_blocking_tasks() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = Instant::now();

        let answer = block_then_shutdown(runtime, async {
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(10)));
            42
        });

        assert_eq!(answer, 42);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn shutdown_does_not_wait_for_a_running_child() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = Instant::now();

        let pid = block_then_shutdown(runtime, async {
            let mut child = std::process::Command::new("/bin/sleep")
                .arg("10")
                .stdout(std::process::Stdio::piped())
                .spawn()
                .unwrap();
            let pid = child.id();
            tokio::task::spawn_blocking(move || child.wait());
            pid
        });

        assert!(pid > 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
