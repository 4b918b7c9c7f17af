// ─── Launch Task ───
// Clears stale processes, repairs the profile runtime, spawns the Northstar
// launcher and decides whether the game actually came up.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::process::{wait_for_exit, wait_for_process, ProcessProbe, WaitOutcome};
use super::runtime_bin::ensure_profile_bin;
use super::signal::write_launch_signal;
use super::verdict::{judge, log_advanced, LaunchSignals, LaunchVerdict};
use crate::core::diagnostics::{
    broken_mods_in_latest, compile_errors_in_latest, latest_log, LAUNCH_COMPILE_ERROR_LIMIT,
};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils;
use crate::core::modpack::InstallController;
use crate::core::state::settings::{GAME_EXE, LAUNCHER_EXE};
use crate::core::state::ProfilePaths;

pub const GAME_STILL_RUNNING: &str = "Titanfall2.exe is still running. Close it and try again.";
pub const GAME_NOT_STARTED: &str = "Titanfall2.exe did not start. Check launch log.";

/// Fixed flags passed ahead of the user's launch parameters.
const NORTHSTAR_FLAG: &str = "-northstar";

/// How long to wait for output pumps to drain after the launcher exits.
const PUMP_DRAIN: Duration = Duration::from_secs(2);

/// Poll budgets for the preflight and detection phases.
#[derive(Debug, Clone, Copy)]
pub struct LaunchTimings {
    pub exit_attempts: usize,
    pub exit_delay: Duration,
    pub detect_timeout: Duration,
    pub detect_interval: Duration,
}

impl Default for LaunchTimings {
    fn default() -> Self {
        Self {
            exit_attempts: 6,
            exit_delay: Duration::from_millis(500),
            detect_timeout: Duration::from_secs(180),
            detect_interval: Duration::from_secs(1),
        }
    }
}

/// Everything one attempt needs, resolved from fresh settings.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub paths: ProfilePaths,
    pub launch_params: Vec<String>,
    /// Directory for the per-attempt `launch-<stamp>.log`.
    pub logs_dir: PathBuf,
    pub signal_file: PathBuf,
    /// Leave the launch signal to the caller.
    pub defer_signal: bool,
}

/// Evidence attached to an undetected launch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReport {
    pub log_path: PathBuf,
    pub deferred: bool,
    pub exit_code: Option<i32>,
    pub note: String,
    pub log_note: String,
    pub northstar_log: Option<PathBuf>,
    pub compile_errors: Vec<String>,
    pub broken_mods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LaunchOutcome {
    /// The game process was detected.
    Started { log_path: PathBuf, deferred: bool },
    /// Not detected, but the launcher exit code or runtime log say it ran.
    SoftSuccess {
        #[serde(flatten)]
        report: LaunchReport,
    },
    Failed {
        error: String,
        #[serde(flatten)]
        report: LaunchReport,
    },
}

impl LaunchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, LaunchOutcome::Failed { .. })
    }

    pub fn log_path(&self) -> &Path {
        match self {
            LaunchOutcome::Started { log_path, .. } => log_path,
            LaunchOutcome::SoftSuccess { report } | LaunchOutcome::Failed { report, .. } => {
                &report.log_path
            }
        }
    }
}

/// Runs launch attempts against a process probe.
#[derive(Clone)]
pub struct LaunchOrchestrator {
    probe: Arc<dyn ProcessProbe>,
    controller: InstallController,
    timings: LaunchTimings,
}

impl LaunchOrchestrator {
    pub fn new(probe: Arc<dyn ProcessProbe>, controller: InstallController) -> Self {
        Self {
            probe,
            controller,
            timings: LaunchTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: LaunchTimings) -> Self {
        self.timings = timings;
        self
    }

    // ── Preflight ───────────────────────────────────────

    async fn clear_stale_processes(&self) -> LauncherResult<()> {
        for image in [GAME_EXE, LAUNCHER_EXE] {
            let killed = self.probe.kill_all(image).await;
            if killed > 0 {
                info!("Terminated {} stale {} process(es)", killed, image);
            }
        }
        wait_for_exit(
            self.probe.as_ref(),
            LAUNCHER_EXE,
            self.timings.exit_attempts,
            self.timings.exit_delay,
        )
        .await;
        let game_gone = wait_for_exit(
            self.probe.as_ref(),
            GAME_EXE,
            self.timings.exit_attempts,
            self.timings.exit_delay,
        )
        .await;
        if !game_gone {
            return Err(LauncherError::conflict(GAME_STILL_RUNNING));
        }
        Ok(())
    }

    fn check_binaries(paths: &ProfilePaths) -> LauncherResult<()> {
        if !paths.launcher_exe.exists() {
            return Err(LauncherError::Validation(
                "NorthstarLauncher.exe not found".into(),
            ));
        }
        if !paths.game_exe.exists() {
            return Err(LauncherError::Validation("Titanfall2.exe not found".into()));
        }
        Ok(())
    }

    // ── Attempt ─────────────────────────────────────────

    /// Run one launch attempt to a verdict.
    pub async fn launch(
        &self,
        request: LaunchRequest,
        cancel: CancellationToken,
    ) -> LauncherResult<LaunchOutcome> {
        let paths = &request.paths;
        self.clear_stale_processes().await?;
        Self::check_binaries(paths)?;
        if ensure_profile_bin(&paths.profile_dir, &paths.game_dir).await? {
            info!("Profile runtime binaries were missing and have been restored");
        }

        let log_before = latest_log(&paths.runtime_logs_dir)
            .await
            .map(|stamp| stamp.modified);
        let launch_start = SystemTime::now();

        fs_utils::ensure_dir(&request.logs_dir).await?;
        let log_path = request.logs_dir.join(launch_log_name());
        let mut cmd = build_command(paths, &request.launch_params);
        let mut log_file =
            File::create(&log_path).map_err(|e| LauncherError::io(&log_path, e))?;
        let _ = writeln!(
            log_file,
            "[{}] {}",
            Utc::now().to_rfc3339(),
            format_command_for_logs(&cmd)
        );
        let log_file = Arc::new(Mutex::new(log_file));

        info!("Launching Northstar: {}", format_command_for_logs(&cmd));
        let mut child = cmd
            .spawn()
            .map_err(|e| LauncherError::io(&paths.launcher_exe, e))?;
        info!("Northstar launcher spawned (pid {})", child.id());

        let mut pumps: Vec<JoinHandle<()>> = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump_output(stdout, "stdout", log_file.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump_output(stderr, "stderr", log_file.clone()));
        }

        let (exit_tx, mut exit_rx) = watch::channel::<Option<Option<i32>>>(None);
        tokio::spawn(async move {
            let status = tokio::task::spawn_blocking(move || child.wait()).await;
            let code = match status {
                Ok(Ok(status)) => status.code(),
                Ok(Err(err)) => {
                    warn!("Waiting on Northstar launcher failed: {}", err);
                    None
                }
                Err(err) => {
                    warn!("Launcher wait task failed: {}", err);
                    None
                }
            };
            info!("Northstar launcher exited with {:?}", code);
            exit_tx.send_replace(Some(code));
        });

        if !request.defer_signal {
            if let Err(err) = write_launch_signal(&request.signal_file, "launch").await {
                warn!("Launch signal not written: {}", err);
            }
            self.controller.mark_launched_if_idle();
        }

        let outcome = wait_for_process(
            self.probe.as_ref(),
            GAME_EXE,
            self.timings.detect_timeout,
            self.timings.detect_interval,
            &mut exit_rx,
            &cancel,
        )
        .await;

        let exit_code = match outcome {
            WaitOutcome::Detected => {
                info!("{} detected, launch succeeded", GAME_EXE);
                return Ok(LaunchOutcome::Started {
                    log_path,
                    deferred: request.defer_signal,
                });
            }
            WaitOutcome::Cancelled => return Err(LauncherError::Cancelled),
            WaitOutcome::ChildExited(code) => code,
            WaitOutcome::TimedOut => {
                let exited = *exit_rx.borrow();
                exited.flatten()
            }
        };

        for pump in pumps {
            if tokio::time::timeout(PUMP_DRAIN, pump).await.is_err() {
                debug!("Launcher output pump still open after exit");
            }
        }

        let (report, advanced) = self
            .diagnose(paths, log_path, request.defer_signal, exit_code, log_before, launch_start)
            .await;
        let signals = LaunchSignals {
            exit_code,
            log_advanced: advanced,
            compile_errors_found: !report.compile_errors.is_empty(),
        };

        Ok(match judge(signals) {
            LaunchVerdict::SoftSuccess => {
                warn!("{} not detected, treating launch as soft success", GAME_EXE);
                LaunchOutcome::SoftSuccess { report }
            }
            LaunchVerdict::Failed => {
                warn!("{} did not start (exit {:?})", GAME_EXE, exit_code);
                LaunchOutcome::Failed {
                    error: GAME_NOT_STARTED.into(),
                    report,
                }
            }
        })
    }

    async fn diagnose(
        &self,
        paths: &ProfilePaths,
        log_path: PathBuf,
        deferred: bool,
        exit_code: Option<i32>,
        log_before: Option<SystemTime>,
        launch_start: SystemTime,
    ) -> (LaunchReport, bool) {
        let logs_dir = &paths.runtime_logs_dir;
        let compile = compile_errors_in_latest(logs_dir, LAUNCH_COMPILE_ERROR_LIMIT)
            .await
            .unwrap_or_else(|err| {
                warn!("Cannot read runtime log for compile errors: {}", err);
                Default::default()
            });
        let broken_mods = broken_mods_in_latest(logs_dir).await.unwrap_or_else(|err| {
            warn!("Cannot read runtime log for broken mods: {}", err);
            Vec::new()
        });
        let log_after = latest_log(logs_dir).await.map(|stamp| stamp.modified);
        let advanced = log_advanced(log_before, log_after, launch_start);

        let report = LaunchReport {
            log_path,
            deferred,
            exit_code,
            note: exit_note(exit_code),
            log_note: if advanced {
                LOG_ADVANCED_NOTE.into()
            } else {
                LOG_STALE_NOTE.into()
            },
            northstar_log: compile.log_path,
            compile_errors: compile.errors,
            broken_mods,
        };
        (report, advanced)
    }
}

const LOG_ADVANCED_NOTE: &str =
    "Northstar log updated after launch; process detection may have missed Titanfall2.exe.";
const LOG_STALE_NOTE: &str = "Northstar log did not update after launch.";

fn exit_note(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("NorthstarLauncher exit code: {code}."),
        None => "NorthstarLauncher did not report an exit code.".into(),
    }
}

/// `launch-<ISO timestamp>.log` with `:` and `.` made filename-safe.
fn launch_log_name() -> String {
    format!("launch-{}.log", Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}

fn build_command(paths: &ProfilePaths, launch_params: &[String]) -> Command {
    let mut cmd = Command::new(&paths.launcher_exe);
    cmd.arg(NORTHSTAR_FLAG);
    cmd.arg(format!("-profile={}", paths.profile_dir.display()));
    for param in launch_params.iter().filter(|p| !p.trim().is_empty()) {
        cmd.arg(param);
    }
    cmd.current_dir(&paths.game_dir);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    configure_platform_spawn(&mut cmd);
    cmd
}

/// Copy a child stream line by line into the per-attempt log and the
/// service log.
fn pump_output<R>(stream: R, label: &'static str, sink: Arc<Mutex<File>>) -> JoinHandle<()>
where
    R: std::io::Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        for line in BufReader::new(stream).lines().map_while(Result::ok) {
            info!(target: "launch_output", "[{}] {}", label, line);
            if let Ok(mut file) = sink.lock() {
                let _ = writeln!(file, "[{label}] {line}");
            }
        }
    })
}

fn configure_platform_spawn(cmd: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

fn format_command_for_logs(cmd: &Command) -> String {
    let program = shell_escape(&cmd.get_program().to_string_lossy());
    let args = cmd
        .get_args()
        .map(|arg| shell_escape(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launch::RUNTIME_MARKER;
    use crate::core::modpack::install::tests::FakeProbe;
    use crate::core::modpack::InstallStatus;
    use crate::core::state::paths::runtime_bin_dir;
    use crate::core::state::LauncherSettings;
    use async_trait::async_trait;

    fn quick() -> LaunchTimings {
        LaunchTimings {
            exit_attempts: 2,
            exit_delay: Duration::from_millis(1),
            detect_timeout: Duration::from_secs(5),
            detect_interval: Duration::from_millis(10),
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        request: LaunchRequest,
    }

    fn fixture(launcher: &str) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let game = tmp.path().join("game");
        let profile = tmp.path().join("profile");
        std::fs::create_dir_all(runtime_bin_dir(&game)).unwrap();
        std::fs::write(runtime_bin_dir(&game).join(RUNTIME_MARKER), "dll").unwrap();
        std::fs::write(game.join(GAME_EXE), "").unwrap();
        std::fs::create_dir_all(&profile).unwrap();

        let settings = LauncherSettings {
            profile_path: profile,
            tf2_path: Some(game.clone()),
            game_path: game.join(GAME_EXE),
            launcher_exe: PathBuf::from(launcher),
            launch_params: vec!["-novid".into()],
            ..LauncherSettings::default()
        };
        let logs_dir = tmp.path().join("logs");
        Fixture {
            request: LaunchRequest {
                paths: ProfilePaths::resolve(&settings),
                launch_params: settings.launch_params.clone(),
                signal_file: logs_dir.join("launch.signal.json"),
                logs_dir,
                defer_signal: false,
            },
            _tmp: tmp,
        }
    }

    fn orchestrator(probe: Arc<dyn ProcessProbe>) -> (LaunchOrchestrator, InstallController) {
        let controller = InstallController::new();
        (
            LaunchOrchestrator::new(probe, controller.clone()).with_timings(quick()),
            controller,
        )
    }

    /// Reports the game as running once the launch signal exists.
    struct SignalProbe(PathBuf);

    #[async_trait]
    impl ProcessProbe for SignalProbe {
        async fn is_running(&self, image: &str) -> bool {
            image == GAME_EXE && self.0.exists()
        }

        async fn kill_all(&self, _image: &str) -> usize {
            0
        }
    }

    /// A game process that survives every kill.
    struct StubbornProbe;

    #[async_trait]
    impl ProcessProbe for StubbornProbe {
        async fn is_running(&self, image: &str) -> bool {
            image == GAME_EXE
        }

        async fn kill_all(&self, _image: &str) -> usize {
            0
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_without_detection_is_soft_success() {
        let fx = fixture("/bin/echo");
        let (launcher, controller) = orchestrator(Arc::new(FakeProbe::default()));

        let outcome = launcher
            .launch(fx.request.clone(), CancellationToken::new())
            .await
            .unwrap();

        let LaunchOutcome::SoftSuccess { report } = &outcome else {
            panic!("expected soft success, got {outcome:?}");
        };
        assert_eq!(report.exit_code, Some(0));
        assert_eq!(report.note, "NorthstarLauncher exit code: 0.");
        assert_eq!(report.log_note, LOG_STALE_NOTE);
        assert!(outcome.is_success());

        let log = std::fs::read_to_string(outcome.log_path()).unwrap();
        assert!(log.contains("-northstar"));
        assert!(log.contains("[stdout]"));
        assert!(fx.request.signal_file.exists());
        assert!(runtime_bin_dir(&fx.request.paths.profile_dir)
            .join(RUNTIME_MARKER)
            .exists());
        assert_eq!(controller.snapshot().status, InstallStatus::Launched);

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["result"], "soft_success");
        assert_eq!(value["exitCode"], 0);
        assert!(value["logPath"].is_string());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_launcher_reports_hard_failure_with_diagnostics() {
        let fx = fixture("/bin/false");
        let runtime_logs = &fx.request.paths.runtime_logs_dir;
        std::fs::create_dir_all(runtime_logs).unwrap();
        std::fs::write(
            runtime_logs.join("nslog.txt"),
            "COMPILE ERROR Bad call\nIn file x.nut\nscript belongs to BadMod (v1)\n",
        )
        .unwrap();
        let (launcher, _) = orchestrator(Arc::new(FakeProbe::default()));

        let outcome = launcher
            .launch(fx.request.clone(), CancellationToken::new())
            .await
            .unwrap();

        let LaunchOutcome::Failed { error, report } = &outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(error, GAME_NOT_STARTED);
        assert_eq!(report.exit_code, Some(1));
        assert_eq!(report.compile_errors.len(), 3);
        assert_eq!(report.broken_mods, vec!["BadMod (v1)", "BadMod"]);
        assert!(report.northstar_log.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn detected_game_is_started() {
        let mut fx = fixture("/bin/sleep");
        fx.request.launch_params.clear();
        let probe = Arc::new(SignalProbe(fx.request.signal_file.clone()));
        let (launcher, _) = orchestrator(probe);

        // /bin/sleep rejects the Northstar flags and exits non-zero, but the
        // probe sees the game as soon as the signal lands.
        let outcome = launcher
            .launch(fx.request.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, LaunchOutcome::Started { deferred: false, .. }));
    }

    #[tokio::test]
    async fn stubborn_game_process_is_a_conflict() {
        let fx = fixture("/bin/true");
        let (launcher, _) = orchestrator(Arc::new(StubbornProbe));

        let err = launcher
            .launch(fx.request.clone(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind().status_code(), 409);
        assert_eq!(err.to_string(), GAME_STILL_RUNNING);
    }

    #[tokio::test]
    async fn missing_binaries_are_validation_errors() {
        let fx = fixture("/definitely/missing/NorthstarLauncher.exe");
        let (launcher, _) = orchestrator(Arc::new(FakeProbe::default()));
        let err = launcher
            .launch(fx.request.clone(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "NorthstarLauncher.exe not found");
        assert_eq!(err.kind().status_code(), 400);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unrepairable_profile_bin_is_a_filesystem_error() {
        let fx = fixture("/bin/true");
        std::fs::remove_dir_all(runtime_bin_dir(&fx.request.paths.game_dir)).unwrap();
        let (launcher, _) = orchestrator(Arc::new(FakeProbe::default()));

        let err = launcher
            .launch(fx.request.clone(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Game bin folder missing"));
        assert_eq!(err.kind().status_code(), 500);
    }

    #[test]
    fn launch_log_name_is_filesystem_safe() {
        let name = launch_log_name();
        assert!(name.starts_with("launch-") && name.ends_with("Z.log"));
        assert!(!name.contains(':'));
    }
}
