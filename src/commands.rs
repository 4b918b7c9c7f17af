// ─── Request Surface ───
// One async function per request. Every call re-reads settings where the
// answer depends on them, and failures come back as `LauncherError`, which
// serializes to `{ kind, status, error, state? }`.

use std::path::PathBuf;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::diagnostics::{self, CompileCheck, TroubleshootInfo, VerifyReport};
use crate::core::error::LauncherError;
use crate::core::fs_utils::tail_file;
use crate::core::launch::{write_launch_signal, LaunchOutcome, LaunchSignal};
use crate::core::logging::latest_service_log;
use crate::core::modpack::{build_status, InstallState, ModpackStatus};
use crate::core::mods::{import_mod, ModEntry};
use crate::core::state::{AppState, ProfilePaths};

pub const DEFAULT_TAIL_LINES: usize = 200;

#[derive(Debug, Serialize)]
pub struct InstallStarted {
    pub ok: bool,
    pub status: InstallState,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
    pub status: InstallState,
}

#[derive(Debug, Serialize)]
pub struct BulkToggleResponse {
    pub ok: bool,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub ok: bool,
    pub imported: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QuarantineResponse {
    pub ok: bool,
    pub quarantined: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DependencyCheckResponse {
    pub ok: bool,
    pub missing: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCacheResponse {
    pub ok: bool,
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub ok: bool,
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct LogTail {
    pub path: Option<PathBuf>,
    pub content: String,
}

async fn profile(state: &AppState) -> ProfilePaths {
    ProfilePaths::resolve(&state.reload_settings().await)
}

// ── Modpack ─────────────────────────────────────────────

pub async fn status(state: &AppState, refresh: bool) -> Result<ModpackStatus, LauncherError> {
    let settings = state.reload_settings().await;
    let remote = refresh.then(|| state.release_source(&settings));
    Ok(build_status(&settings.profile_path, remote.as_deref(), state.install.snapshot()).await)
}

pub async fn progress(state: &AppState) -> Result<InstallState, LauncherError> {
    Ok(state.install.snapshot())
}

async fn start_install(state: &AppState, force: bool) -> Result<InstallStarted, LauncherError> {
    let settings = state.reload_settings().await;
    let job = state.install_job(&settings);
    let status = state.install.start(job, force).await?;
    Ok(InstallStarted { ok: true, status })
}

pub async fn install(state: &AppState) -> Result<InstallStarted, LauncherError> {
    start_install(state, false).await
}

pub async fn update(state: &AppState) -> Result<InstallStarted, LauncherError> {
    start_install(state, true).await
}

pub async fn cancel_install(state: &AppState) -> Result<CancelResponse, LauncherError> {
    let cancelled = state.install.cancel();
    Ok(CancelResponse {
        cancelled,
        status: state.install.snapshot(),
    })
}

// ── Mods ────────────────────────────────────────────────

pub async fn list_mods(state: &AppState) -> Result<Vec<ModEntry>, LauncherError> {
    let paths = profile(state).await;
    state.registry(&paths).list().await
}

pub async fn toggle_mod(state: &AppState, name: String) -> Result<ModEntry, LauncherError> {
    let paths = profile(state).await;
    state.registry(&paths).toggle(&name).await
}

pub async fn enable_all_mods(state: &AppState) -> Result<BulkToggleResponse, LauncherError> {
    set_all(state, true).await
}

pub async fn disable_all_mods(state: &AppState) -> Result<BulkToggleResponse, LauncherError> {
    set_all(state, false).await
}

async fn set_all(state: &AppState, enabled: bool) -> Result<BulkToggleResponse, LauncherError> {
    let paths = profile(state).await;
    let count = state.registry(&paths).set_all_enabled(enabled).await?;
    Ok(BulkToggleResponse { ok: true, count })
}

pub async fn delete_mod(state: &AppState, name: String) -> Result<OkResponse, LauncherError> {
    let paths = profile(state).await;
    state.registry(&paths).delete(&name).await?;
    Ok(OkResponse { ok: true })
}

pub async fn import_mods(state: &AppState, source: PathBuf) -> Result<ImportResponse, LauncherError> {
    let paths = profile(state).await;
    let imported = import_mod(&state.registry(&paths), &source).await?;
    info!("Imported {} mod folder(s) from {:?}", imported.len(), source);
    Ok(ImportResponse { ok: true, imported })
}

pub async fn quarantine_mods(state: &AppState) -> Result<QuarantineResponse, LauncherError> {
    let paths = profile(state).await;
    let quarantined = diagnostics::quarantine(&state.registry(&paths), &paths).await?;
    Ok(QuarantineResponse {
        ok: true,
        quarantined,
    })
}

// ── Launch ──────────────────────────────────────────────

pub async fn launch(state: &AppState, defer_signal: bool) -> Result<LaunchOutcome, LauncherError> {
    let _launching = state.try_begin_launch()?;
    let settings = state.reload_settings().await;
    let request = state.launch_request(&settings, defer_signal);
    state
        .launcher()
        .launch(request, CancellationToken::new())
        .await
}

/// Emit the launch signal a deferred launch left out.
pub async fn launch_signal(state: &AppState, action: Option<String>) -> Result<LaunchSignal, LauncherError> {
    let action = action.unwrap_or_else(|| "launch".into());
    let signal = write_launch_signal(&state.paths.launch_signal_file(), &action).await?;
    state.install.mark_launched_if_idle();
    Ok(signal)
}

// ── Maintenance ─────────────────────────────────────────

pub async fn verify(state: &AppState) -> Result<VerifyReport, LauncherError> {
    let settings = state.reload_settings().await;
    let paths = ProfilePaths::resolve(&settings);
    diagnostics::verify(&settings, &paths, &state.registry(&paths)).await
}

pub async fn dependency_check(state: &AppState) -> Result<DependencyCheckResponse, LauncherError> {
    let paths = profile(state).await;
    let missing = diagnostics::dependency_issues(&state.registry(&paths)).await?;
    Ok(DependencyCheckResponse {
        ok: missing.is_empty(),
        missing,
    })
}

pub async fn clear_cache(state: &AppState) -> Result<ClearCacheResponse, LauncherError> {
    let paths = profile(state).await;
    let cleared = diagnostics::clear_compiled_cache(&paths).await?;
    Ok(ClearCacheResponse { ok: true, cleared })
}

pub async fn reset_profile(state: &AppState) -> Result<BulkToggleResponse, LauncherError> {
    let paths = profile(state).await;
    let count = diagnostics::reset_profile(&state.registry(&paths), &paths).await?;
    Ok(BulkToggleResponse { ok: true, count })
}

pub async fn troubleshoot(state: &AppState) -> Result<TroubleshootInfo, LauncherError> {
    let settings = state.reload_settings().await;
    let paths = ProfilePaths::resolve(&settings);
    diagnostics::troubleshoot(&settings, &paths, &state.registry(&paths)).await
}

pub async fn compile_check(state: &AppState) -> Result<CompileCheck, LauncherError> {
    info!("Compile check");
    let settings = state.reload_settings().await;
    let paths = ProfilePaths::resolve(&settings);
    let service_log = newest_service_log(state).await?;
    diagnostics::compile_check(
        &settings,
        &paths,
        &state.registry(&paths),
        service_log,
        DEFAULT_TAIL_LINES,
    )
    .await
}

pub async fn copy_latest_log(state: &AppState) -> Result<ExportResponse, LauncherError> {
    let settings = state.reload_settings().await;
    let paths = ProfilePaths::resolve(&settings);
    let path = diagnostics::export_latest_log(&paths, &diagnostics::export_dir(&settings)).await?;
    Ok(ExportResponse { ok: true, path })
}

pub async fn copy_troubleshoot(state: &AppState) -> Result<ExportResponse, LauncherError> {
    let settings = state.reload_settings().await;
    let paths = ProfilePaths::resolve(&settings);
    let path = diagnostics::export_troubleshoot(
        &settings,
        &paths,
        &state.registry(&paths),
        &diagnostics::export_dir(&settings),
    )
    .await?;
    Ok(ExportResponse { ok: true, path })
}

// ── Logs ────────────────────────────────────────────────

async fn tail(path: Option<PathBuf>, lines: usize) -> Result<LogTail, LauncherError> {
    let content = match &path {
        Some(path) => tail_file(path, lines).await?,
        None => String::new(),
    };
    Ok(LogTail { path, content })
}

async fn newest_service_log(state: &AppState) -> Result<Option<PathBuf>, LauncherError> {
    let logs_dir = state.paths.logs_dir();
    Ok(tokio::task::spawn_blocking(move || latest_service_log(&logs_dir)).await?)
}

pub async fn server_logs(state: &AppState, lines: Option<usize>) -> Result<LogTail, LauncherError> {
    let newest = newest_service_log(state).await?;
    tail(newest, lines.unwrap_or(DEFAULT_TAIL_LINES)).await
}

pub async fn latest_log(state: &AppState, lines: Option<usize>) -> Result<LogTail, LauncherError> {
    let paths = profile(state).await;
    let newest = diagnostics::latest_log(&paths.runtime_logs_dir).await;
    tail(newest.map(|stamp| stamp.path), lines.unwrap_or(DEFAULT_TAIL_LINES)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use crate::core::modpack::install::tests::{release, FakeProbe, FixedRelease};
    use crate::core::mods::registry::tests::write_mod;
    use crate::core::state::{AppPaths, LauncherSettings};

    /// State rooted in a temp dir with a profile that has two mods.
    fn state_in(tmp: &Path) -> AppState {
        let paths = AppPaths::new(tmp.join("data"));
        let settings = LauncherSettings {
            data_path: tmp.join("data"),
            profile_path: tmp.join("profile"),
            tf2_path: Some(tmp.join("game")),
            game_path: tmp.join("game").join("Titanfall2.exe"),
            launcher_exe: tmp.join("game").join("NorthstarLauncher.exe"),
            ..LauncherSettings::default()
        };
        settings.save(&paths.settings_file()).unwrap();

        let mods = tmp.join("profile").join("R2Northstar").join("mods");
        write_mod(&mods, "alpha", r#"{"Name":"Alpha","Version":"1.0"}"#);
        write_mod(&mods, "beta", r#"{"Name":"Beta","Version":"2.0"}"#);

        AppState::new(paths)
            .unwrap()
            .with_probe(Arc::new(FakeProbe::default()))
            .with_release_source(Arc::new(FixedRelease(release("1.0.0"))))
    }

    #[tokio::test]
    async fn mod_requests_round_trip_through_the_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_in(tmp.path());

        let listed = list_mods(&state).await.unwrap();
        assert_eq!(listed.len(), 2);

        assert!(toggle_mod(&state, "Alpha".into()).await.unwrap().enabled);
        assert_eq!(enable_all_mods(&state).await.unwrap().count, 2);
        assert_eq!(disable_all_mods(&state).await.unwrap().count, 2);

        delete_mod(&state, "Beta".into()).await.unwrap();
        let err = delete_mod(&state, "Beta".into()).await.unwrap_err();
        assert_eq!(err.kind().status_code(), 404);
        assert_eq!(list_mods(&state).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_reports_remote_only_on_refresh() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_in(tmp.path());

        let quiet = status(&state, false).await.unwrap();
        assert!(quiet.latest_version.is_none());
        assert!(quiet.installed);

        let fresh = status(&state, true).await.unwrap();
        assert_eq!(fresh.latest_version.as_deref(), Some("1.0.0"));
        assert!(fresh.update_available);
    }

    #[tokio::test]
    async fn maintenance_requests() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_in(tmp.path());

        let report = verify(&state).await.unwrap();
        assert!(!report.ok);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.starts_with("NorthstarLauncher.exe missing")));

        assert!(dependency_check(&state).await.unwrap().ok);
        assert!(!clear_cache(&state).await.unwrap().cleared);
        assert_eq!(reset_profile(&state).await.unwrap().count, 2);
        assert_eq!(troubleshoot(&state).await.unwrap().mods_total, 2);
        assert!(quarantine_mods(&state).await.unwrap().quarantined.is_empty());

        let runtime_tail = latest_log(&state, Some(5)).await.unwrap();
        assert!(runtime_tail.path.is_none());
        assert!(runtime_tail.content.is_empty());
    }

    #[tokio::test]
    async fn exports_land_in_the_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_in(tmp.path());
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();

        let err = copy_latest_log(&state).await.unwrap_err();
        assert_eq!(err.kind().status_code(), 404);

        let runtime_logs = tmp.path().join("profile").join("R2Northstar").join("logs");
        std::fs::create_dir_all(&runtime_logs).unwrap();
        std::fs::write(runtime_logs.join("nslog.txt"), "match log").unwrap();
        let copied = copy_latest_log(&state).await.unwrap();
        assert_eq!(copied.path.parent(), Some(tmp.path().join("data").as_path()));
        assert_eq!(std::fs::read_to_string(&copied.path).unwrap(), "match log");

        let snapshot = copy_troubleshoot(&state).await.unwrap();
        assert!(snapshot.path.starts_with(tmp.path().join("data")));
        assert!(snapshot.path.exists());

        let check = compile_check(&state).await.unwrap();
        assert!(!check.ok);
        assert!(check.summary.contains("NorthstarLauncher.exe missing"));
    }

    #[tokio::test]
    async fn launch_signal_marks_state_launched() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_in(tmp.path());

        let signal = launch_signal(&state, None).await.unwrap();
        assert_eq!(signal.action, "launch");
        assert!(state.paths.launch_signal_file().exists());
        let value = serde_json::to_value(progress(&state).await.unwrap()).unwrap();
        assert_eq!(value["status"], "launched");
    }

    #[tokio::test]
    async fn launch_without_binaries_is_a_validation_error() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_in(tmp.path());
        let err = launch(&state, false).await.unwrap_err();
        assert_eq!(err.kind().status_code(), 400);
    }
}
