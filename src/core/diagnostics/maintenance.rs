use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::runtime_log::latest_log;
use super::verify::{verify, VerifyReport};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils;
use crate::core::mods::ModRegistry;
use crate::core::state::settings::{install_root, APP_DIR_NAME};
use crate::core::state::{LauncherSettings, ProfilePaths};

/// Issues folded into a compile check summary.
pub const COMPILE_SUMMARY_ISSUES: usize = 20;

/// Names enabled in the map that match no listed mod by name or folder.
pub async fn dependency_issues(registry: &ModRegistry) -> LauncherResult<Vec<String>> {
    let mods = registry.list().await?;
    let map = registry.enabled_map().await?;
    Ok(map
        .mods
        .keys()
        .filter(|name| map.any_enabled(name))
        .filter(|name| !mods.iter().any(|m| &m.name == *name || &m.folder == *name))
        .cloned()
        .collect())
}

/// Remove the runtime's compiled script cache. Returns whether it existed.
pub async fn clear_compiled_cache(paths: &ProfilePaths) -> LauncherResult<bool> {
    let compiled = paths.compiled_cache_dir();
    if !compiled.exists() {
        return Ok(false);
    }
    fs_utils::safe_remove(&compiled).await?;
    info!("Cleared compiled cache {:?}", compiled);
    Ok(true)
}

/// Disable every mod and drop the compiled cache.
pub async fn reset_profile(registry: &ModRegistry, paths: &ProfilePaths) -> LauncherResult<usize> {
    let disabled = registry.set_all_enabled(false).await?;
    clear_compiled_cache(paths).await?;
    info!("Profile reset: {} mods disabled", disabled);
    Ok(disabled)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TroubleshootInfo {
    pub version: &'static str,
    pub platform: &'static str,
    pub data_path: PathBuf,
    pub profile_path: PathBuf,
    pub tf2_path: Option<PathBuf>,
    pub game_path: PathBuf,
    pub launcher_exe: PathBuf,
    pub mods_total: usize,
    pub mods_enabled: usize,
    pub latest_log: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

pub async fn troubleshoot(
    settings: &LauncherSettings,
    paths: &ProfilePaths,
    registry: &ModRegistry,
) -> LauncherResult<TroubleshootInfo> {
    let mods = registry.list().await?;
    let latest = latest_log(&paths.runtime_logs_dir).await;
    Ok(TroubleshootInfo {
        version: env!("CARGO_PKG_VERSION"),
        platform: std::env::consts::OS,
        data_path: settings.data_path.clone(),
        profile_path: settings.profile_path.clone(),
        tf2_path: settings.tf2_path.clone(),
        game_path: settings.game_path.clone(),
        launcher_exe: paths.launcher_exe.clone(),
        mods_total: mods.len(),
        mods_enabled: mods.iter().filter(|m| m.enabled).count(),
        latest_log: latest.map(|stamp| stamp.path),
        timestamp: Utc::now(),
    })
}

// ── Compile check ───────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileCheck {
    pub ok: bool,
    pub log_path: Option<PathBuf>,
    pub summary: String,
    pub tail: String,
    pub quarantined: Vec<String>,
}

/// Drop the compiled cache, verify the install and pair the first issues with
/// the tail of the service log.
pub async fn compile_check(
    settings: &LauncherSettings,
    paths: &ProfilePaths,
    registry: &ModRegistry,
    service_log: Option<PathBuf>,
    tail_lines: usize,
) -> LauncherResult<CompileCheck> {
    clear_compiled_cache(paths).await?;
    let report = verify(settings, paths, registry).await?;
    let summary = report
        .issues
        .iter()
        .take(COMPILE_SUMMARY_ISSUES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" | ");
    let tail = match &service_log {
        Some(path) => fs_utils::tail_file(path, tail_lines).await?,
        None => String::new(),
    };
    Ok(CompileCheck {
        ok: report.ok,
        log_path: service_log,
        summary,
        tail,
        quarantined: Vec::new(),
    })
}

// ── Exports ─────────────────────────────────────────────

/// Exports go to the data dir when it exists, else the install root.
pub fn export_dir(settings: &LauncherSettings) -> PathBuf {
    if settings.data_path.is_dir() {
        settings.data_path.clone()
    } else {
        install_root()
    }
}

fn export_name(kind: &str, extension: &str) -> String {
    format!(
        "{APP_DIR_NAME}-{kind}-{}.{extension}",
        Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ")
    )
}

/// Copy the newest runtime log into `dir` as `Project-P1L0T-nslog-<stamp>.txt`.
pub async fn export_latest_log(paths: &ProfilePaths, dir: &Path) -> LauncherResult<PathBuf> {
    let latest = latest_log(&paths.runtime_logs_dir)
        .await
        .ok_or_else(|| LauncherError::NotFound("No log file found".into()))?;
    fs_utils::ensure_dir(dir).await?;
    let dest = dir.join(export_name("nslog", "txt"));
    tokio::fs::copy(&latest.path, &dest)
        .await
        .map_err(|e| LauncherError::io(&dest, e))?;
    info!("Copied {:?} to {:?}", latest.path, dest);
    Ok(dest)
}

#[derive(Debug, Serialize)]
pub struct TroubleshootSnapshot {
    pub info: TroubleshootInfo,
    pub verify: VerifyReport,
}

/// Write troubleshoot info plus a verify report into `dir` as
/// `Project-P1L0T-troubleshoot-<stamp>.json`.
pub async fn export_troubleshoot(
    settings: &LauncherSettings,
    paths: &ProfilePaths,
    registry: &ModRegistry,
    dir: &Path,
) -> LauncherResult<PathBuf> {
    let snapshot = TroubleshootSnapshot {
        info: troubleshoot(settings, paths, registry).await?,
        verify: verify(settings, paths, registry).await?,
    };
    let dest = dir.join(export_name("troubleshoot", "json"));
    fs_utils::write_json_pretty(&dest, &snapshot).await?;
    info!("Wrote troubleshoot snapshot {:?}", dest);
    Ok(dest)
}
