use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::paths::{AppPaths, ProfilePaths};
use super::settings::LauncherSettings;
use crate::core::downloader::{AssetFetcher, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::launch::{
    LaunchOrchestrator, LaunchRequest, LaunchTimings, ProcessProbe, SystemProcessProbe,
};
use crate::core::modpack::{GithubReleaseResolver, InstallController, InstallJob, ReleaseSource};
use crate::core::mods::ModRegistry;

pub const LAUNCH_IN_PROGRESS: &str = "Launch already in progress";

/// Shared state behind every request. Each field synchronizes itself, so the
/// whole struct is handed around as `Arc<AppState>` and long operations never
/// block status or progress reads.
pub struct AppState {
    pub paths: AppPaths,
    pub http_client: Client,
    pub install: InstallController,
    probe: Arc<dyn ProcessProbe>,
    fetcher: Arc<dyn AssetFetcher>,
    release_override: Option<Arc<dyn ReleaseSource>>,
    launch_timings: LaunchTimings,
    settings: Mutex<LauncherSettings>,
    /// Serializes enabled-map read-modify-write across registries.
    registry_lock: Arc<Mutex<()>>,
    launch_lock: Mutex<()>,
}

impl AppState {
    pub fn new(paths: AppPaths) -> LauncherResult<Self> {
        let http_client = build_http_client()?;
        let settings = LauncherSettings::load_or_init(&paths.settings_file());
        Ok(Self {
            fetcher: Arc::new(Downloader::new(http_client.clone())),
            http_client,
            install: InstallController::new(),
            probe: Arc::new(SystemProcessProbe),
            release_override: None,
            launch_timings: LaunchTimings::default(),
            settings: Mutex::new(settings),
            registry_lock: Arc::new(Mutex::new(())),
            launch_lock: Mutex::new(()),
            paths,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the GitHub resolver, e.g. with a mirror or a fixed release.
    pub fn with_release_source(mut self, source: Arc<dyn ReleaseSource>) -> Self {
        self.release_override = Some(source);
        self
    }

    pub fn with_launch_timings(mut self, timings: LaunchTimings) -> Self {
        self.launch_timings = timings;
        self
    }

    // ── Settings ────────────────────────────────────────

    /// Re-read `launcher.config.json`, so edits made by other tools apply.
    pub async fn reload_settings(&self) -> LauncherSettings {
        let path = self.paths.settings_file();
        let fresh = tokio::task::spawn_blocking(move || LauncherSettings::load_or_init(&path))
            .await
            .ok();
        let mut guard = self.settings.lock().await;
        if let Some(fresh) = fresh {
            *guard = fresh;
        }
        debug!("Settings reloaded (profile {:?})", guard.profile_path);
        guard.clone()
    }

    pub async fn settings(&self) -> LauncherSettings {
        self.settings.lock().await.clone()
    }

    // ── Component factories ─────────────────────────────

    pub fn registry(&self, paths: &ProfilePaths) -> ModRegistry {
        ModRegistry::new(paths, self.registry_lock.clone())
    }

    pub fn release_source(&self, settings: &LauncherSettings) -> Arc<dyn ReleaseSource> {
        match &self.release_override {
            Some(source) => source.clone(),
            None => Arc::new(GithubReleaseResolver::new(
                self.http_client.clone(),
                &settings.release_repo,
                &settings.modpack_asset_name,
            )),
        }
    }

    pub fn install_job(&self, settings: &LauncherSettings) -> InstallJob {
        InstallJob {
            profile_dir: settings.profile_path.clone(),
            downloads_dir: self.paths.downloads_dir(),
            releases: self.release_source(settings),
            fetcher: self.fetcher.clone(),
            probe: self.probe.clone(),
        }
    }

    pub fn launcher(&self) -> LaunchOrchestrator {
        LaunchOrchestrator::new(self.probe.clone(), self.install.clone())
            .with_timings(self.launch_timings)
    }

    pub fn launch_request(&self, settings: &LauncherSettings, defer_signal: bool) -> LaunchRequest {
        LaunchRequest {
            paths: ProfilePaths::resolve(settings),
            launch_params: settings.launch_params.clone(),
            logs_dir: self.paths.logs_dir(),
            signal_file: self.paths.launch_signal_file(),
            defer_signal,
        }
    }

    /// One launch at a time.
    pub fn try_begin_launch(&self) -> LauncherResult<MutexGuard<'_, ()>> {
        self.launch_lock
            .try_lock()
            .map_err(|_| LauncherError::conflict(LAUNCH_IN_PROGRESS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reload_picks_up_external_edits() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::new(AppPaths::new(tmp.path().to_path_buf())).unwrap();
        assert!(state.paths.settings_file().exists());

        let mut edited = state.settings().await;
        edited.launch_params = vec!["-windowed".into()];
        edited.save(&state.paths.settings_file()).unwrap();

        assert_eq!(state.reload_settings().await.launch_params, vec!["-windowed"]);
        assert_eq!(state.settings().await.launch_params, vec!["-windowed"]);
    }

    #[tokio::test]
    async fn second_launch_is_rejected_while_first_holds_the_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::new(AppPaths::new(tmp.path().to_path_buf())).unwrap();
        let _first = state.try_begin_launch().unwrap();
        let err = state.try_begin_launch().unwrap_err();
        assert_eq!(err.to_string(), LAUNCH_IN_PROGRESS);
    }
}
