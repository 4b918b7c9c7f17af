// ─── Install Controller ───
// Runs one modpack install/update attempt at a time in the background:
//   checking → download → extract → finalizing → complete
// Failures land in the `error` phase; the in-flight guard is always released.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::extract::{extract_archive, replace_dir, resolve_extract_root};
use super::overrides;
use super::progress::{InstallState, ProgressTracker};
use super::release::{ReleaseDescriptor, ReleaseSource};
use super::version::{update_available, LocalModpackStatus, VersionMarker};
use crate::core::downloader::{AssetFetcher, DownloadProgress};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils;
use crate::core::launch::ProcessProbe;
use crate::core::state::settings::{GAME_EXE, LAUNCHER_EXE};

/// Spacing of synthetic extraction progress ticks.
pub const EXTRACT_TICK: Duration = Duration::from_millis(600);

pub const ALREADY_RUNNING: &str = "Modpack update already running";

/// Everything one attempt needs, resolved from fresh settings by the caller.
#[derive(Clone)]
pub struct InstallJob {
    pub profile_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub releases: Arc<dyn ReleaseSource>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub probe: Arc<dyn ProcessProbe>,
}

/// Outcome of a finished attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    pub skipped: bool,
    pub release: ReleaseDescriptor,
}

struct Inner {
    tracker: ProgressTracker,
    in_flight: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

/// Process-wide owner of install attempts and the shared [`InstallState`].
#[derive(Clone)]
pub struct InstallController {
    inner: Arc<Inner>,
}

impl Default for InstallController {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the in-flight flag when the attempt ends, however it ends.
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.inner.cancel.lock() {
            *slot = None;
        }
        self.inner.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Aborts the extraction ticker on every exit path.
struct Ticker(JoinHandle<()>);

impl Drop for Ticker {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl InstallController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tracker: ProgressTracker::new(),
                in_flight: AtomicBool::new(false),
                cancel: Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> InstallState {
        self.inner.tracker.snapshot()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<InstallState> {
        self.inner.tracker.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Drive the shared state to `launched` unless an attempt is in flight.
    pub fn mark_launched_if_idle(&self) -> bool {
        if self.is_running() {
            return false;
        }
        self.inner.tracker.mark_launched();
        true
    }

    /// Signal the running attempt to stop. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let token = self
            .inner
            .cancel
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().cloned());
        match token {
            Some(token) => {
                info!("Cancelling modpack install");
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn acquire(&self) -> LauncherResult<InFlightGuard> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LauncherError::Conflict {
                message: ALREADY_RUNNING.into(),
                state: Some(Box::new(self.snapshot())),
            });
        }
        Ok(InFlightGuard {
            inner: self.inner.clone(),
        })
    }

    /// Start an attempt in the background and return the state right after
    /// the reset. A second call while one is running is a Conflict and does not
    /// touch the running attempt's state.
    pub async fn start(&self, job: InstallJob, force: bool) -> LauncherResult<InstallState> {
        let guard = self.acquire()?;

        for image in [GAME_EXE, LAUNCHER_EXE] {
            if job.probe.is_running(image).await {
                return Err(LauncherError::Conflict {
                    message: format!("{image} is running"),
                    state: None,
                });
            }
        }

        let cancel = CancellationToken::new();
        if let Ok(mut slot) = self.inner.cancel.lock() {
            *slot = Some(cancel.clone());
        }

        let tracker = self.inner.tracker.clone();
        tracker.reset();
        tracker.checking();
        let snapshot = tracker.snapshot();

        tokio::spawn(async move {
            let _guard = guard;
            match run_install(&tracker, &job, force, &cancel).await {
                Ok(report) => info!(
                    "Modpack install finished (version {}, skipped={})",
                    report.release.version, report.skipped
                ),
                Err(LauncherError::Cancelled) => {
                    warn!("Modpack install cancelled");
                    tracker.fail("Install cancelled", "Install cancelled");
                }
                Err(err) => {
                    error!("Modpack install failed: {}", err);
                    tracker.fail("Modpack update failed", &err.to_string());
                }
            }
        });

        Ok(snapshot)
    }
}

/// The attempt body. State transitions happen here; the caller owns the guard.
pub async fn run_install(
    tracker: &ProgressTracker,
    job: &InstallJob,
    force: bool,
    cancel: &CancellationToken,
) -> LauncherResult<InstallReport> {
    let release = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
        release = job.releases.resolve_latest() => release?,
    };

    let local = LocalModpackStatus::read(&job.profile_dir).await;
    let outdated = update_available(local.current_version.as_deref(), Some(&release.version));
    if !force && local.installed && !outdated {
        tracker.complete("Modpack already up to date");
        return Ok(InstallReport {
            skipped: true,
            release,
        });
    }

    fs_utils::ensure_dir(&job.downloads_dir).await?;
    let zip_path = job
        .downloads_dir
        .join(format!("Project-P1L0T-modpack-{}.zip", release.version));

    tracker.downloading();
    let on_progress = |p: DownloadProgress| {
        tracker.download_sample(p.bytes_downloaded, p.total_bytes, p.speed_bps)
    };
    let result: LauncherResult<()> = async {
        job.fetcher
            .fetch(
                &release.asset_url,
                &zip_path,
                release.asset_sha256.as_deref(),
                &on_progress,
                cancel,
            )
            .await?;

        tracker.extracting();
        let ticker = spawn_extract_ticker(tracker.clone());
        install_from_zip(&job.profile_dir, &zip_path, &job.downloads_dir, cancel).await?;
        drop(ticker);

        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }
        tracker.finalizing();
        VersionMarker::from_release(&release)
            .write(&job.profile_dir)
            .await?;
        tracker.complete("Modpack ready");
        Ok(())
    }
    .await;

    fs_utils::remove_quietly(&zip_path).await;
    result?;

    Ok(InstallReport {
        skipped: false,
        release,
    })
}

fn spawn_extract_ticker(tracker: ProgressTracker) -> Ticker {
    Ticker(tokio::spawn(async move {
        let mut interval = tokio::time::interval(EXTRACT_TICK);
        interval.tick().await;
        loop {
            interval.tick().await;
            tracker.bump_extract();
        }
    }))
}

/// Replace the modpack root with the archive contents, keeping user overrides.
pub async fn install_from_zip(
    profile_dir: &Path,
    zip_path: &Path,
    scratch_dir: &Path,
    cancel: &CancellationToken,
) -> LauncherResult<()> {
    let captured = overrides::capture(profile_dir).await?;
    let temp_dir = scratch_dir.join(format!("modpack-{}", Uuid::new_v4()));

    let result: LauncherResult<()> = async {
        extract_archive(zip_path, &temp_dir, cancel.clone()).await?;
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }
        let source_root = resolve_extract_root(&temp_dir).await?;
        replace_dir(&source_root, profile_dir).await?;
        overrides::restore(profile_dir, &captured).await
    }
    .await;

    fs_utils::remove_quietly(&temp_dir).await;
    result
}
