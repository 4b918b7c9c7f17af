// ─── Install Progress ───
// The single observable install record. Writers go through `ProgressTracker`;
// readers only ever receive cloned snapshots from the watch channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Download progress occupies 0..=DOWNLOAD_CEILING of the overall bar.
pub const DOWNLOAD_CEILING: u8 = 80;
pub const EXTRACT_FLOOR: u8 = 82;
pub const EXTRACT_CEILING: u8 = 96;
pub const EXTRACT_STEP: u8 = 2;
pub const FINALIZING_PROGRESS: u8 = 98;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Idle,
    Running,
    Complete,
    Error,
    Launched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPhase {
    Idle,
    Checking,
    Download,
    Extract,
    Finalizing,
    Complete,
    Error,
    Launched,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallState {
    pub status: InstallStatus,
    pub phase: InstallPhase,
    pub progress: u8,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub speed_bps: f64,
    pub message: String,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for InstallState {
    fn default() -> Self {
        Self {
            status: InstallStatus::Idle,
            phase: InstallPhase::Idle,
            progress: 0,
            downloaded_bytes: 0,
            total_bytes: 0,
            speed_bps: 0.0,
            message: String::new(),
            error: None,
            updated_at: Utc::now(),
        }
    }
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            InstallStatus::Complete | InstallStatus::Error | InstallStatus::Launched
        )
    }
}

/// Map a byte count onto the download share of the overall bar.
pub fn download_progress(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = downloaded as f64 / total as f64;
    (ratio * DOWNLOAD_CEILING as f64)
        .round()
        .clamp(0.0, DOWNLOAD_CEILING as f64) as u8
}

/// Owner of the shared [`InstallState`].
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    tx: watch::Sender<InstallState>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(InstallState::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> InstallState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InstallState> {
        self.tx.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut InstallState)) {
        self.tx.send_modify(|state| {
            apply(state);
            state.updated_at = Utc::now();
        });
    }

    // ── Transitions ─────────────────────────────────────

    pub fn reset(&self) {
        self.tx.send_replace(InstallState::default());
    }

    pub fn checking(&self) {
        self.update(|s| {
            s.status = InstallStatus::Running;
            s.phase = InstallPhase::Checking;
            s.message = "Checking latest release".into();
        });
    }

    pub fn downloading(&self) {
        self.update(|s| {
            s.phase = InstallPhase::Download;
            s.message = "Downloading modpack".into();
        });
    }

    /// Record a download sample. Progress never moves backwards.
    pub fn download_sample(&self, downloaded: u64, total: u64, speed_bps: f64) {
        self.update(|s| {
            s.downloaded_bytes = downloaded;
            s.total_bytes = total;
            s.speed_bps = speed_bps;
            s.progress = s.progress.max(download_progress(downloaded, total));
        });
    }

    pub fn extracting(&self) {
        self.update(|s| {
            s.phase = InstallPhase::Extract;
            s.message = "Extracting modpack".into();
            s.speed_bps = 0.0;
            s.progress = s.progress.max(EXTRACT_FLOOR);
        });
    }

    /// Synthetic extraction tick.
    pub fn bump_extract(&self) {
        self.update(|s| {
            if s.phase == InstallPhase::Extract {
                s.progress = (s.progress + EXTRACT_STEP).min(EXTRACT_CEILING).max(s.progress);
            }
        });
    }

    pub fn finalizing(&self) {
        self.update(|s| {
            s.phase = InstallPhase::Finalizing;
            s.message = "Finalizing modpack".into();
            s.progress = s.progress.max(FINALIZING_PROGRESS);
        });
    }

    pub fn complete(&self, message: &str) {
        self.update(|s| {
            s.status = InstallStatus::Complete;
            s.phase = InstallPhase::Complete;
            s.progress = 100;
            s.message = message.to_string();
        });
    }

    pub fn fail(&self, message: &str, error: &str) {
        self.update(|s| {
            s.status = InstallStatus::Error;
            s.phase = InstallPhase::Error;
            s.message = message.to_string();
            s.error = Some(error.to_string());
        });
    }

    pub fn mark_launched(&self) {
        self.update(|s| {
            s.status = InstallStatus::Launched;
            s.phase = InstallPhase::Launched;
            s.progress = 100;
            s.message = "Game launched".into();
        });
    }
}
