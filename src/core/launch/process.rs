// ─── Process Probe ───
// Detection and termination of the game and launcher processes by image name.

use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Seam over the OS process table.
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    /// Whether any process with this image name (e.g. `Titanfall2.exe`) runs.
    async fn is_running(&self, image: &str) -> bool;

    /// Kill every process with this image name. Returns how many were signalled.
    async fn kill_all(&self, image: &str) -> usize;
}

/// Case-insensitive image match against the process name or executable file
/// name. Wine/Proton report the `.exe` name either way.
fn matches_image(process: &sysinfo::Process, image: &str) -> bool {
    let stem = image.strip_suffix(".exe").unwrap_or(image);
    let name = process.name().to_string_lossy();
    if name.eq_ignore_ascii_case(image) || name.eq_ignore_ascii_case(stem) {
        return true;
    }
    process
        .exe()
        .and_then(|exe| exe.file_name())
        .map(|file| file.to_string_lossy().eq_ignore_ascii_case(image))
        .unwrap_or(false)
}

/// [`ProcessProbe`] backed by `sysinfo`. Table refreshes run on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessProbe;

impl SystemProcessProbe {
    fn scan(image: String, kill: bool) -> usize {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let mut hits = 0;
        for process in system.processes().values() {
            if !matches_image(process, &image) {
                continue;
            }
            if kill {
                if process.kill() {
                    info!("Killed {} (pid {})", image, process.pid());
                    hits += 1;
                }
            } else {
                hits += 1;
            }
        }
        hits
    }
}

#[async_trait]
impl ProcessProbe for SystemProcessProbe {
    async fn is_running(&self, image: &str) -> bool {
        let image = image.to_string();
        tokio::task::spawn_blocking(move || Self::scan(image, false) > 0)
            .await
            .unwrap_or(false)
    }

    async fn kill_all(&self, image: &str) -> usize {
        let image = image.to_string();
        tokio::task::spawn_blocking(move || Self::scan(image, true))
            .await
            .unwrap_or(0)
    }
}

/// Poll until `image` is gone. Returns `true` once it has exited.
pub async fn wait_for_exit(
    probe: &dyn ProcessProbe,
    image: &str,
    attempts: usize,
    delay: Duration,
) -> bool {
    for attempt in 0..attempts {
        if !probe.is_running(image).await {
            return true;
        }
        debug!("{} still running (attempt {})", image, attempt + 1);
        tokio::time::sleep(delay).await;
    }
    !probe.is_running(image).await
}

/// Why [`wait_for_process`] stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Detected,
    /// The watched child exited first, carrying its exit code when known.
    ChildExited(Option<i32>),
    TimedOut,
    Cancelled,
}

/// Poll for `image` every `interval` until `timeout`, returning early when the
/// child publishes its exit on `exit_rx` or `cancel` fires.
pub async fn wait_for_process(
    probe: &dyn ProcessProbe,
    image: &str,
    timeout: Duration,
    interval: Duration,
    exit_rx: &mut tokio::sync::watch::Receiver<Option<Option<i32>>>,
    cancel: &CancellationToken,
) -> WaitOutcome {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if probe.is_running(image).await {
            return WaitOutcome::Detected;
        }
        let exited = *exit_rx.borrow();
        if let Some(code) = exited {
            return WaitOutcome::ChildExited(code);
        }
        if tokio::time::Instant::now() >= deadline {
            return WaitOutcome::TimedOut;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return WaitOutcome::Cancelled,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::modpack::install::tests::FakeProbe;

    #[tokio::test]
    async fn wait_for_exit_sees_killed_process() {
        let probe = FakeProbe::default();
        probe.running.lock().unwrap().insert("Titanfall2.exe".into());
        assert!(!wait_for_exit(&probe, "Titanfall2.exe", 2, Duration::from_millis(1)).await);

        assert_eq!(probe.kill_all("Titanfall2.exe").await, 1);
        assert!(wait_for_exit(&probe, "Titanfall2.exe", 2, Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn wait_for_process_returns_on_child_exit() {
        let probe = FakeProbe::default();
        let (tx, mut rx) = tokio::sync::watch::channel(None);
        tx.send_replace(Some(Some(0)));

        let outcome = wait_for_process(
            &probe,
            "Titanfall2.exe",
            Duration::from_secs(5),
            Duration::from_millis(5),
            &mut rx,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome, WaitOutcome::ChildExited(Some(0)));
    }

    #[tokio::test]
    async fn wait_for_process_detects_and_times_out() {
        let probe = FakeProbe::default();
        let (_tx, mut rx) = tokio::sync::watch::channel(None);

        let timed_out = wait_for_process(
            &probe,
            "Titanfall2.exe",
            Duration::from_millis(20),
            Duration::from_millis(5),
            &mut rx,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(timed_out, WaitOutcome::TimedOut);

        probe.running.lock().unwrap().insert("Titanfall2.exe".into());
        let detected = wait_for_process(
            &probe,
            "Titanfall2.exe",
            Duration::from_millis(20),
            Duration::from_millis(5),
            &mut rx,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(detected, WaitOutcome::Detected);
    }

    #[tokio::test]
    async fn system_probe_does_not_find_bogus_image() {
        assert!(!SystemProcessProbe.is_running("definitely-not-running-p1lot.exe").await);
    }
}
