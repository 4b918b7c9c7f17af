use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils;
use crate::core::http::get_following_redirects;

/// Minimum spacing between progress samples.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(400);

const OCTET_STREAM: &str = "application/octet-stream";

/// Progress sample handed to the caller while streaming.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    /// 0 when the server sent no `Content-Length`.
    pub total_bytes: u64,
    pub speed_bps: f64,
}

pub type ProgressFn<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub sha256: String,
}

/// Anything that can put a remote asset on disk. The install controller only
/// sees this seam.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
        on_progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> LauncherResult<DownloadOutcome>;
}

/// Streaming downloader with bounded redirects and SHA-256 verification.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    // ── Single file download ────────────────────────────

    /// Stream `url` into `dest`, creating parent directories as needed.
    ///
    /// Bytes land in a `.part` sibling that is renamed onto `dest` only after
    /// the body ends and, when `expected_sha256` is set, its digest matches.
    /// Progress is reported at most every [`PROGRESS_INTERVAL`], with a final
    /// zero-speed sample once the body ends.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
        on_progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> LauncherResult<DownloadOutcome> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
            response = get_following_redirects(&self.client, url, OCTET_STREAM) => response?,
        };

        if let Some(parent) = dest.parent() {
            fs_utils::ensure_dir(parent).await?;
        }

        let part = part_path(dest);
        let outcome = match stream_to_file(response, &part, on_progress, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                fs_utils::remove_quietly(&part).await;
                return Err(err);
            }
        };

        if let Some(expected) = expected_sha256 {
            if !outcome.sha256.eq_ignore_ascii_case(expected) {
                fs_utils::remove_quietly(&part).await;
                return Err(LauncherError::ChecksumMismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual: outcome.sha256,
                });
            }
            debug!("SHA-256 verified for {:?}", dest);
        }

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        info!(
            "Downloaded {} bytes: {} -> {:?}",
            outcome.downloaded_bytes, url, dest
        );
        Ok(outcome)
    }
}

/// `pack.zip` -> `pack.zip.part`.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn stream_to_file(
    response: reqwest::Response,
    path: &Path,
    on_progress: ProgressFn<'_>,
    cancel: &CancellationToken,
) -> LauncherResult<DownloadOutcome> {
    let total_bytes = response.content_length().unwrap_or(0);
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut downloaded = 0u64;
    let mut last_tick = Instant::now();
    let mut last_bytes = 0u64;

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;

        hasher.update(&chunk);
        file.write_all(&chunk)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        downloaded += chunk.len() as u64;

        let elapsed = last_tick.elapsed();
        if elapsed >= PROGRESS_INTERVAL {
            let delta = downloaded - last_bytes;
            on_progress(DownloadProgress {
                bytes_downloaded: downloaded,
                total_bytes,
                speed_bps: delta as f64 / elapsed.as_secs_f64(),
            });
            last_tick = Instant::now();
            last_bytes = downloaded;
        }
    }

    file.flush().await.map_err(|e| LauncherError::io(path, e))?;
    drop(file);

    on_progress(DownloadProgress {
        bytes_downloaded: downloaded,
        total_bytes,
        speed_bps: 0.0,
    });

    Ok(DownloadOutcome {
        downloaded_bytes: downloaded,
        total_bytes,
        sha256: hex::encode(hasher.finalize()),
    })
}

#[async_trait]
impl AssetFetcher for Downloader {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
        on_progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> LauncherResult<DownloadOutcome> {
        self.download_file(url, dest, expected_sha256, on_progress, cancel)
            .await
    }
}
