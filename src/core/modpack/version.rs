// ─── Modpack Version ───
// Lenient version comparison and the `modpack.version.json` marker written
// after a successful install.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::release::ReleaseDescriptor;
use crate::core::error::LauncherResult;
use crate::core::fs_utils::write_json_pretty;
use crate::core::state::settings::LAUNCHER_EXE;

pub const VERSION_MARKER_FILE: &str = "modpack.version.json";

/// Strip whitespace and a leading `v`/`V`.
pub fn normalize_version(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix(['v', 'V'])
        .unwrap_or(trimmed)
        .to_string()
}

fn numeric_parts(raw: &str) -> Vec<u64> {
    normalize_version(raw)
        .split('.')
        .map(|part| {
            let digits: String = part
                .trim()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse::<u64>().unwrap_or(0)
        })
        .collect()
}

/// Compare dotted versions numerically by each part's leading digits.
/// Non-numeric or missing parts count as 0, so `"1.2"` equals `"1.2.0"` and
/// `"v2"` equals `"2"`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = numeric_parts(a);
    let right = numeric_parts(b);
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// `true` when `latest` is strictly newer than `current`.
pub fn update_available(current: Option<&str>, latest: Option<&str>) -> bool {
    match (current, latest) {
        (Some(current), Some(latest)) => compare_versions(latest, current) == Ordering::Greater,
        (None, Some(_)) => true,
        _ => false,
    }
}

/// Contents of `modpack.version.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMarker {
    pub version: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub published_at: Option<String>,
    pub installed_at: DateTime<Utc>,
}

impl VersionMarker {
    pub fn from_release(release: &ReleaseDescriptor) -> Self {
        Self {
            version: release.version.clone(),
            tag: release.tag.clone(),
            name: release.name.clone(),
            published_at: release.published_at.clone(),
            installed_at: Utc::now(),
        }
    }

    pub fn path_in(profile_dir: &Path) -> PathBuf {
        profile_dir.join(VERSION_MARKER_FILE)
    }

    /// Read the marker from the profile root. A missing or corrupt marker reads
    /// as "no version installed".
    pub async fn read(profile_dir: &Path) -> Option<Self> {
        let path = Self::path_in(profile_dir);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(marker) => Some(marker),
            Err(err) => {
                warn!("Ignoring corrupt version marker {:?}: {}", path, err);
                None
            }
        }
    }

    pub async fn write(&self, profile_dir: &Path) -> LauncherResult<()> {
        write_json_pretty(&Self::path_in(profile_dir), self).await
    }
}

/// Whether a modpack is present under `profile_dir`.
pub fn is_installed(profile_dir: &Path) -> bool {
    profile_dir.join("R2Northstar").exists() || profile_dir.join(LAUNCHER_EXE).exists()
}

/// Local half of the status response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalModpackStatus {
    pub installed: bool,
    pub modpack_root: PathBuf,
    pub current_version: Option<String>,
}

impl LocalModpackStatus {
    pub async fn read(profile_dir: &Path) -> Self {
        let marker = VersionMarker::read(profile_dir).await;
        Self {
            installed: is_installed(profile_dir),
            modpack_root: profile_dir.to_path_buf(),
            current_version: marker.map(|m| m.version),
        }
    }
}
