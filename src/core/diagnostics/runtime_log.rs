// ─── Runtime Log Scanning ───
// Reads the modding runtime's own logs to find compile errors and the mods
// they belong to.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

pub const COMPILE_ERROR_MARKER: &str = "COMPILE ERROR";
pub const OWNERSHIP_MARKER: &str = "belongs to";

/// Compile errors reported on the launch path.
pub const LAUNCH_COMPILE_ERROR_LIMIT: usize = 9;

fn ownership_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"belongs to ([^\r\n]+)").expect("valid ownership regex"))
}

fn trailing_parenthetical() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(.*\)\s*$").expect("valid parenthetical regex"))
}

/// Newest runtime log and its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStamp {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// The most recently modified file in `logs_dir`, or `None` when the
/// directory is missing or empty.
pub async fn latest_log(logs_dir: &Path) -> Option<LogStamp> {
    let mut entries = tokio::fs::read_dir(logs_dir).await.ok()?;
    let mut newest: Option<LogStamp> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if newest.as_ref().map_or(true, |n| modified > n.modified) {
            newest = Some(LogStamp {
                path: entry.path(),
                modified,
            });
        }
    }

    newest
}

// ── Pure scanners ───────────────────────────────────────

/// Names captured after `belongs to`, each followed by its form without a
/// trailing parenthetical when that differs. First occurrence order.
pub fn scan_broken_mods(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut push = |name: String| {
        if !name.is_empty() && seen.insert(name.clone()) {
            names.push(name);
        }
    };

    for capture in ownership_regex().captures_iter(content) {
        let raw = capture[1].trim().to_string();
        let normalized = trailing_parenthetical().replace(&raw, "").trim().to_string();
        push(raw.clone());
        if normalized != raw {
            push(normalized);
        }
    }

    names
}

/// Compile-error lines with their context, deduplicated, keeping the last `limit`.
///
/// For each line containing [`COMPILE_ERROR_MARKER`] the trimmed line is kept,
/// then the next non-empty line, then the line after that if it names an owner.
pub fn collect_compile_errors(content: &str, limit: usize) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut found = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if !line.contains(COMPILE_ERROR_MARKER) {
            continue;
        }
        found.push(line.trim().to_string());
        if let Some(next) = lines.get(i + 1).map(|l| l.trim()) {
            if !next.is_empty() {
                found.push(next.to_string());
            }
        }
        if let Some(owner) = lines.get(i + 2) {
            if owner.contains(OWNERSHIP_MARKER) {
                found.push(owner.trim().to_string());
            }
        }
    }

    let mut seen = HashSet::new();
    found.retain(|line| seen.insert(line.clone()));
    let skip = found.len().saturating_sub(limit);
    found.split_off(skip)
}

// ── Log-backed reports ──────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileErrorReport {
    pub log_path: Option<PathBuf>,
    pub errors: Vec<String>,
}

async fn read_log(path: &Path) -> LauncherResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Broken-mod candidates from the newest runtime log.
pub async fn broken_mods_in_latest(logs_dir: &Path) -> LauncherResult<Vec<String>> {
    let Some(latest) = latest_log(logs_dir).await else {
        return Ok(Vec::new());
    };
    let names = scan_broken_mods(&read_log(&latest.path).await?);
    debug!("{} broken-mod candidates in {:?}", names.len(), latest.path);
    Ok(names)
}

/// Compile errors from the newest runtime log.
pub async fn compile_errors_in_latest(
    logs_dir: &Path,
    limit: usize,
) -> LauncherResult<CompileErrorReport> {
    let Some(latest) = latest_log(logs_dir).await else {
        return Ok(CompileErrorReport::default());
    };
    let errors = collect_compile_errors(&read_log(&latest.path).await?, limit);
    Ok(CompileErrorReport {
        log_path: Some(latest.path),
        errors,
    })
}
