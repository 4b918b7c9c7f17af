// ─── Quarantine ───
// Disables and relocates mods implicated by the runtime log.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::runtime_log::broken_mods_in_latest;
use crate::core::error::LauncherResult;
use crate::core::fs_utils;
use crate::core::mods::{ModEntry, ModRegistry};
use crate::core::state::settings::APP_DIR_NAME;
use crate::core::state::ProfilePaths;

/// Runtime-owned namespace that is never quarantined.
pub const RESERVED_PREFIX: &str = "Northstar";

/// One way of pairing a log name with a listed mod. Inputs are lowercase.
type MatchStrategy = fn(&ModEntry, &str) -> bool;

fn exact_name(entry: &ModEntry, needle: &str) -> bool {
    entry.name.to_lowercase() == needle
}

fn exact_folder(entry: &ModEntry, needle: &str) -> bool {
    entry.folder.to_lowercase() == needle
}

fn prefix_either_way(candidate: &str, needle: &str) -> bool {
    candidate.starts_with(needle) || needle.starts_with(candidate)
}

fn name_prefix(entry: &ModEntry, needle: &str) -> bool {
    prefix_either_way(&entry.name.to_lowercase(), needle)
}

fn folder_prefix(entry: &ModEntry, needle: &str) -> bool {
    prefix_either_way(&entry.folder.to_lowercase(), needle)
}

/// Tried in order; exact matches are one pass since name and folder rank equal.
const STRATEGIES: &[&[MatchStrategy]] = &[
    &[exact_name, exact_folder],
    &[name_prefix],
    &[folder_prefix],
];

/// First listed mod matched by the earliest strategy that matches anything.
pub fn find_mod_match<'a>(mods: &'a [ModEntry], name: &str) -> Option<&'a ModEntry> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    STRATEGIES.iter().find_map(|tier| {
        mods.iter()
            .find(|entry| tier.iter().any(|strategy| strategy(entry, &needle)))
    })
}

fn is_protected(name: &str) -> bool {
    name == APP_DIR_NAME || name.starts_with(RESERVED_PREFIX)
}

async fn move_to_quarantine(source: &Path, target: &Path) -> LauncherResult<()> {
    relocate(source, target, |from, to| async move { tokio::fs::rename(from, to).await }).await
}

/// Move `source` to `target`, falling back to copy and delete when `rename`
/// fails (cross-volume moves, handles held open).
async fn relocate<F, Fut>(source: &Path, target: &Path, rename: F) -> LauncherResult<()>
where
    F: FnOnce(PathBuf, PathBuf) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Some(parent) = target.parent() {
        fs_utils::ensure_dir(parent).await?;
    }
    if target.exists() {
        fs_utils::safe_remove(target).await?;
    }
    match rename(source.to_path_buf(), target.to_path_buf()).await {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!(
                "Rename {:?} -> {:?} failed ({}), copying instead",
                source, target, err
            );
            fs_utils::copy_dir(source, target).await?;
            fs_utils::safe_remove(source).await
        }
    }
}

/// Disable every mod the newest runtime log blames and move its folder into
/// the quarantine directory. Returns the quarantined mod names.
pub async fn quarantine(registry: &ModRegistry, paths: &ProfilePaths) -> LauncherResult<Vec<String>> {
    let candidates = broken_mods_in_latest(&paths.runtime_logs_dir).await?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mods = registry.list().await?;
    let mut quarantined: Vec<String> = Vec::new();

    for candidate in &candidates {
        if is_protected(candidate) {
            continue;
        }
        let Some(entry) = find_mod_match(&mods, candidate) else {
            continue;
        };
        if is_protected(&entry.name) || quarantined.contains(&entry.name) {
            continue;
        }

        registry.disable_all_versions(&entry.name).await?;

        let source = paths.mod_dir(&entry.folder);
        if source.exists() {
            let target = paths.quarantine_dir().join(&entry.folder);
            if let Err(err) = move_to_quarantine(&source, &target).await {
                warn!("Failed to quarantine {}: {}", entry.name, err);
                return Err(err);
            }
        }

        info!("Quarantined {} (log name {:?})", entry.name, candidate);
        quarantined.push(entry.name.clone());
    }

    Ok(quarantined)
}
