use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::enabled_map::EnabledMap;
use super::manifest::{ModManifest, MANIFEST_FILE};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils::{self, write_json_pretty};
use crate::core::state::ProfilePaths;

pub const DEFAULT_MOD_VERSION: &str = "0.0.0";

/// A mod as presented to callers. `name` is the durable identity, `folder`
/// the on-disk directory, which may differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub folder: String,
    pub enabled: bool,
}

/// A parsed mod together with its full manifest, used by verification.
#[derive(Debug, Clone)]
pub struct ScannedMod {
    pub entry: ModEntry,
    pub manifest: ModManifest,
    pub dir: PathBuf,
}

/// Underscore/dot prefixes and "stash" folders hold archives, not mods.
pub fn is_ignored_mod_folder(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_lowercase();
    lower.starts_with('_') || lower.starts_with('.') || lower.contains("stash")
}

/// Owner of the mods directory and `enabledmods.json`.
///
/// Every read-modify-write of the enabled map goes through `lock`, which is
/// shared by all registries built from the same [`crate::core::state::AppState`].
#[derive(Clone)]
pub struct ModRegistry {
    mods_dir: PathBuf,
    map_file: PathBuf,
    legacy_map_file: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl ModRegistry {
    pub fn new(paths: &ProfilePaths, lock: Arc<Mutex<()>>) -> Self {
        Self {
            mods_dir: paths.mods_dir.clone(),
            map_file: paths.enabled_mods_file.clone(),
            legacy_map_file: paths.legacy_enabled_mods_file.clone(),
            lock,
        }
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    // ── Enabled map persistence ─────────────────────────

    /// Make sure `enabledmods.json` exists, seeding it from the legacy copy.
    pub async fn ensure_map_file(&self) -> LauncherResult<()> {
        if self.map_file.exists() {
            return Ok(());
        }
        if self.legacy_map_file.exists() {
            if let Some(parent) = self.map_file.parent() {
                fs_utils::ensure_dir(parent).await?;
            }
            tokio::fs::copy(&self.legacy_map_file, &self.map_file)
                .await
                .map_err(|e| LauncherError::io(&self.map_file, e))?;
            info!("Seeded {:?} from legacy enabled map", self.map_file);
            return Ok(());
        }
        write_json_pretty(&self.map_file, &EnabledMap::default()).await
    }

    async fn read_map(&self) -> LauncherResult<EnabledMap> {
        self.ensure_map_file().await?;
        let raw = tokio::fs::read_to_string(&self.map_file)
            .await
            .map_err(|e| LauncherError::io(&self.map_file, e))?;
        match EnabledMap::from_json(&raw) {
            Ok(map) => Ok(map),
            Err(err) => {
                warn!(
                    "Enabled map {:?} is unreadable ({}), starting from empty",
                    self.map_file, err
                );
                Ok(EnabledMap::default())
            }
        }
    }

    async fn write_map(&self, map: &EnabledMap) -> LauncherResult<()> {
        write_json_pretty(&self.map_file, map).await
    }

    // ── Queries ─────────────────────────────────────────

    /// Scan the mods directory and resolve every mod's enabled state.
    pub async fn list(&self) -> LauncherResult<Vec<ModEntry>> {
        let _guard = self.lock.lock().await;
        let scanned = self.scan_locked().await?;
        Ok(scanned.into_iter().map(|m| m.entry).collect())
    }

    /// Like [`Self::list`] but keeps manifests around.
    pub async fn scan(&self) -> LauncherResult<Vec<ScannedMod>> {
        let _guard = self.lock.lock().await;
        self.scan_locked().await
    }

    /// Enabled map as currently persisted.
    pub async fn enabled_map(&self) -> LauncherResult<EnabledMap> {
        let _guard = self.lock.lock().await;
        self.read_map().await
    }

    async fn scan_locked(&self) -> LauncherResult<Vec<ScannedMod>> {
        let mut map = self.read_map().await?;
        let mut dirty = false;
        let mut mods = Vec::new();

        if !self.mods_dir.exists() {
            return Ok(mods);
        }

        let mut entries = tokio::fs::read_dir(&self.mods_dir)
            .await
            .map_err(|e| LauncherError::io(&self.mods_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&self.mods_dir, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let folder = entry.file_name().to_string_lossy().to_string();
            if !is_dir || is_ignored_mod_folder(&folder) {
                continue;
            }

            let dir = entry.path();
            let manifest_path = dir.join(MANIFEST_FILE);
            if !manifest_path.exists() {
                continue;
            }

            let raw = match tokio::fs::read_to_string(&manifest_path).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("Cannot read {:?}: {}", manifest_path, err);
                    continue;
                }
            };
            let Some(manifest) = ModManifest::parse(&raw) else {
                warn!("Skipping {:?}: manifest is not valid JSON", manifest_path);
                continue;
            };

            let name = manifest.name.clone().unwrap_or_else(|| folder.clone());
            let version = manifest
                .version
                .clone()
                .unwrap_or_else(|| DEFAULT_MOD_VERSION.to_string());

            if !map.contains(&name) && map.migrate_key(&folder, &name) {
                debug!("Migrated enabled-map key {} -> {}", folder, name);
                dirty = true;
            }
            let resolution = map.resolve(&name, &version);
            dirty |= resolution.dirty;

            mods.push(ScannedMod {
                entry: ModEntry {
                    id: name.clone(),
                    author: manifest.resolved_author(&folder),
                    description: manifest.description.clone().unwrap_or_default(),
                    name,
                    version,
                    folder,
                    enabled: resolution.enabled,
                },
                manifest,
                dir,
            });
        }

        mods.sort_by(|a, b| {
            a.entry
                .name
                .to_lowercase()
                .cmp(&b.entry.name.to_lowercase())
                .then_with(|| a.entry.name.cmp(&b.entry.name))
        });

        if dirty {
            self.write_map(&map).await?;
        }
        Ok(mods)
    }

    pub async fn find(&self, name: &str) -> LauncherResult<Option<ModEntry>> {
        Ok(self.list().await?.into_iter().find(|m| m.name == name))
    }

    // ── Mutations ───────────────────────────────────────

    /// Enable or disable one version of a mod, clearing all its other versions.
    pub async fn set_enabled(&self, name: &str, version: &str, enabled: bool) -> LauncherResult<()> {
        let _guard = self.lock.lock().await;
        self.set_enabled_locked(name, version, enabled).await
    }

    async fn set_enabled_locked(&self, name: &str, version: &str, enabled: bool) -> LauncherResult<()> {
        let mut map = self.read_map().await?;
        let version = if version.is_empty() {
            DEFAULT_MOD_VERSION
        } else {
            version
        };
        map.set_exclusive(name, version, enabled);
        self.write_map(&map).await?;
        info!("Set {}@{} enabled={}", name, version, enabled);
        Ok(())
    }

    /// Flip the installed version of `name`. Read and write share one lock hold.
    pub async fn toggle(&self, name: &str) -> LauncherResult<ModEntry> {
        let _guard = self.lock.lock().await;
        let current = self
            .scan_locked()
            .await?
            .into_iter()
            .map(|m| m.entry)
            .find(|m| m.name == name)
            .ok_or_else(|| LauncherError::ModNotFound(name.to_string()))?;
        let enabled = !current.enabled;
        self.set_enabled_locked(&current.name, &current.version, enabled)
            .await?;
        Ok(ModEntry { enabled, ..current })
    }

    /// Apply the exclusive set rule to every listed mod in one write.
    pub async fn set_all_enabled(&self, enabled: bool) -> LauncherResult<usize> {
        let _guard = self.lock.lock().await;
        let mods = self.scan_locked().await?;
        let mut map = self.read_map().await?;
        for scanned in &mods {
            map.set_exclusive(&scanned.entry.name, &scanned.entry.version, enabled);
        }
        self.write_map(&map).await?;
        info!("Set {} mods enabled={}", mods.len(), enabled);
        Ok(mods.len())
    }

    /// Clear every version entry of `name` without removing it.
    pub async fn disable_all_versions(&self, name: &str) -> LauncherResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        if map.disable_all_versions(name) {
            self.write_map(&map).await?;
        }
        Ok(())
    }

    /// Remove the mod folder and its enabled-map entry.
    pub async fn delete(&self, name: &str) -> LauncherResult<()> {
        let _guard = self.lock.lock().await;
        let mods = self.scan_locked().await?;
        let target = mods
            .iter()
            .find(|m| m.entry.name == name)
            .ok_or_else(|| LauncherError::ModNotFound(name.to_string()))?;

        fs_utils::safe_remove(&target.dir).await?;

        let mut map = self.read_map().await?;
        map.remove(name);
        self.write_map(&map).await?;
        info!("Deleted mod {} ({:?})", name, target.dir);
        Ok(())
    }

    /// Copy a mod folder into the mods directory under `folder`.
    pub async fn install_folder(&self, source: &Path, folder: &str) -> LauncherResult<PathBuf> {
        let _guard = self.lock.lock().await;
        let dest = self.mods_dir.join(folder);
        fs_utils::copy_dir(source, &dest).await?;
        info!("Imported mod folder {:?} -> {:?}", source, dest);
        Ok(dest)
    }
}
