// ─── Override Preservation ───
// User-owned files inside the modpack root survive a reinstall byte-for-byte.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils;
use crate::core::state::paths::{ENABLED_MODS_FILE, LEGACY_ENABLED_MODS_FILE};
use crate::core::state::settings::APP_DIR_NAME;

/// Paths relative to the modpack root.
pub fn override_paths() -> Vec<PathBuf> {
    let runtime = Path::new("R2Northstar");
    vec![
        runtime.join(ENABLED_MODS_FILE),
        runtime.join(LEGACY_ENABLED_MODS_FILE),
        runtime
            .join("mods")
            .join(APP_DIR_NAME)
            .join("p1lot.config.json"),
    ]
}

#[derive(Debug, Clone)]
pub struct CapturedFile {
    pub rel_path: PathBuf,
    pub data: Vec<u8>,
}

/// Read every override that exists under `root`. Absent files are skipped.
pub async fn capture(root: &Path) -> LauncherResult<Vec<CapturedFile>> {
    let mut captured = Vec::new();
    for rel_path in override_paths() {
        let full = root.join(&rel_path);
        match tokio::fs::read(&full).await {
            Ok(data) => {
                debug!("Captured override {:?} ({} bytes)", rel_path, data.len());
                captured.push(CapturedFile { rel_path, data });
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(LauncherError::io(full, err)),
        }
    }
    Ok(captured)
}

/// Write captured files back to their original relative locations.
pub async fn restore(root: &Path, captured: &[CapturedFile]) -> LauncherResult<()> {
    for file in captured {
        let full = root.join(&file.rel_path);
        if let Some(parent) = full.parent() {
            fs_utils::ensure_dir(parent).await?;
        }
        tokio::fs::write(&full, &file.data)
            .await
            .map_err(|e| LauncherError::io(&full, e))?;
    }
    if !captured.is_empty() {
        info!("Restored {} override file(s)", captured.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overrides_survive_root_replacement() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("modpack");
        let map = root.join("R2Northstar").join(ENABLED_MODS_FILE);
        std::fs::create_dir_all(map.parent().unwrap()).unwrap();
        std::fs::write(&map, br#"{"Version":1,"A":{"1.0":true}}"#).unwrap();

        let captured = capture(&root).await.unwrap();
        assert_eq!(captured.len(), 1);

        std::fs::remove_dir_all(&root).unwrap();
        restore(&root, &captured).await.unwrap();

        assert_eq!(
            std::fs::read(&map).unwrap(),
            br#"{"Version":1,"A":{"1.0":true}}"#.to_vec()
        );
        assert!(!root
            .join("R2Northstar")
            .join(LEGACY_ENABLED_MODS_FILE)
            .exists());
    }

    #[tokio::test]
    async fn nothing_to_capture_is_fine() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(capture(tmp.path()).await.unwrap().is_empty());
        restore(tmp.path(), &[]).await.unwrap();
    }
}
