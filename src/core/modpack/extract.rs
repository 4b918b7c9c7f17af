// ─── Archive Extraction ───

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils;

/// Extract every entry of `zip_path` under `destination`. Entries escaping the
/// destination are skipped.
pub fn extract_zip_file(
    zip_path: &Path,
    destination: &Path,
    cancel: &CancellationToken,
) -> LauncherResult<usize> {
    let zip_file = std::fs::File::open(zip_path).map_err(|source| LauncherError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(zip_file)?;

    std::fs::create_dir_all(destination).map_err(|source| LauncherError::Io {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut written = 0;
    for index in 0..archive.len() {
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }
        let mut zipped = archive.by_index(index)?;
        let Some(rel_path) = zipped.enclosed_name() else {
            debug!("Skipping unsafe zip entry {}", zipped.name());
            continue;
        };

        let out_path = destination.join(rel_path);
        if zipped.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|source| LauncherError::Io {
                path: out_path,
                source,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|source| LauncherError::Io {
            path: out_path.clone(),
            source,
        })?;
        std::io::copy(&mut zipped, &mut out).map_err(|source| LauncherError::Io {
            path: out_path,
            source,
        })?;
        written += 1;
    }

    Ok(written)
}

/// Run [`extract_zip_file`] on the blocking pool.
pub async fn extract_archive(
    zip_path: &Path,
    destination: &Path,
    cancel: CancellationToken,
) -> LauncherResult<usize> {
    let zip = zip_path.to_path_buf();
    let dest = destination.to_path_buf();
    let written =
        tokio::task::spawn_blocking(move || extract_zip_file(&zip, &dest, &cancel)).await??;
    info!("Extracted {} file(s) from {:?}", written, zip_path);
    Ok(written)
}

/// Archives commonly wrap everything in one top-level folder; descend into it.
pub async fn resolve_extract_root(temp_dir: &Path) -> LauncherResult<PathBuf> {
    let mut entries = tokio::fs::read_dir(temp_dir)
        .await
        .map_err(|e| LauncherError::io(temp_dir, e))?;
    let mut only: Option<PathBuf> = None;
    let mut count = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LauncherError::io(temp_dir, e))?
    {
        count += 1;
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        only = is_dir.then(|| entry.path());
    }
    match (count, only) {
        (1, Some(dir)) => Ok(dir),
        _ => Ok(temp_dir.to_path_buf()),
    }
}

/// Replace `target` with a copy of `source_root`.
pub async fn replace_dir(source_root: &Path, target: &Path) -> LauncherResult<()> {
    fs_utils::safe_remove(target).await?;
    fs_utils::ensure_dir(target).await?;
    fs_utils::copy_dir(source_root, target).await
}
