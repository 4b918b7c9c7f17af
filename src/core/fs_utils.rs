// ─── Filesystem helpers ───
// Recursive copies, busy-tolerant removal and JSON persistence shared by the
// installer, the mod registry and quarantine.

use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

const REMOVE_ATTEMPTS: usize = 3;
const REMOVE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Copy `source` into `destination`, overwriting files that already exist.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(destination)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            if dst_path.exists() {
                std::fs::remove_file(&dst_path)?;
            }
            std::fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

/// Async wrapper around [`copy_dir_recursive`].
pub async fn copy_dir(source: &Path, destination: &Path) -> LauncherResult<()> {
    let src = source.to_path_buf();
    let dst = destination.to_path_buf();
    tokio::task::spawn_blocking(move || {
        copy_dir_recursive(&src, &dst).map_err(|source| LauncherError::Io { path: dst, source })
    })
    .await?
}

/// Windows sharing violations and `EBUSY` show up while the game or an
/// antivirus still holds a handle.
fn is_transient_busy(err: &std::io::Error) -> bool {
    err.kind() == IoErrorKind::PermissionDenied || matches!(err.raw_os_error(), Some(16 | 32 | 33))
}

/// Remove a file or directory tree, retrying a few times on busy handles.
///
/// A missing target is not an error.
pub async fn safe_remove(target: &Path) -> LauncherResult<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match tokio::fs::symlink_metadata(target).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(target).await,
            Ok(_) => tokio::fs::remove_file(target).await,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(()),
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(()),
            Err(err) if is_transient_busy(&err) && attempt < REMOVE_ATTEMPTS => {
                debug!("{:?} busy ({}), retrying removal", target, err);
                tokio::time::sleep(REMOVE_RETRY_DELAY).await;
            }
            Err(source) => {
                return Err(LauncherError::Io {
                    path: target.to_path_buf(),
                    source,
                })
            }
        }
    }
}

/// Best-effort cleanup; failures are logged and swallowed.
pub async fn remove_quietly(target: &Path) {
    if let Err(err) = safe_remove(target).await {
        warn!("Cleanup of {:?} failed: {}", target, err);
    }
}

pub async fn ensure_dir(path: &Path) -> LauncherResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| LauncherError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `value` as pretty JSON, creating parent directories.
pub async fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| LauncherError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Last `max_lines` lines of a text file, or an empty string when absent.
pub async fn tail_file(path: &Path, max_lines: usize) -> LauncherResult<String> {
    let content = match tokio::fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(String::new()),
        Err(source) => {
            return Err(LauncherError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    Ok(lines[start..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn safe_remove_handles_dirs_files_and_missing_targets() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a/b");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("f.txt"), "x").unwrap();
        let file = tmp.path().join("loose.txt");
        std::fs::write(&file, "y").unwrap();

        safe_remove(&tmp.path().join("a")).await.unwrap();
        safe_remove(&file).await.unwrap();
        safe_remove(&tmp.path().join("never-existed")).await.unwrap();

        assert!(!tmp.path().join("a").exists());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn copy_dir_overwrites_existing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("nested/file.txt"), "new").unwrap();
        std::fs::create_dir_all(dst.join("nested")).unwrap();
        std::fs::write(dst.join("nested/file.txt"), "old").unwrap();

        copy_dir(&src, &dst).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.join("nested/file.txt")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn tail_file_keeps_last_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.txt");
        std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

        assert_eq!(tail_file(&path, 2).await.unwrap(), "three\nfour");
        assert_eq!(tail_file(&tmp.path().join("nope"), 2).await.unwrap(), "");
    }
}
