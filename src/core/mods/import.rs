use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::registry::ModRegistry;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils;
use crate::core::modpack::extract::extract_archive;

/// Import a mod folder or `.zip` into the registry's mods directory.
///
/// An archive with a top-level `mods/` directory contributes each folder in it;
/// any other archive becomes one mod folder named after the file. Returns the
/// folder names written.
pub async fn import_mod(registry: &ModRegistry, source: &Path) -> LauncherResult<Vec<String>> {
    let meta = tokio::fs::metadata(source)
        .await
        .map_err(|_| LauncherError::Validation(format!("Mod path not found: {:?}", source)))?;
    fs_utils::ensure_dir(registry.mods_dir()).await?;

    if meta.is_dir() {
        let folder = file_label(source)?;
        registry.install_folder(source, &folder).await?;
        return Ok(vec![folder]);
    }

    let is_zip = source
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if !is_zip {
        return Err(LauncherError::Validation(
            "Only folders or .zip files are supported".into(),
        ));
    }

    let temp_dir = std::env::temp_dir().join(format!("p1lot-import-{}", Uuid::new_v4()));
    let result = import_archive(registry, source, &temp_dir).await;
    fs_utils::remove_quietly(&temp_dir).await;
    result
}

async fn import_archive(
    registry: &ModRegistry,
    archive: &Path,
    temp_dir: &Path,
) -> LauncherResult<Vec<String>> {
    extract_archive(archive, temp_dir, CancellationToken::new()).await?;

    let bundled = temp_dir.join("mods");
    if !bundled.is_dir() {
        let folder = archive
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| LauncherError::Validation("Archive has no file name".into()))?;
        registry.install_folder(temp_dir, &folder).await?;
        return Ok(vec![folder]);
    }

    let mut imported = Vec::new();
    for dir in child_dirs(&bundled).await? {
        let folder = file_label(&dir)?;
        registry.install_folder(&dir, &folder).await?;
        imported.push(folder);
    }
    info!("Imported {} mod(s) from {:?}", imported.len(), archive);
    Ok(imported)
}

async fn child_dirs(dir: &Path) -> LauncherResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LauncherError::io(dir, e))?;
    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LauncherError::io(dir, e))?
    {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn file_label(path: &Path) -> LauncherResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| LauncherError::Validation(format!("Cannot name mod folder for {:?}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::modpack::extract::tests::write_zip;
    use crate::core::mods::registry::tests::registry_at;

    #[tokio::test]
    async fn imports_folder_and_lists_it() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, paths) = registry_at(&tmp.path().join("profile"));
        let source = tmp.path().join("Cool.Mod");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("mod.json"), r#"{"Name":"Cool.Mod","Version":"0.1"}"#).unwrap();

        let imported = import_mod(&registry, &source).await.unwrap();
        assert_eq!(imported, vec!["Cool.Mod"]);
        assert!(paths.mods_dir.join("Cool.Mod/mod.json").exists());
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn zip_with_mods_dir_imports_each_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, paths) = registry_at(&tmp.path().join("profile"));
        let archive = tmp.path().join("bundle.zip");
        write_zip(
            &archive,
            &[
                ("mods/A/mod.json", r#"{"Name":"A"}"#),
                ("mods/B/mod.json", r#"{"Name":"B"}"#),
                ("README.md", "hi"),
            ],
        );

        let imported = import_mod(&registry, &archive).await.unwrap();
        assert_eq!(imported, vec!["A", "B"]);
        assert!(paths.mods_dir.join("B/mod.json").exists());
        assert!(!paths.mods_dir.join("README.md").exists());
    }

    #[tokio::test]
    async fn plain_zip_becomes_one_folder_named_after_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, paths) = registry_at(&tmp.path().join("profile"));
        let archive = tmp.path().join("Solo.Mod.zip");
        write_zip(&archive, &[("mod.json", r#"{"Name":"Solo"}"#)]);

        let imported = import_mod(&registry, &archive).await.unwrap();
        assert_eq!(imported, vec!["Solo.Mod"]);
        assert!(paths.mods_dir.join("Solo.Mod/mod.json").exists());
    }

    #[tokio::test]
    async fn rejects_missing_and_unsupported_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, _) = registry_at(&tmp.path().join("profile"));
        let missing = import_mod(&registry, &tmp.path().join("nope")).await;
        assert!(matches!(missing, Err(LauncherError::Validation(_))));

        let text = tmp.path().join("notes.txt");
        std::fs::write(&text, "x").unwrap();
        let unsupported = import_mod(&registry, &text).await;
        assert!(matches!(unsupported, Err(LauncherError::Validation(_))));
    }
}
