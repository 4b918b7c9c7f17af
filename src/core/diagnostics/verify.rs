// ─── Install Verification ───
// Checks the configured paths, binaries and every listed mod's manifest.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::core::error::LauncherResult;
use crate::core::launch::RUNTIME_MARKER;
use crate::core::mods::manifest::MANIFEST_FILE;
use crate::core::mods::{ModManifest, ModRegistry, ScannedMod};
use crate::core::state::paths::runtime_bin_dir;
use crate::core::state::{LauncherSettings, ProfilePaths};

/// Words that mark a mod as purely visual or audio. Such mods ship no scripts.
pub const COSMETIC_KEYWORDS: &[&str] = &[
    "skin",
    "camo",
    "model",
    "helmet",
    "reticle",
    "texture",
    "retexture",
    "shader",
    "sound",
    "soundpack",
    "sfx",
    "audio",
    "voice",
    "music",
    "blacklight",
];

pub fn is_cosmetic(text: &str) -> bool {
    let haystack = text.to_lowercase();
    COSMETIC_KEYWORDS
        .iter()
        .any(|keyword| haystack.contains(keyword))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyReport {
    pub ok: bool,
    pub issues: Vec<String>,
}

impl VerifyReport {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            ok: issues.is_empty(),
            issues,
        }
    }
}

fn check_path(issues: &mut Vec<String>, path: &Path, message: &str) {
    if !path.exists() {
        issues.push(format!("{}: {}", message, path.display()));
    }
}

fn check_layout(settings: &LauncherSettings, paths: &ProfilePaths) -> Vec<String> {
    let mut issues = Vec::new();
    check_path(&mut issues, &settings.data_path, "Data folder missing");
    match &settings.tf2_path {
        Some(tf2) => check_path(&mut issues, tf2, "Titanfall 2 folder missing"),
        None => issues.push("Titanfall 2 folder missing: not set".into()),
    }
    check_path(&mut issues, &paths.profile_dir, "Profile path missing");
    check_path(&mut issues, &paths.runtime_dir, "R2Northstar folder missing");
    check_path(&mut issues, &paths.mods_dir, "Mods folder missing");
    check_path(&mut issues, &paths.launcher_exe, "NorthstarLauncher.exe missing");
    check_path(&mut issues, &paths.game_exe, "Titanfall2.exe missing");
    check_path(
        &mut issues,
        &runtime_bin_dir(&paths.game_dir).join(RUNTIME_MARKER),
        "tier0.dll missing",
    );
    check_path(
        &mut issues,
        &paths.profile_bin_dir().join(RUNTIME_MARKER),
        "Profile tier0.dll missing",
    );
    issues
}

/// Re-reads the manifest from disk so edits since the scan are seen.
async fn check_mod(scanned: &ScannedMod, all: &[ScannedMod], issues: &mut Vec<String>) {
    let entry = &scanned.entry;
    let raw = match tokio::fs::read_to_string(scanned.dir.join(MANIFEST_FILE)).await {
        Ok(raw) => raw,
        Err(_) => {
            issues.push(format!("Missing mod.json: {}", entry.name));
            return;
        }
    };
    let Some(manifest) = ModManifest::parse(&raw) else {
        issues.push(format!("Invalid mod.json for {}", entry.name));
        return;
    };

    let cosmetic = is_cosmetic(&format!(
        "{} {} {}",
        entry.name, entry.description, entry.folder
    ));
    if !cosmetic && !manifest.scripts.is_empty() {
        let vscripts = scanned.dir.join("mod").join("scripts").join("vscripts");
        if !vscripts.exists() {
            issues.push(format!("Missing vscripts folder for {}", entry.name));
        }
        for script in &manifest.scripts {
            let Some(script_path) = script.path.as_deref().filter(|p| !p.is_empty()) else {
                continue;
            };
            if !vscripts.join(script_path).exists() {
                issues.push(format!("Missing script for {}: {}", entry.name, script_path));
            }
        }
    }

    for dependency in &manifest.dependencies {
        if !all.iter().any(|other| &other.entry.name == dependency) {
            issues.push(format!("Missing dependency for {}: {}", entry.name, dependency));
        }
    }
}

/// Full verification pass over settings, profile layout and mods.
pub async fn verify(
    settings: &LauncherSettings,
    paths: &ProfilePaths,
    registry: &ModRegistry,
) -> LauncherResult<VerifyReport> {
    let mut issues = check_layout(settings, paths);

    let mods = registry.scan().await?;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for scanned in &mods {
        *counts.entry(scanned.entry.name.as_str()).or_default() += 1;
    }
    issues.extend(
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| format!("Duplicate mod name detected: {name}")),
    );

    for scanned in &mods {
        check_mod(scanned, &mods, &mut issues).await;
    }

    Ok(VerifyReport::from_issues(issues))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mods::registry::tests::{registry_at, write_mod};
    use crate::core::state::settings::{GAME_EXE, LAUNCHER_EXE};

    #[test]
    fn cosmetic_keywords_match_case_insensitively() {
        assert!(is_cosmetic("Kraber BLACKLIGHT camo"));
        assert!(is_cosmetic("pilot-soundpack"));
        assert!(!is_cosmetic("Pilot.Hud gameplay tweaks"));
    }

    /// A complete profile whose only problems come from the mods themselves.
    fn healthy_layout(root: &Path) -> (LauncherSettings, ProfilePaths, ModRegistry) {
        let game = root.join("game");
        let profile = root.join("profile");
        for bin in [runtime_bin_dir(&game), runtime_bin_dir(&profile)] {
            std::fs::create_dir_all(&bin).unwrap();
            std::fs::write(bin.join(RUNTIME_MARKER), "dll").unwrap();
        }
        std::fs::write(game.join(GAME_EXE), "").unwrap();
        std::fs::write(profile.join(LAUNCHER_EXE), "").unwrap();
        std::fs::create_dir_all(root.join("data")).unwrap();

        let (registry, _) = registry_at(&profile);
        let settings = LauncherSettings {
            data_path: root.join("data"),
            profile_path: profile,
            tf2_path: Some(game.clone()),
            game_path: game.join(GAME_EXE),
            launcher_exe: root.join("nowhere").join(LAUNCHER_EXE),
            ..LauncherSettings::default()
        };
        let paths = ProfilePaths::resolve(&settings);
        (settings, paths, registry)
    }

    #[tokio::test]
    async fn healthy_profile_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, paths, registry) = healthy_layout(tmp.path());
        write_mod(&paths.mods_dir, "core", r#"{"Name":"Pilot.Core","Version":"1.0"}"#);

        let report = verify(&settings, &paths, &registry).await.unwrap();
        assert!(report.ok, "{:?}", report.issues);
    }

    #[tokio::test]
    async fn reports_scripts_dependencies_and_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, paths, registry) = healthy_layout(tmp.path());
        write_mod(
            &paths.mods_dir,
            "hud",
            r#"{"Name":"Pilot.Hud","Scripts":[{"Path":"hud/init.nut"}],"Dependencies":["Pilot.Core"]}"#,
        );
        write_mod(
            &paths.mods_dir,
            "camo",
            r#"{"Name":"R201 Camo","Scripts":[{"Path":"none.nut"}]}"#,
        );
        std::fs::remove_file(paths.profile_bin_dir().join(RUNTIME_MARKER)).unwrap();

        let report = verify(&settings, &paths, &registry).await.unwrap();
        assert!(!report.ok);
        assert!(report.issues[0].starts_with("Profile tier0.dll missing: "));
        assert!(report
            .issues
            .contains(&"Missing vscripts folder for Pilot.Hud".to_string()));
        assert!(report
            .issues
            .contains(&"Missing script for Pilot.Hud: hud/init.nut".to_string()));
        assert!(report
            .issues
            .contains(&"Missing dependency for Pilot.Hud: Pilot.Core".to_string()));
        assert!(!report.issues.iter().any(|issue| issue.contains("R201 Camo")));
    }
}
