use std::path::{Path, PathBuf};

use super::settings::{LauncherSettings, LAUNCHER_EXE};

pub const ENABLED_MODS_FILE: &str = "enabledmods.json";
pub const LEGACY_ENABLED_MODS_FILE: &str = "enabledmods.old.json";
pub const QUARANTINE_DIR: &str = "_stash_incompatible";
pub const SERVICE_LOG_PREFIX: &str = "launcher-server";
pub const LAUNCH_SIGNAL_FILE: &str = "launch.signal.json";

/// Locations inside the launcher's own data directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
}

impl AppPaths {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join(super::settings::SETTINGS_FILE)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    /// Rolling service log and per-launch logs live here.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn launch_signal_file(&self) -> PathBuf {
        self.logs_dir().join(LAUNCH_SIGNAL_FILE)
    }
}

/// Layout of a Northstar profile as resolved from settings.
#[derive(Debug, Clone)]
pub struct ProfilePaths {
    pub profile_dir: PathBuf,
    /// `R2Northstar` equivalent: holds mods, the enabled map and runtime logs.
    pub runtime_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub enabled_mods_file: PathBuf,
    pub legacy_enabled_mods_file: PathBuf,
    pub launcher_exe: PathBuf,
    pub game_exe: PathBuf,
    pub game_dir: PathBuf,
    pub runtime_logs_dir: PathBuf,
}

impl ProfilePaths {
    pub fn resolve(settings: &LauncherSettings) -> Self {
        let profile_dir = settings.profile_path.clone();
        let flat_layout = profile_dir.join("mods").exists()
            && profile_dir.join(ENABLED_MODS_FILE).exists();
        let runtime_dir = if flat_layout {
            profile_dir.clone()
        } else {
            profile_dir.join("R2Northstar")
        };

        let profile_launcher = profile_dir.join(LAUNCHER_EXE);
        let launcher_exe = if settings.launcher_exe.exists() {
            settings.launcher_exe.clone()
        } else if profile_launcher.exists() {
            profile_launcher
        } else if !settings.launcher_exe.as_os_str().is_empty() {
            settings.launcher_exe.clone()
        } else {
            profile_launcher
        };

        Self {
            mods_dir: runtime_dir.join("mods"),
            enabled_mods_file: runtime_dir.join(ENABLED_MODS_FILE),
            legacy_enabled_mods_file: runtime_dir.join(LEGACY_ENABLED_MODS_FILE),
            runtime_logs_dir: runtime_dir.join("logs"),
            launcher_exe,
            game_exe: settings.game_path.clone(),
            game_dir: settings.game_dir(),
            profile_dir,
            runtime_dir,
        }
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.runtime_dir.join(QUARANTINE_DIR)
    }

    pub fn compiled_cache_dir(&self) -> PathBuf {
        self.runtime_dir.join("runtime").join("compiled")
    }

    pub fn mod_dir(&self, folder: &str) -> PathBuf {
        self.mods_dir.join(folder)
    }

    pub fn profile_bin_dir(&self) -> PathBuf {
        runtime_bin_dir(&self.profile_dir)
    }

    pub fn game_bin_dir(&self) -> PathBuf {
        runtime_bin_dir(&self.game_dir)
    }
}

/// `bin/x64_retail` under a game or profile root.
pub fn runtime_bin_dir(root: &Path) -> PathBuf {
    root.join("bin").join("x64_retail")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_for(profile: &Path) -> LauncherSettings {
        LauncherSettings {
            profile_path: profile.to_path_buf(),
            tf2_path: Some(profile.join("game")),
            game_path: profile.join("game").join("Titanfall2.exe"),
            launcher_exe: profile.join("game").join(LAUNCHER_EXE),
            ..LauncherSettings::default()
        }
    }

    #[test]
    fn nested_layout_uses_r2northstar() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ProfilePaths::resolve(&settings_for(tmp.path()));
        assert_eq!(paths.runtime_dir, tmp.path().join("R2Northstar"));
        assert_eq!(
            paths.enabled_mods_file,
            tmp.path().join("R2Northstar").join(ENABLED_MODS_FILE)
        );
        assert_eq!(
            paths.quarantine_dir(),
            tmp.path().join("R2Northstar").join(QUARANTINE_DIR)
        );
    }

    #[test]
    fn flat_layout_is_detected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("mods")).unwrap();
        std::fs::write(tmp.path().join(ENABLED_MODS_FILE), "{}").unwrap();

        let paths = ProfilePaths::resolve(&settings_for(tmp.path()));
        assert_eq!(paths.runtime_dir, tmp.path());
        assert_eq!(paths.mods_dir, tmp.path().join("mods"));
    }

    #[test]
    fn launcher_falls_back_to_profile_copy() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(LAUNCHER_EXE), "").unwrap();

        let paths = ProfilePaths::resolve(&settings_for(tmp.path()));
        assert_eq!(paths.launcher_exe, tmp.path().join(LAUNCHER_EXE));
    }
}
