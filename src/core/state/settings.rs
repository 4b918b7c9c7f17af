use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const APP_DIR_NAME: &str = "Project-P1L0T";
pub const SETTINGS_FILE: &str = "launcher.config.json";
pub const GAME_EXE: &str = "Titanfall2.exe";
pub const LAUNCHER_EXE: &str = "NorthstarLauncher.exe";
pub const DEFAULT_RELEASE_REPO: &str = "CydonianHeavyIndustries/Project-P1L0T";
pub const DEFAULT_ASSET_NAME: &str = "Project-P1L0T-modpack.zip";

const ROOT_ENV: &str = "P1LOT_ROOT";
const DATA_DIR_ENV: &str = "P1LOT_DATA_DIR";

/// Persisted launcher configuration (`launcher.config.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherSettings {
    pub data_path: PathBuf,
    pub profile_path: PathBuf,
    pub tf2_path: Option<PathBuf>,
    pub game_path: PathBuf,
    pub launcher_exe: PathBuf,
    pub config_file_path: Option<PathBuf>,
    pub launch_params: Vec<String>,
    pub release_repo: String,
    pub modpack_asset_name: String,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        let root = install_root();
        let tf2_path = default_game_dir();
        Self {
            data_path: data_dir_for(&root),
            profile_path: root.join("modpack"),
            game_path: tf2_path.join(GAME_EXE),
            launcher_exe: tf2_path.join(LAUNCHER_EXE),
            tf2_path: Some(tf2_path),
            config_file_path: None,
            launch_params: vec![
                "-novid".into(),
                "-high".into(),
                "-fullscreen".into(),
                "+fps_max 144".into(),
            ],
            release_repo: DEFAULT_RELEASE_REPO.into(),
            modpack_asset_name: DEFAULT_ASSET_NAME.into(),
        }
    }
}

impl LauncherSettings {
    /// Fill in derived paths so every consumer sees a consistent layout.
    pub fn normalize(mut self) -> Self {
        if self.tf2_path.is_none() {
            self.tf2_path = self.game_path.parent().map(Path::to_path_buf);
        }

        if let Some(tf2) = self.tf2_path.clone() {
            let names_game = self
                .game_path
                .file_name()
                .map(|n| n.to_string_lossy().eq_ignore_ascii_case(GAME_EXE))
                .unwrap_or(false);
            if !names_game {
                self.game_path = tf2.join(GAME_EXE);
            }

            let tf2_launcher = tf2.join(LAUNCHER_EXE);
            if tf2_launcher.exists() || self.launcher_exe.as_os_str().is_empty() {
                self.launcher_exe = tf2_launcher;
            }
        }

        if self.config_file_path.is_none() {
            self.config_file_path = Some(
                self.profile_path
                    .join("R2Northstar")
                    .join("mods")
                    .join(APP_DIR_NAME)
                    .join("p1lot.config.json"),
            );
        }

        if self.release_repo.trim().is_empty() {
            self.release_repo = DEFAULT_RELEASE_REPO.into();
        }
        if self.modpack_asset_name.trim().is_empty() {
            self.modpack_asset_name = DEFAULT_ASSET_NAME.into();
        }

        self
    }

    /// Directory containing the game binary.
    pub fn game_dir(&self) -> PathBuf {
        self.game_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load settings from `path`, writing normalized defaults when the file
    /// is missing or unreadable.
    pub fn load_or_init(path: &Path) -> Self {
        match load_settings_from_disk(path) {
            Some(settings) => settings.normalize(),
            None => {
                let settings = LauncherSettings::default().normalize();
                if let Err(err) = settings.save(path) {
                    warn!("Cannot write default settings to {:?}: {}", path, err);
                } else {
                    info!("Wrote default settings to {:?}", path);
                }
                settings
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.clone().normalize())?;
        std::fs::write(path, json)
    }
}

fn load_settings_from_disk(path: &Path) -> Option<LauncherSettings> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(err) => {
            warn!("Ignoring corrupt settings at {:?}: {}", path, err);
            None
        }
    }
}

/// Root of the launcher installation (`P1LOT_ROOT`).
pub fn install_root() -> PathBuf {
    if let Some(root) = std::env::var_os(ROOT_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(root);
    }
    if cfg!(target_os = "windows") {
        PathBuf::from("C:\\").join(APP_DIR_NAME)
    } else {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }
}

/// Data directory (`P1LOT_DATA_DIR`, else `<root>/data`).
pub fn data_dir_for(root: &Path) -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => root.join("data"),
    }
}

fn default_game_dir() -> PathBuf {
    let steam = if cfg!(target_os = "windows") {
        PathBuf::from("C:\\Program Files (x86)\\Steam")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".steam")
            .join("steam")
    };
    steam.join("steamapps").join("common").join("Titanfall2")
}
