use std::path::Path;

use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs_utils;
use crate::core::state::paths::runtime_bin_dir;

/// File whose presence marks a usable `bin/x64_retail` directory.
pub const RUNTIME_MARKER: &str = "tier0.dll";

/// Copy the game's `bin/x64_retail` into the profile when the profile copy is
/// missing its marker. Returns `true` when a repair happened.
pub async fn ensure_profile_bin(profile_dir: &Path, game_dir: &Path) -> LauncherResult<bool> {
    let profile_bin = runtime_bin_dir(profile_dir);
    if profile_bin.join(RUNTIME_MARKER).exists() {
        return Ok(false);
    }

    let game_bin = runtime_bin_dir(game_dir);
    if !game_bin.is_dir() {
        return Err(LauncherError::io(
            &game_bin,
            std::io::Error::new(std::io::ErrorKind::NotFound, "Game bin folder missing"),
        ));
    }

    fs_utils::copy_dir(&game_bin, &profile_bin).await?;
    info!("Repaired profile bin from {:?}", game_bin);
    Ok(true)
}
