// ─── Mods ───
// Manifest parsing, the persisted enabled map and the registry that owns both.

pub mod enabled_map;
pub mod import;
pub mod manifest;
pub mod registry;

pub use enabled_map::EnabledMap;
pub use import::import_mod;
pub use manifest::ModManifest;
pub use registry::{is_ignored_mod_folder, ModEntry, ModRegistry, ScannedMod};
