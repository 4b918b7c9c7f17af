// ─── P1L0T Core ───
// Modpack lifecycle and launch orchestration for a Northstar profile.
//
// Architecture:
//   core/
//     mods/          mod.json parsing, enabled map, registry
//     modpack/       release resolution, install state machine, overrides
//     downloader/    streaming downloads with progress and SHA-256
//     launch/        process probe, runtime repair, spawn + verdict
//     diagnostics/   runtime log scanning, quarantine, verification
//     state/         settings, path layout, shared application state

pub mod diagnostics;
pub mod downloader;
pub mod error;
pub mod fs_utils;
pub mod http;
pub mod launch;
pub mod logging;
pub mod modpack;
pub mod mods;
pub mod state;
