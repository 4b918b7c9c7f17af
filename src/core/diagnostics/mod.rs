// ─── Diagnostics ───
// Runtime log scanning, quarantine of implicated mods, install verification
// and profile maintenance.

pub mod maintenance;
pub mod quarantine;
pub mod runtime_log;
pub mod verify;

pub use maintenance::{
    clear_compiled_cache, compile_check, dependency_issues, export_dir, export_latest_log,
    export_troubleshoot, reset_profile, troubleshoot, CompileCheck, TroubleshootInfo,
};
pub use quarantine::{find_mod_match, quarantine};
pub use runtime_log::{
    broken_mods_in_latest, collect_compile_errors, compile_errors_in_latest, latest_log,
    scan_broken_mods, CompileErrorReport, LogStamp, LAUNCH_COMPILE_ERROR_LIMIT,
};
pub use verify::{is_cosmetic, verify, VerifyReport};
