// ─── Launch Verdict ───
// Decides what an undetected launch means from the signals left behind.

use std::time::{Duration, SystemTime};

use serde::Serialize;

/// Slack allowed between launch start and the runtime log's mtime.
pub const LOG_CLOCK_SLACK: Duration = Duration::from_secs(2);

/// Inputs gathered after the game process was not detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchSignals {
    pub exit_code: Option<i32>,
    pub log_advanced: bool,
    pub compile_errors_found: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchVerdict {
    SoftSuccess,
    Failed,
}

/// | exit code | log advanced | compile errors | verdict      |
/// |-----------|--------------|----------------|--------------|
/// | `Some(0)` | any          | any            | soft success |
/// | other     | yes          | no             | soft success |
/// | other     | yes          | yes            | failed       |
/// | other     | no           | any            | failed       |
pub fn judge(signals: LaunchSignals) -> LaunchVerdict {
    match (
        signals.exit_code,
        signals.log_advanced,
        signals.compile_errors_found,
    ) {
        (Some(0), _, _) => LaunchVerdict::SoftSuccess,
        (_, true, false) => LaunchVerdict::SoftSuccess,
        _ => LaunchVerdict::Failed,
    }
}

/// The newest runtime log advanced when it is newer than the pre-launch
/// snapshot (or there was none) and not older than `launch_start` minus slack.
pub fn log_advanced(
    before: Option<SystemTime>,
    after: Option<SystemTime>,
    launch_start: SystemTime,
) -> bool {
    let Some(after) = after else {
        return false;
    };
    let newer_than_snapshot = before.map(|b| after > b).unwrap_or(true);
    let floor = launch_start
        .checked_sub(LOG_CLOCK_SLACK)
        .unwrap_or(launch_start);
    newer_than_snapshot && after >= floor
}
