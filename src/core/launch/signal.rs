use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::LauncherResult;
use crate::core::fs_utils::write_json_pretty;

/// Contents of `launch.signal.json`, polled by the UI shell to close its
/// progress overlay once the game is on its way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSignal {
    pub timestamp: DateTime<Utc>,
    pub progress: u8,
    pub state: String,
    pub action: String,
}

impl LaunchSignal {
    pub fn launched(action: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            progress: 100,
            state: "launched".into(),
            action: action.into(),
        }
    }
}

pub async fn write_launch_signal(path: &Path, action: &str) -> LauncherResult<LaunchSignal> {
    let signal = LaunchSignal::launched(action);
    write_json_pretty(path, &signal).await?;
    debug!("Wrote launch signal {:?} ({})", path, action);
    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_file_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs").join("launch.signal.json");
        write_launch_signal(&path, "launch").await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["progress"], 100);
        assert_eq!(value["state"], "launched");
        assert_eq!(value["action"], "launch");
        assert!(value["timestamp"].is_string());
    }
}
