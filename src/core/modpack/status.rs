use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use super::progress::InstallState;
use super::release::ReleaseSource;
use super::version::{update_available, LocalModpackStatus};

/// Response of the status query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModpackStatus {
    pub installed: bool,
    pub modpack_root: PathBuf,
    pub current_version: Option<String>,
    pub latest_version: Option<String>,
    pub update_available: bool,
    pub latest_error: Option<String>,
    pub status: InstallState,
}

/// Combine local install facts with an optional remote lookup. A failed lookup
/// is reported in `latest_error`, never as an error.
pub async fn build_status(
    profile_dir: &Path,
    remote: Option<&dyn ReleaseSource>,
    state: InstallState,
) -> ModpackStatus {
    let local = LocalModpackStatus::read(profile_dir).await;

    let (latest_version, latest_error) = match remote {
        Some(source) => match source.resolve_latest().await {
            Ok(release) => (Some(release.version), None),
            Err(err) => {
                warn!("Latest release lookup failed: {}", err);
                (None, Some(err.to_string()))
            }
        },
        None => (None, None),
    };

    let update_available = local.installed
        && latest_version.is_some()
        && update_available(local.current_version.as_deref(), latest_version.as_deref());

    ModpackStatus {
        installed: local.installed,
        modpack_root: local.modpack_root,
        current_version: local.current_version,
        latest_version,
        update_available,
        latest_error,
        status: state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::core::error::{LauncherError, LauncherResult};
    use crate::core::modpack::install::tests::{release, FixedRelease};
    use crate::core::modpack::release::ReleaseDescriptor;
    use crate::core::modpack::version::VersionMarker;

    struct Unreachable;

    #[async_trait]
    impl ReleaseSource for Unreachable {
        async fn resolve_latest(&self) -> LauncherResult<ReleaseDescriptor> {
            Err(LauncherError::ReleaseUnavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn refresh_reports_update_and_failures_inline() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("R2Northstar")).unwrap();
        VersionMarker::from_release(&release("1.0.0"))
            .write(tmp.path())
            .await
            .unwrap();

        let newer = FixedRelease(release("1.1.0"));
        let newer: &dyn ReleaseSource = &newer;
        let status = build_status(tmp.path(), Some(newer), InstallState::default()).await;
        assert!(status.installed);
        assert_eq!(status.current_version.as_deref(), Some("1.0.0"));
        assert_eq!(status.latest_version.as_deref(), Some("1.1.0"));
        assert!(status.update_available);

        let unreachable: &dyn ReleaseSource = &Unreachable;
        let offline = build_status(tmp.path(), Some(unreachable), InstallState::default()).await;
        assert!(!offline.update_available);
        assert!(offline.latest_error.unwrap().contains("offline"));

        let local_only = build_status(tmp.path(), None, InstallState::default()).await;
        assert_eq!(local_only.latest_version, None);
        assert_eq!(local_only.latest_error, None);
    }
}
