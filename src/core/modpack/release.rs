// ─── Release Resolver ───
// Finds the latest published modpack archive on GitHub.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::version::normalize_version;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::get_following_redirects;

const GITHUB_API: &str = "https://api.github.com";
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Raw `releases/latest` payload (only the fields we read).
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Option<Vec<GithubAsset>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    #[serde(default)]
    pub browser_download_url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// `sha256:<hex>` on recent API versions.
    #[serde(default)]
    pub digest: Option<String>,
}

/// A resolved release. Immutable for the lifetime of an install attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDescriptor {
    pub version: String,
    pub tag: String,
    pub name: String,
    pub published_at: Option<String>,
    pub asset_url: String,
    pub asset_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_sha256: Option<String>,
}

/// Pick the asset named `asset_name` out of a release payload.
pub fn select_release(release: GithubRelease, asset_name: &str) -> LauncherResult<ReleaseDescriptor> {
    let assets = release
        .assets
        .ok_or_else(|| LauncherError::ReleaseUnavailable("Latest release data missing".into()))?;
    let asset = assets
        .into_iter()
        .find(|a| a.name == asset_name)
        .filter(|a| a.browser_download_url.is_some())
        .ok_or_else(|| {
            LauncherError::ReleaseUnavailable(format!("Release asset not found: {asset_name}"))
        })?;

    let tag = release.tag_name.clone().unwrap_or_default();
    let label = release
        .tag_name
        .as_deref()
        .or(release.name.as_deref())
        .unwrap_or_default();
    let version = match normalize_version(label) {
        v if v.is_empty() => "0.0.0".to_string(),
        v => v,
    };

    Ok(ReleaseDescriptor {
        version,
        tag,
        name: release.name.unwrap_or_default(),
        published_at: release.published_at,
        asset_url: asset.browser_download_url.unwrap_or_default(),
        asset_size: asset.size.unwrap_or(0),
        asset_sha256: asset
            .digest
            .as_deref()
            .and_then(|d| d.strip_prefix("sha256:"))
            .map(|hex| hex.to_ascii_lowercase()),
    })
}

/// Source of release metadata. Tests substitute a fixed descriptor.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn resolve_latest(&self) -> LauncherResult<ReleaseDescriptor>;
}

pub struct GithubReleaseResolver {
    client: Client,
    endpoint: String,
    asset_name: String,
}

impl GithubReleaseResolver {
    pub fn new(client: Client, repo: &str, asset_name: &str) -> Self {
        Self {
            client,
            endpoint: format!("{GITHUB_API}/repos/{repo}/releases/latest"),
            asset_name: asset_name.to_string(),
        }
    }

    /// Point the resolver at an arbitrary `releases/latest`-shaped endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ReleaseSource for GithubReleaseResolver {
    async fn resolve_latest(&self) -> LauncherResult<ReleaseDescriptor> {
        debug!("Resolving latest release from {}", self.endpoint);
        let response = get_following_redirects(&self.client, &self.endpoint, GITHUB_JSON)
            .await
            .map_err(|err| match err {
                LauncherError::DownloadFailed { status, .. } => LauncherError::ReleaseUnavailable(
                    format!("Request failed with status {status}"),
                ),
                other => other,
            })?;
        let release: GithubRelease = response.json().await?;
        let descriptor = select_release(release, &self.asset_name)?;
        info!(
            "Latest release {} ({}) asset {} bytes",
            descriptor.version, descriptor.tag, descriptor.asset_size
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::{build_http_client, test_server};

    const ASSET: &str = "Project-P1L0T-modpack.zip";

    fn release_json(asset_name: &str) -> String {
        format!(
            r#"{{
                "tag_name": "v1.3.0",
                "name": "Hotfix",
                "published_at": "2026-09-01T12:00:00Z",
                "assets": [
                    {{ "name": "notes.txt", "browser_download_url": "https://x/notes", "size": 3 }},
                    {{ "name": "{asset_name}", "browser_download_url": "https://x/pack.zip", "size": 2048,
                       "digest": "sha256:ABCDEF" }}
                ]
            }}"#
        )
    }

    #[test]
    fn selects_named_asset_and_normalizes_tag() {
        let release: GithubRelease = serde_json::from_str(&release_json(ASSET)).unwrap();
        let descriptor = select_release(release, ASSET).unwrap();
        assert_eq!(descriptor.version, "1.3.0");
        assert_eq!(descriptor.tag, "v1.3.0");
        assert_eq!(descriptor.asset_url, "https://x/pack.zip");
        assert_eq!(descriptor.asset_size, 2048);
        assert_eq!(descriptor.asset_sha256.as_deref(), Some("abcdef"));
    }

    #[test]
    fn missing_asset_is_release_unavailable() {
        let release: GithubRelease = serde_json::from_str(&release_json("other.zip")).unwrap();
        let err = select_release(release, ASSET).unwrap_err();
        assert!(matches!(err, LauncherError::ReleaseUnavailable(_)));

        let empty: GithubRelease = serde_json::from_str(r#"{ "tag_name": "v1" }"#).unwrap();
        assert!(select_release(empty, ASSET).is_err());
    }

    #[tokio::test]
    async fn resolves_through_http() {
        let base = test_server::spawn(Vec::new(), release_json(ASSET)).await;
        let resolver = GithubReleaseResolver::new(build_http_client().unwrap(), "owner/repo", ASSET)
            .with_endpoint(format!("{base}/release"));

        let descriptor = resolver.resolve_latest().await.unwrap();
        assert_eq!(descriptor.name, "Hotfix");

        let broken = GithubReleaseResolver::new(build_http_client().unwrap(), "owner/repo", ASSET)
            .with_endpoint(format!("{base}/nothing-here"));
        let err = broken.resolve_latest().await.unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::ExternalService);
    }
}
