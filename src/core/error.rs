use std::path::PathBuf;

use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::core::modpack::InstallState;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Too many redirects fetching {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Release unavailable: {0}")]
    ReleaseUnavailable(String),

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-256 mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Validation ──────────────────────────────────────
    #[error("{0}")]
    Validation(String),

    #[error("Mod not found: {0}")]
    ModNotFound(String),

    #[error("{0}")]
    NotFound(String),

    // ── Lifecycle ───────────────────────────────────────
    #[error("{message}")]
    Conflict {
        message: String,
        state: Option<Box<InstallState>>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

/// Coarse classification used by the request surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Conflict,
    Validation,
    NotFound,
    ExternalService,
    Filesystem,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Conflict => 409,
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::ExternalService => 502,
            ErrorKind::Filesystem | ErrorKind::Internal => 500,
            ErrorKind::Cancelled => 499,
        }
    }
}

impl LauncherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LauncherError::Conflict {
            message: message.into(),
            state: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::Io { .. } | LauncherError::Zip(_) => ErrorKind::Filesystem,
            LauncherError::Http(_)
            | LauncherError::InvalidUrl { .. }
            | LauncherError::DownloadFailed { .. }
            | LauncherError::TooManyRedirects { .. }
            | LauncherError::ReleaseUnavailable(_)
            | LauncherError::ChecksumMismatch { .. } => ErrorKind::ExternalService,
            LauncherError::Validation(_) | LauncherError::Json(_) => ErrorKind::Validation,
            LauncherError::ModNotFound(_) | LauncherError::NotFound(_) => ErrorKind::NotFound,
            LauncherError::Conflict { .. } => ErrorKind::Conflict,
            LauncherError::Cancelled => ErrorKind::Cancelled,
            LauncherError::Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for LauncherError {
    fn from(err: tokio::task::JoinError) -> Self {
        LauncherError::Other(format!("Task join error: {err}"))
    }
}

// ── Serialization for the request surface ───────────────
// Failures leave the process as `{ kind, status, error, state? }`.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let kind = self.kind();
        let state = match self {
            LauncherError::Conflict { state, .. } => state.as_deref(),
            _ => None,
        };
        let mut out = serializer.serialize_struct("LauncherError", 4)?;
        out.serialize_field("kind", &kind)?;
        out.serialize_field("status", &kind.status_code())?;
        out.serialize_field("error", &self.to_string())?;
        if let Some(state) = state {
            out.serialize_field("state", state)?;
        } else {
            out.skip_field("state")?;
        }
        out.end()
    }
}
