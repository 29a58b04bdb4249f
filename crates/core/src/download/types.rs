//! Types for download dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::library::{AlbumRequest, LibraryError};
use crate::searcher::{CandidateKind, CandidateRecord};

/// Errors a single backend call can report.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rejected by backend: {0}")]
    Rejected(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_connect() {
            BackendError::ConnectionFailed(e.to_string())
        } else {
            BackendError::Rejected(e.to_string())
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e.to_string())
    }
}

/// Why a dispatch produced no outcome.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No {0} backend configured")]
    NoBackend(&'static str),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Backend accepted the download but {0} could not be determined")]
    Unresolved(&'static str),
}

/// How a backend is reached. Decides which metadata must come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    /// Files dropped into a watched directory.
    WatchDirectory,
    /// Remote Usenet client.
    NzbClient,
    /// Remote or embedded torrent client; must report a torrent id.
    TorrentClient,
}

/// Returned by `submit`, consumed by the follow-up calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendHandle {
    /// Client-side id (info hash for torrent clients, job id for NZB clients).
    pub id: Option<String>,
    /// Name already known at submit time.
    pub name: Option<String>,
}

impl BackendHandle {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    /// The client id, required by every follow-up call on remote clients.
    pub fn require_id(&self) -> Result<&str, BackendError> {
        self.id
            .as_deref()
            .ok_or_else(|| BackendError::Rejected("no torrent id".to_string()))
    }
}

/// What the backend receives for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub request: &'a AlbumRequest,
    pub candidate: &'a CandidateRecord,
    /// Fetched payload. `None` when the backend is expected to fetch the locator itself.
    pub payload: Option<&'a [u8]>,
}

/// Post-submit settings for one dispatch. Unset fields are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostSubmitPolicy {
    pub seed_ratio: Option<f64>,
    pub label: Option<String>,
    pub move_path: Option<String>,
    pub pause: bool,
}

/// A download client, selected once from configuration.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> BackendRole;

    /// Whether torrent URLs can be handed over without fetching them first.
    fn accepts_urls(&self) -> bool {
        false
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError>;

    /// Folder or torrent name the client will use. `None` means undeterminable.
    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError>;

    async fn set_seed_ratio(
        &self,
        _handle: &BackendHandle,
        _ratio: f64,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn set_label(&self, _handle: &BackendHandle, _label: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn set_move_path(
        &self,
        _handle: &BackendHandle,
        _path: &str,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn pause(&self, _handle: &BackendHandle) -> Result<(), BackendError> {
        Ok(())
    }

    /// Apply every configured setting. Failures are logged and counted, never returned.
    async fn apply_post_submit_policy(
        &self,
        handle: &BackendHandle,
        policy: &PostSubmitPolicy,
    ) -> usize {
        let mut failures = 0;

        if let Some(ratio) = policy.seed_ratio {
            if let Err(e) = self.set_seed_ratio(handle, ratio).await {
                warn!(backend = %self.name(), error = %e, "Could not set seed ratio");
                failures += 1;
            }
        }
        if let Some(label) = policy.label.as_deref() {
            if let Err(e) = self.set_label(handle, label).await {
                warn!(backend = %self.name(), error = %e, "Could not set label");
                failures += 1;
            }
        }
        if let Some(path) = policy.move_path.as_deref() {
            if let Err(e) = self.set_move_path(handle, path).await {
                warn!(backend = %self.name(), error = %e, "Could not set move path");
                failures += 1;
            }
        }
        if policy.pause {
            if let Err(e) = self.pause(handle).await {
                warn!(backend = %self.name(), error = %e, "Could not pause download");
                failures += 1;
            }
        }

        failures
    }
}

/// The normalized result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub folder_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_torrent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_seed_ratio: Option<f64>,
    pub kind: CandidateKind,
    pub backend: String,
    /// Set when the snatch row or album status could not be written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_warning: Option<String>,
}

impl DownloadOutcome {
    pub(crate) fn note_persistence_failure(&mut self, err: &LibraryError) {
        self.persistence_warning = Some(err.to_string());
    }
}
