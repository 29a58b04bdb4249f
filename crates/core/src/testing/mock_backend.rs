//! Mock download backend for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::download::{BackendError, BackendHandle, BackendRole, DownloadBackend, Submission};
use crate::searcher::CandidateKind;

/// A submit call as the backend received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSubmission {
    pub album_id: String,
    pub title: String,
    pub locator: String,
    pub kind: CandidateKind,
    pub payload: Option<Vec<u8>>,
}

/// A post-submit setting the backend was asked to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyCall {
    SeedRatio(f64),
    Label(String),
    MovePath(String),
    Pause,
}

/// Mock implementation of the DownloadBackend trait.
///
/// Every submit returns the configured handle (default: no id, no name).
/// Folder names come from the handle unless overridden with
/// [`MockBackend::set_folder_name`].
#[derive(Debug, Clone)]
pub struct MockBackend {
    name: String,
    role: BackendRole,
    accepts_urls: bool,
    handle: Arc<RwLock<BackendHandle>>,
    /// `Some(x)` overrides name resolution with `x`.
    folder_name: Arc<RwLock<Option<Option<String>>>>,
    submissions: Arc<RwLock<Vec<RecordedSubmission>>>,
    policy_calls: Arc<RwLock<Vec<PolicyCall>>>,
    next_error: Arc<RwLock<Option<BackendError>>>,
    fail_policy: Arc<RwLock<bool>>,
}

impl MockBackend {
    pub fn new(name: &str, role: BackendRole) -> Self {
        Self {
            name: name.to_string(),
            role,
            accepts_urls: role == BackendRole::TorrentClient,
            handle: Arc::new(RwLock::new(BackendHandle::default())),
            folder_name: Arc::new(RwLock::new(None)),
            submissions: Arc::new(RwLock::new(Vec::new())),
            policy_calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            fail_policy: Arc::new(RwLock::new(false)),
        }
    }

    pub fn with_accepts_urls(mut self, accepts: bool) -> Self {
        self.accepts_urls = accepts;
        self
    }

    pub async fn set_handle(&self, handle: BackendHandle) {
        *self.handle.write().await = handle;
    }

    /// Override what `resolve_folder_name` reports. `None` means undeterminable.
    pub async fn set_folder_name(&self, name: Option<&str>) {
        *self.folder_name.write().await = Some(name.map(str::to_string));
    }

    /// Configure the next submit to fail with the given error.
    pub async fn set_next_error(&self, error: BackendError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every post-submit setting fail (calls are still recorded).
    pub async fn set_policy_failure(&self, fail: bool) {
        *self.fail_policy.write().await = fail;
    }

    pub async fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.read().await.clone()
    }

    pub async fn policy_calls(&self) -> Vec<PolicyCall> {
        self.policy_calls.read().await.clone()
    }

    async fn record_policy(&self, call: PolicyCall) -> Result<(), BackendError> {
        self.policy_calls.write().await.push(call);
        if *self.fail_policy.read().await {
            return Err(BackendError::Rejected("policy refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DownloadBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> BackendRole {
        self.role
    }

    fn accepts_urls(&self) -> bool {
        self.accepts_urls
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        self.submissions.write().await.push(RecordedSubmission {
            album_id: submission.request.album_id.clone(),
            title: submission.candidate.title.clone(),
            locator: submission.candidate.locator.clone(),
            kind: submission.candidate.kind,
            payload: submission.payload.map(<[u8]>::to_vec),
        });
        Ok(self.handle.read().await.clone())
    }

    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError> {
        match self.folder_name.read().await.clone() {
            Some(name) => Ok(name),
            None => Ok(handle.name.clone()),
        }
    }

    async fn set_seed_ratio(
        &self,
        _handle: &BackendHandle,
        ratio: f64,
    ) -> Result<(), BackendError> {
        self.record_policy(PolicyCall::SeedRatio(ratio)).await
    }

    async fn set_label(&self, _handle: &BackendHandle, label: &str) -> Result<(), BackendError> {
        self.record_policy(PolicyCall::Label(label.to_string())).await
    }

    async fn set_move_path(&self, _handle: &BackendHandle, path: &str) -> Result<(), BackendError> {
        self.record_policy(PolicyCall::MovePath(path.to_string())).await
    }

    async fn pause(&self, _handle: &BackendHandle) -> Result<(), BackendError> {
        self.record_policy(PolicyCall::Pause).await
    }
}
