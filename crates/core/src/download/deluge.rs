//! Deluge Web UI JSON-RPC backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::DelugeConfig;
use crate::session::SessionCache;

use super::magnet;
use super::sanitize::torrent_file_name;
use super::{BackendError, BackendHandle, BackendRole, DownloadBackend, Submission};

const SESSION_KEY: &str = "deluge";
/// Deluge's "not authenticated" RPC error code.
const ERROR_NOT_AUTHENTICATED: i64 = 1;

pub struct DelugeBackend {
    client: Client,
    config: DelugeConfig,
    sessions: Arc<SessionCache>,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
    #[serde(default)]
    code: i64,
}

enum CallError {
    NotAuthenticated,
    Backend(BackendError),
}

impl From<BackendError> for CallError {
    fn from(e: BackendError) -> Self {
        CallError::Backend(e)
    }
}

impl DelugeBackend {
    pub fn new(config: DelugeConfig, sessions: Arc<SessionCache>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            sessions,
            next_id: AtomicU64::new(1),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/json", self.config.url.trim_end_matches('/'))
    }

    async fn raw_call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "method": method, "params": params, "id": id });

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(BackendError::from)?;
        if !response.status().is_success() {
            return Err(BackendError::Rejected(format!("HTTP {}", response.status())).into());
        }

        let rpc: RpcResponse = response.json().await.map_err(|e| {
            BackendError::Rejected(format!("Failed to parse response: {}", e))
        })?;
        match rpc.error {
            Some(err) if err.code == ERROR_NOT_AUTHENTICATED => Err(CallError::NotAuthenticated),
            Some(err) => Err(BackendError::Rejected(format!("{}: {}", method, err.message)).into()),
            None => Ok(rpc.result),
        }
    }

    /// Log in and make sure the web UI is attached to a daemon.
    async fn login(&self) -> Result<String, BackendError> {
        let ok = self
            .raw_call("auth.login", json!([self.config.password]))
            .await
            .map_err(into_backend_error)?;
        if ok != Value::Bool(true) {
            return Err(BackendError::AuthenticationFailed(
                "Invalid password".to_string(),
            ));
        }

        let connected = self
            .raw_call("web.connected", json!([]))
            .await
            .map_err(into_backend_error)?;
        if connected != Value::Bool(true) {
            let hosts = self
                .raw_call("web.get_hosts", json!([]))
                .await
                .map_err(into_backend_error)?;
            let host_id = hosts
                .get(0)
                .and_then(|h| h.get(0))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    BackendError::ConnectionFailed("no Deluge daemon configured".to_string())
                })?
                .to_string();
            self.raw_call("web.connect", json!([host_id]))
                .await
                .map_err(into_backend_error)?;
        }

        debug!("Deluge login successful");
        Ok("authenticated".to_string())
    }

    /// Call a method, logging in again once when the session has expired.
    async fn call(&self, method: &str, params: Value) -> Result<Value, BackendError> {
        let token = self
            .sessions
            .get_or_login(SESSION_KEY, || self.login())
            .await?;

        match self.raw_call(method, params.clone()).await {
            Ok(result) => Ok(result),
            Err(CallError::NotAuthenticated) => {
                warn!("Deluge session expired, re-authenticating");
                self.sessions.invalidate(SESSION_KEY, &token).await;
                self.sessions
                    .get_or_login(SESSION_KEY, || self.login())
                    .await?;
                self.raw_call(method, params).await.map_err(into_backend_error)
            }
            Err(CallError::Backend(e)) => Err(e),
        }
    }

    async fn set_options(&self, hash: &str, options: Value) -> Result<(), BackendError> {
        self.call("core.set_torrent_options", json!([[hash], options]))
            .await?;
        Ok(())
    }
}

fn into_backend_error(e: CallError) -> BackendError {
    match e {
        CallError::NotAuthenticated => {
            BackendError::AuthenticationFailed("not authenticated".to_string())
        }
        CallError::Backend(e) => e,
    }
}

#[async_trait]
impl DownloadBackend for DelugeBackend {
    fn name(&self) -> &str {
        "deluge"
    }

    fn role(&self) -> BackendRole {
        BackendRole::TorrentClient
    }

    fn accepts_urls(&self) -> bool {
        true
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        let candidate = submission.candidate;

        let result = if candidate.is_magnet_locator() {
            self.call("core.add_torrent_magnet", json!([candidate.locator, {}]))
                .await?
        } else if let Some(bytes) = submission.payload {
            let file_name = torrent_file_name(submission.request);
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            self.call("core.add_torrent_file", json!([file_name, encoded, {}]))
                .await?
        } else {
            self.call("core.add_torrent_url", json!([candidate.locator, {}]))
                .await?
        };

        // A torrent Deluge already has comes back as null
        let hash = result
            .as_str()
            .map(str::to_lowercase)
            .or_else(|| {
                candidate
                    .is_magnet_locator()
                    .then(|| magnet::info_hash_hex(&candidate.locator))
                    .flatten()
                    .map(|h| h.to_lowercase())
            });

        debug!(hash = ?hash, title = %candidate.title, "Added torrent to Deluge");
        Ok(BackendHandle { id: hash, name: None })
    }

    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError> {
        let hash = handle.require_id()?;
        let status = self
            .call("core.get_torrent_status", json!([hash, ["name"]]))
            .await?;
        Ok(status
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string))
    }

    async fn set_seed_ratio(&self, handle: &BackendHandle, ratio: f64) -> Result<(), BackendError> {
        self.set_options(
            handle.require_id()?,
            json!({ "stop_at_ratio": true, "stop_ratio": ratio }),
        )
        .await
    }

    async fn set_label(&self, handle: &BackendHandle, label: &str) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        let label = label.to_lowercase();
        // fails when the label exists
        if let Err(e) = self.call("label.add", json!([label])).await {
            debug!(error = %e, "label.add failed");
        }
        self.call("label.set_torrent", json!([hash, label])).await?;
        Ok(())
    }

    async fn set_move_path(&self, handle: &BackendHandle, path: &str) -> Result<(), BackendError> {
        self.set_options(
            handle.require_id()?,
            json!({ "move_completed": true, "move_completed_path": path }),
        )
        .await
    }

    async fn pause(&self, handle: &BackendHandle) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        self.call("core.pause_torrent", json!([[hash]])).await?;
        Ok(())
    }
}
