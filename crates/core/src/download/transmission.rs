//! Transmission RPC backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::TransmissionConfig;
use crate::session::SessionCache;

use super::{BackendError, BackendHandle, BackendRole, DownloadBackend, Submission};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const SESSION_KEY: &str = "transmission";

pub struct TransmissionBackend {
    client: Client,
    config: TransmissionConfig,
    sessions: Arc<SessionCache>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddedTorrent {
    hash_string: String,
    #[serde(default)]
    name: Option<String>,
}

impl TransmissionBackend {
    pub fn new(
        config: TransmissionConfig,
        sessions: Arc<SessionCache>,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            sessions,
        })
    }

    async fn post(
        &self,
        body: &Value,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response, BackendError> {
        let mut request = self.client.post(&self.config.url).json(body);
        if let Some(id) = session_id {
            request = request.header(SESSION_HEADER, id);
        }
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }
        Ok(request.send().await?)
    }

    fn session_id_from(response: &reqwest::Response) -> Option<String> {
        response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// The first request is answered with 409 and the id to use.
    async fn fetch_session_id(&self) -> Result<String, BackendError> {
        let response = self
            .post(&json!({ "method": "session-get" }), None)
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(BackendError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ));
        }
        Self::session_id_from(&response).ok_or_else(|| {
            BackendError::ConnectionFailed(format!(
                "no session id in response (HTTP {})",
                response.status()
            ))
        })
    }

    /// Call an RPC method, refreshing the session id once on 409.
    async fn call(&self, method: &str, arguments: Value) -> Result<Value, BackendError> {
        let body = json!({ "method": method, "arguments": arguments });
        let session_id = self
            .sessions
            .get_or_login(SESSION_KEY, || self.fetch_session_id())
            .await?;

        let mut response = self.post(&body, Some(&session_id)).await?;
        if response.status() == StatusCode::CONFLICT {
            let fresh = Self::session_id_from(&response).ok_or_else(|| {
                BackendError::ConnectionFailed("409 without a session id".to_string())
            })?;
            warn!("Transmission session id expired, retrying");
            self.sessions.replace(SESSION_KEY, fresh.clone()).await;
            response = self.post(&body, Some(&fresh)).await?;
        }

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(BackendError::AuthenticationFailed(
                    "Invalid credentials".to_string(),
                ))
            }
            status if !status.is_success() => {
                return Err(BackendError::Rejected(format!("HTTP {}", status)))
            }
            _ => {}
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Rejected(format!("Failed to parse response: {}", e)))?;
        if rpc.result != "success" {
            return Err(BackendError::Rejected(rpc.result));
        }
        Ok(rpc.arguments)
    }

    async fn torrent_set(&self, hash: &str, fields: Value) -> Result<(), BackendError> {
        let mut arguments = json!({ "ids": [hash] });
        if let (Some(target), Value::Object(extra)) = (arguments.as_object_mut(), fields) {
            target.extend(extra);
        }
        self.call("torrent-set", arguments).await?;
        Ok(())
    }
}

fn parse_added(arguments: &Value) -> Result<AddedTorrent, BackendError> {
    let added = arguments
        .get("torrent-added")
        .or_else(|| arguments.get("torrent-duplicate"))
        .cloned()
        .ok_or_else(|| BackendError::Rejected("no torrent in torrent-add response".to_string()))?;
    serde_json::from_value(added)
        .map_err(|e| BackendError::Rejected(format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl DownloadBackend for TransmissionBackend {
    fn name(&self) -> &str {
        "transmission"
    }

    fn role(&self) -> BackendRole {
        BackendRole::TorrentClient
    }

    fn accepts_urls(&self) -> bool {
        true
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        let candidate = submission.candidate;
        let mut arguments = match submission.payload {
            Some(bytes) if !candidate.is_magnet_locator() => json!({
                "metainfo": base64::engine::general_purpose::STANDARD.encode(bytes)
            }),
            _ => json!({ "filename": candidate.locator }),
        };
        if let Some(dir) = &self.config.download_dir {
            arguments["download-dir"] = json!(dir);
        }

        let result = self.call("torrent-add", arguments).await?;
        let added = parse_added(&result)?;
        debug!(hash = %added.hash_string, name = ?added.name, "Added torrent to Transmission");

        Ok(BackendHandle {
            id: Some(added.hash_string.to_lowercase()),
            name: added.name.filter(|n| !n.is_empty()),
        })
    }

    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError> {
        if handle.name.is_some() {
            return Ok(handle.name.clone());
        }
        let hash = handle.require_id()?;
        let result = self
            .call("torrent-get", json!({ "ids": [hash], "fields": ["name"] }))
            .await?;
        Ok(result
            .get("torrents")
            .and_then(|t| t.get(0))
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string))
    }

    async fn set_seed_ratio(&self, handle: &BackendHandle, ratio: f64) -> Result<(), BackendError> {
        // seedRatioMode 1 = use this torrent's limit
        self.torrent_set(
            handle.require_id()?,
            json!({ "seedRatioLimit": ratio, "seedRatioMode": 1 }),
        )
        .await
    }

    async fn set_label(&self, handle: &BackendHandle, label: &str) -> Result<(), BackendError> {
        self.torrent_set(handle.require_id()?, json!({ "labels": [label] }))
            .await
    }

    async fn set_move_path(&self, handle: &BackendHandle, path: &str) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        self.call(
            "torrent-set-location",
            json!({ "ids": [hash], "location": path, "move": true }),
        )
        .await?;
        Ok(())
    }

    async fn pause(&self, handle: &BackendHandle) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        self.call("torrent-stop", json!({ "ids": [hash] })).await?;
        Ok(())
    }
}
