//! NZBGet JSON-RPC backend.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::NzbgetConfig;

use super::sanitize::sanitize_folder_name;
use super::{BackendError, BackendHandle, BackendRole, DownloadBackend, Submission};

pub struct NzbgetBackend {
    client: Client,
    config: NzbgetConfig,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Value>,
}

impl NzbgetBackend {
    pub fn new(config: NzbgetConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn rpc_url(&self) -> String {
        format!("{}/jsonrpc", self.config.url.trim_end_matches('/'))
    }

    /// Arguments of the v13+ combined `append` call.
    fn append_params(&self, nzb_name: &str, content: &[u8]) -> Value {
        json!([
            nzb_name,
            base64::engine::general_purpose::STANDARD.encode(content),
            self.config.category.clone().unwrap_or_default(),
            self.config.priority,
            false,
            false,
            "",
            0,
            "SCORE"
        ])
    }
}

/// Positive ids are queue entries; zero and negatives are error codes.
fn parse_append_result(result: &Value) -> Result<i64, BackendError> {
    match result.as_i64() {
        Some(id) if id > 0 => Ok(id),
        Some(code) => Err(BackendError::Rejected(format!("append returned {}", code))),
        None => Err(BackendError::Rejected(format!("unexpected append result: {}", result))),
    }
}

#[async_trait]
impl DownloadBackend for NzbgetBackend {
    fn name(&self) -> &str {
        "nzbget"
    }

    fn role(&self) -> BackendRole {
        BackendRole::NzbClient
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        let payload = submission
            .payload
            .ok_or_else(|| BackendError::InvalidPayload("NZB payload missing".to_string()))?;
        let folder = sanitize_folder_name(&submission.candidate.title);

        let body = json!({
            "method": "append",
            "params": self.append_params(&format!("{}.nzb", folder), payload),
            "id": 1
        });
        let response = self
            .client
            .post(self.rpc_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(BackendError::AuthenticationFailed(
                    "NZBGet password is incorrect".to_string(),
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
        if let Some(error) = rpc.error.filter(|e| !e.is_null()) {
            return Err(BackendError::Rejected(error.to_string()));
        }
        let id = parse_append_result(&rpc.result)?;
        debug!(nzb_id = id, folder = %folder, "Sent NZB to NZBGet");

        Ok(BackendHandle {
            id: Some(id.to_string()),
            name: Some(folder),
        })
    }

    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError> {
        Ok(handle.name.clone())
    }
}
