//! SABnzbd backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SabnzbdConfig;

use super::sanitize::{sanitize_folder_name, FolderRewrites};
use super::{BackendError, BackendHandle, BackendRole, DownloadBackend, Submission};

pub struct SabnzbdBackend {
    client: Client,
    config: SabnzbdConfig,
}

#[derive(Debug, Deserialize)]
struct AddFileResponse {
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SabnzbdBackend {
    pub fn new(config: SabnzbdConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!("{}/api", self.config.url.trim_end_matches('/'))
    }

    /// The rename switches SABnzbd applies to job folders.
    async fn folder_rewrites(&self) -> Result<FolderRewrites, BackendError> {
        let response = self
            .client
            .get(self.api_url())
            .query(&[
                ("mode", "get_config"),
                ("section", "misc"),
                ("output", "json"),
                ("apikey", self.config.api_key.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Rejected(format!("HTTP {}", response.status())));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Rejected(format!("Failed to parse response: {}", e)))?;
        Ok(parse_rewrites(&body))
    }
}

fn parse_rewrites(body: &Value) -> FolderRewrites {
    let misc = &body["config"]["misc"];
    let flag = |key: &str| match &misc[key] {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => s == "1",
        _ => false,
    };
    FolderRewrites {
        dots_to_spaces: flag("replace_dots"),
        spaces_to_underscores: flag("replace_spaces"),
    }
}

#[async_trait]
impl DownloadBackend for SabnzbdBackend {
    fn name(&self) -> &str {
        "sabnzbd"
    }

    fn role(&self) -> BackendRole {
        BackendRole::NzbClient
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        let payload = submission
            .payload
            .ok_or_else(|| BackendError::InvalidPayload("NZB payload missing".to_string()))?;
        let folder = sanitize_folder_name(&submission.candidate.title);

        let part = multipart::Part::bytes(payload.to_vec())
            .file_name(format!("{}.nzb", folder))
            .mime_str("application/x-nzb")
            .map_err(|e| BackendError::InvalidPayload(e.to_string()))?;
        let form = multipart::Form::new().part("name", part);

        let mut query = vec![
            ("mode", "addfile"),
            ("output", "json"),
            ("apikey", self.config.api_key.as_str()),
            ("nzbname", folder.as_str()),
        ];
        if let Some(category) = self.config.category.as_deref() {
            query.push(("cat", category));
        }

        let response = self
            .client
            .post(self.api_url())
            .query(&query)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Rejected(format!("HTTP {}", response.status())));
        }
        let added: AddFileResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Rejected(format!("Failed to parse response: {}", e)))?;
        if !added.status {
            let reason = added.error.unwrap_or_else(|| "addfile failed".to_string());
            if reason.to_lowercase().contains("api key") {
                return Err(BackendError::AuthenticationFailed(reason));
            }
            return Err(BackendError::Rejected(reason));
        }

        let rewrites = self.folder_rewrites().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not read SABnzbd rename settings");
            FolderRewrites::default()
        });
        let name = rewrites.apply(&folder);
        debug!(folder = %name, nzo_ids = ?added.nzo_ids, "Sent NZB to SABnzbd");

        Ok(BackendHandle {
            id: added.nzo_ids.into_iter().next(),
            name: Some(name),
        })
    }

    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError> {
        Ok(handle.name.clone())
    }
}
