//! qBittorrent WebUI backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;
use crate::session::SessionCache;

use super::magnet;
use super::torrent_meta::parse_torrent_meta;
use super::{BackendError, BackendHandle, BackendRole, DownloadBackend, Submission};

const SESSION_KEY: &str = "qbittorrent";

pub struct QBittorrentBackend {
    client: Client,
    config: QBittorrentConfig,
    sessions: Arc<SessionCache>,
}

impl QBittorrentBackend {
    pub fn new(
        config: QBittorrentConfig,
        sessions: Arc<SessionCache>,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            sessions,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), endpoint)
    }

    /// Login; the session cookie lands in the client's cookie jar.
    async fn login(&self) -> Result<String, BackendError> {
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(self.url("/api/v2/auth/login"))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            Ok("authenticated".to_string())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(BackendError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(BackendError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_session(&self) -> Result<String, BackendError> {
        self.sessions
            .get_or_login(SESSION_KEY, || self.login())
            .await
    }

    /// Send an authenticated request, logging in again once on 403.
    async fn send<F>(&self, build: F) -> Result<String, BackendError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let token = self.ensure_session().await?;
        let response = build(&self.client).send().await?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session expired, re-authenticating");
            self.sessions.invalidate(SESSION_KEY, &token).await;
            self.ensure_session().await?;
            let retry = build(&self.client).send().await?;
            return read_body(retry).await;
        }

        read_body(response).await
    }

    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, BackendError> {
        let url = self.url(endpoint);
        self.send(|client| client.post(&url).form(params)).await
    }

    async fn torrent_info(&self, query: &str) -> Result<Vec<QBTorrentInfo>, BackendError> {
        let url = self.url(&format!("/api/v2/torrents/info?{}", query));
        let body = self.send(|client| client.get(&url)).await?;
        serde_json::from_str(&body)
            .map_err(|e| BackendError::Rejected(format!("Failed to parse response: {}", e)))
    }
}

async fn read_body(response: Response) -> Result<String, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Rejected(format!("HTTP {}", status)));
    }
    Ok(response.text().await?)
}

/// `torrents/add` answers 200 with `Fails.` when it refuses a torrent.
fn check_add_response(body: &str) -> Result<(), BackendError> {
    match body.trim() {
        "Fails." => Err(BackendError::Rejected(
            "qBittorrent refused the torrent".to_string(),
        )),
        _ => Ok(()),
    }
}

/// qBittorrent torrent info response, reduced to what dispatch needs.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
}

#[async_trait]
impl DownloadBackend for QBittorrentBackend {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    fn role(&self) -> BackendRole {
        BackendRole::TorrentClient
    }

    /// Plain torrent URLs are fetched locally so the info hash comes from
    /// the metainfo itself.
    fn accepts_urls(&self) -> bool {
        false
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        let candidate = submission.candidate;
        let url = self.url("/api/v2/torrents/add");
        let save_path = self.config.download_path.clone();

        let (payload, hash) = if candidate.is_magnet_locator() {
            let hash = magnet::info_hash_hex(&candidate.locator).ok_or_else(|| {
                BackendError::InvalidPayload("magnet link has no usable info hash".to_string())
            })?;
            (None, hash.to_lowercase())
        } else if let Some(bytes) = submission.payload {
            let meta = parse_torrent_meta(bytes)?;
            (Some(bytes), meta.info_hash)
        } else {
            return Err(BackendError::InvalidPayload(
                "qBittorrent needs the torrent payload".to_string(),
            ));
        };

        let body = self
            .send(|client| {
                let mut form = match payload {
                    Some(bytes) => {
                        let part = multipart::Part::bytes(bytes.to_vec())
                            .file_name("release.torrent")
                            .mime_str("application/x-bittorrent")
                            .unwrap_or_else(|_| multipart::Part::bytes(bytes.to_vec()));
                        multipart::Form::new().part("torrents", part)
                    }
                    None => multipart::Form::new().text("urls", candidate.locator.clone()),
                };
                if let Some(path) = save_path.clone() {
                    form = form.text("savepath", path);
                }
                client.post(&url).multipart(form)
            })
            .await?;
        check_add_response(&body)?;

        debug!(hash = %hash, title = %candidate.title, "Added torrent to qBittorrent");
        Ok(BackendHandle {
            id: Some(hash),
            name: None,
        })
    }

    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError> {
        let Some(hash) = handle.id.as_deref() else {
            return Ok(None);
        };
        let torrents = self.torrent_info(&format!("hashes={}", hash)).await?;
        Ok(torrents
            .into_iter()
            .next()
            .map(|t| t.name)
            .filter(|n| !n.is_empty()))
    }

    async fn set_seed_ratio(&self, handle: &BackendHandle, ratio: f64) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        let ratio = ratio.to_string();
        self.post_form(
            "/api/v2/torrents/setShareLimits",
            &[
                ("hashes", hash),
                ("ratioLimit", &ratio),
                ("seedingTimeLimit", "-2"),
            ],
        )
        .await?;
        Ok(())
    }

    async fn set_label(&self, handle: &BackendHandle, label: &str) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        // 409 when the category already exists
        if let Err(e) = self
            .post_form("/api/v2/torrents/createCategory", &[("category", label)])
            .await
        {
            debug!(error = %e, "createCategory failed");
        }
        self.post_form(
            "/api/v2/torrents/setCategory",
            &[("hashes", hash), ("category", label)],
        )
        .await?;
        Ok(())
    }

    async fn set_move_path(&self, handle: &BackendHandle, path: &str) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        self.post_form(
            "/api/v2/torrents/setLocation",
            &[("hashes", hash), ("location", path)],
        )
        .await?;
        Ok(())
    }

    async fn pause(&self, handle: &BackendHandle) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        self.post_form("/api/v2/torrents/pause", &[("hashes", hash)])
            .await?;
        Ok(())
    }
}
