//! Watch-directory backend: payloads are written as files for an external client.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::MagnetPolicy;

use super::magnet;
use super::sanitize::{sanitize_folder_name, torrent_file_name};
use super::torrent_meta::parse_torrent_meta;
use super::{BackendError, BackendHandle, BackendRole, DownloadBackend, Submission};

enum Target {
    Nzb,
    Torrent {
        magnet_policy: MagnetPolicy,
        conversion_services: Vec<String>,
    },
}

pub struct BlackholeBackend {
    dir: PathBuf,
    target: Target,
    client: Client,
}

impl BlackholeBackend {
    pub fn nzb(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            target: Target::Nzb,
            client: Client::new(),
        }
    }

    pub fn torrent(
        dir: impl Into<PathBuf>,
        magnet_policy: MagnetPolicy,
        conversion_services: Vec<String>,
        timeout_secs: u32,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            dir: dir.into(),
            target: Target::Torrent {
                magnet_policy,
                conversion_services,
            },
            client,
        })
    }

    async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, BackendError> {
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            BackendError::Io(format!("cannot write {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote payload to watch directory");
        Ok(path)
    }

    async fn submit_nzb(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        let payload = submission
            .payload
            .ok_or_else(|| BackendError::InvalidPayload("NZB payload missing".to_string()))?;
        let folder = sanitize_folder_name(&submission.candidate.title);

        self.write(&format!("{}.nzb", folder), payload).await?;
        Ok(BackendHandle::named(folder))
    }

    async fn submit_magnet(
        &self,
        submission: Submission<'_>,
        policy: MagnetPolicy,
        services: &[String],
    ) -> Result<BackendHandle, BackendError> {
        let candidate = submission.candidate;
        let file_name = torrent_file_name(submission.request);

        match policy {
            MagnetPolicy::Ignore => Err(BackendError::Unsupported(
                "magnet links are ignored by the torrent blackhole".to_string(),
            )),
            MagnetPolicy::Open => {
                let uri = candidate.locator.clone();
                tokio::task::spawn_blocking(move || webbrowser::open(&uri))
                    .await
                    .map_err(|e| BackendError::Io(e.to_string()))?
                    .map_err(|e| BackendError::Io(format!("cannot open magnet link: {}", e)))?;
                info!(title = %candidate.title, "Opened magnet link with the system handler");
                Ok(BackendHandle::named(candidate.title.clone()))
            }
            MagnetPolicy::Embed => {
                let bytes = match submission.payload {
                    Some(bytes) => bytes.to_vec(),
                    None => magnet::embed_bytes(&candidate.locator),
                };
                self.write(&file_name, &bytes).await?;
                Ok(BackendHandle::named(candidate.title.clone()))
            }
            MagnetPolicy::Convert => {
                let bytes = self.convert(&candidate.locator, services).await?;
                self.write(&file_name, &bytes).await?;
                let name = parse_torrent_meta(&bytes)
                    .ok()
                    .and_then(|meta| meta.name)
                    .unwrap_or_else(|| candidate.title.clone());
                Ok(BackendHandle::named(name))
            }
        }
    }

    /// Fetch a `.torrent` for `magnet` from the first conversion service that
    /// produces a parseable one. Services are tried in random order.
    async fn convert(
        &self,
        magnet_uri: &str,
        services: &[String],
    ) -> Result<Vec<u8>, BackendError> {
        let hash = magnet::info_hash_hex(magnet_uri).ok_or_else(|| {
            BackendError::InvalidPayload("magnet link has no usable info hash".to_string())
        })?;

        let mut order: Vec<&String> = services.iter().collect();
        order.shuffle(&mut rand::thread_rng());

        for template in order {
            let url = template.replace("%s", &hash);
            match self.fetch_torrent(&url).await {
                Ok(bytes) => {
                    info!(service = %url, "Converted magnet link");
                    return Ok(bytes);
                }
                Err(e) => warn!(service = %url, error = %e, "Magnet conversion failed"),
            }
        }

        Err(BackendError::Rejected(
            "every magnet conversion service failed".to_string(),
        ))
    }

    async fn fetch_torrent(&self, url: &str) -> Result<Vec<u8>, BackendError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Rejected(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().await?.to_vec();
        parse_torrent_meta(&bytes)?;
        Ok(bytes)
    }
}

#[async_trait]
impl DownloadBackend for BlackholeBackend {
    fn name(&self) -> &str {
        match self.target {
            Target::Nzb => "nzb_blackhole",
            Target::Torrent { .. } => "torrent_blackhole",
        }
    }

    fn role(&self) -> BackendRole {
        BackendRole::WatchDirectory
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        let (policy, services) = match &self.target {
            Target::Nzb => return self.submit_nzb(submission).await,
            Target::Torrent {
                magnet_policy,
                conversion_services,
            } => (*magnet_policy, conversion_services),
        };

        if submission.candidate.is_magnet_locator() {
            return self.submit_magnet(submission, policy, services).await;
        }

        let payload = submission
            .payload
            .ok_or_else(|| BackendError::InvalidPayload("torrent payload missing".to_string()))?;
        self.write(&torrent_file_name(submission.request), payload).await?;

        let name = match parse_torrent_meta(payload) {
            Ok(meta) => meta.name,
            Err(e) => {
                debug!(error = %e, "Torrent metadata unreadable, using the release title");
                None
            }
        };
        Ok(BackendHandle::named(
            name.unwrap_or_else(|| submission.candidate.title.clone()),
        ))
    }

    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError> {
        Ok(handle.name.clone())
    }
}
