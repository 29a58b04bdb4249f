//! Embedded librqbit torrent backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session, SessionOptions,
    SessionPersistenceConfig,
};
use tracing::{debug, info, warn};

use crate::config::LibrqbitConfig;

use super::{BackendError, BackendHandle, BackendRole, DownloadBackend, Submission};

/// Magnet metadata lookups over DHT can stall indefinitely.
const ADD_TIMEOUT: Duration = Duration::from_secs(60);

pub struct LibrqbitBackend {
    session: Arc<Session>,
}

impl LibrqbitBackend {
    pub async fn new(config: &LibrqbitConfig) -> Result<Self, BackendError> {
        let download_path = PathBuf::from(&config.download_path);
        std::fs::create_dir_all(&download_path).map_err(|e| {
            BackendError::Io(format!("Failed to create download directory: {}", e))
        })?;

        let mut opts = SessionOptions::default();
        if !config.enable_dht {
            opts.disable_dht = true;
        }
        if let Some(port) = config.listen_port {
            opts.listen_port_range = Some(port..(port + 1));
        }
        if let Some(ref persistence_path) = config.persistence_path {
            let folder = PathBuf::from(persistence_path);
            std::fs::create_dir_all(&folder).map_err(|e| {
                BackendError::Io(format!("Failed to create persistence directory: {}", e))
            })?;
            opts.persistence = Some(SessionPersistenceConfig::Json {
                folder: Some(folder),
            });
        }

        info!(
            download_path = %download_path.display(),
            dht_enabled = !opts.disable_dht,
            "Initializing librqbit session"
        );

        let session = Session::new_with_opts(download_path, opts)
            .await
            .map_err(|e| {
                BackendError::ConnectionFailed(format!(
                    "Failed to initialize librqbit session: {}",
                    e
                ))
            })?;

        Ok(Self { session })
    }

    fn find_torrent(&self, hash: &str) -> Option<Arc<ManagedTorrent>> {
        let hash = hash.to_lowercase();
        self.session.with_torrents(|iter| {
            for (_, torrent) in iter {
                if torrent.info_hash().as_string() == hash {
                    return Some(torrent.clone());
                }
            }
            None
        })
    }
}

#[async_trait]
impl DownloadBackend for LibrqbitBackend {
    fn name(&self) -> &str {
        "librqbit"
    }

    fn role(&self) -> BackendRole {
        BackendRole::TorrentClient
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<BackendHandle, BackendError> {
        let candidate = submission.candidate;
        let add = match submission.payload {
            Some(bytes) if !candidate.is_magnet_locator() => AddTorrent::from_bytes(bytes.to_vec()),
            _ => AddTorrent::from_url(candidate.locator.clone()),
        };

        let response = tokio::time::timeout(
            ADD_TIMEOUT,
            self.session.add_torrent(add, Some(AddTorrentOptions::default())),
        )
        .await
        .map_err(|_| BackendError::Timeout)?
        .map_err(|e| BackendError::Rejected(format!("Failed to add torrent: {}", e)))?;

        let handle = match response {
            AddTorrentResponse::Added(_, handle) => handle,
            AddTorrentResponse::AlreadyManaged(_, handle) => {
                warn!(title = %candidate.title, "Torrent already managed by librqbit");
                handle
            }
            AddTorrentResponse::ListOnly(_) => {
                return Err(BackendError::Rejected(
                    "torrent was added in list-only mode".to_string(),
                ))
            }
        };

        let hash = handle.info_hash().as_string();
        let name = handle.name().map(|s| s.to_string());
        debug!(hash = %hash, name = ?name, "Torrent added to librqbit");

        Ok(BackendHandle {
            id: Some(hash),
            name,
        })
    }

    async fn resolve_folder_name(
        &self,
        handle: &BackendHandle,
    ) -> Result<Option<String>, BackendError> {
        if handle.name.is_some() {
            return Ok(handle.name.clone());
        }
        let Some(hash) = handle.id.as_deref() else {
            return Ok(None);
        };
        Ok(self
            .find_torrent(hash)
            .and_then(|t| t.name().map(|s| s.to_string())))
    }

    async fn pause(&self, handle: &BackendHandle) -> Result<(), BackendError> {
        let hash = handle.require_id()?;
        let torrent = self
            .find_torrent(hash)
            .ok_or_else(|| BackendError::Rejected(format!("torrent {} not found", hash)))?;
        self.session
            .pause(&torrent)
            .await
            .map_err(|e| BackendError::Rejected(format!("Failed to pause torrent: {}", e)))?;
        debug!(hash = %hash, "Torrent paused");
        Ok(())
    }
}
