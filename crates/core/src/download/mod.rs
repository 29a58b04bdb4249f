//! Download dispatch: one backend per candidate family, selected from
//! configuration at startup.

mod blackhole;
mod deluge;
mod dispatcher;
mod librqbit;
pub mod magnet;
mod nzbget;
mod qbittorrent;
mod sabnzbd;
mod sanitize;
mod torrent_meta;
mod transmission;
mod types;

use std::sync::Arc;

pub use blackhole::BlackholeBackend;
pub use deluge::DelugeBackend;
pub use dispatcher::DownloadDispatcher;
pub use librqbit::LibrqbitBackend;
pub use nzbget::NzbgetBackend;
pub use qbittorrent::QBittorrentBackend;
pub use sabnzbd::SabnzbdBackend;
pub use sanitize::{album_folder_name, sanitize_folder_name, torrent_file_name, FolderRewrites};
pub use torrent_meta::{parse_torrent_meta, TorrentMeta};
pub use transmission::TransmissionBackend;
pub use types::*;

use crate::config::{DownloadConfig, NzbBackendKind, TorrentBackendKind};
use crate::session::SessionCache;

/// The backends named by `[download]`.
pub struct ConfiguredBackends {
    pub nzb: Option<Arc<dyn DownloadBackend>>,
    pub torrent: Option<Arc<dyn DownloadBackend>>,
}

fn missing(section: &str) -> BackendError {
    BackendError::Unsupported(format!("[download.{}] is not configured", section))
}

/// Build the configured backends. Remote clients share `sessions`.
pub async fn build_backends(
    config: &DownloadConfig,
    sessions: Arc<SessionCache>,
    timeout_secs: u32,
) -> Result<ConfiguredBackends, BackendError> {
    let nzb: Option<Arc<dyn DownloadBackend>> = match config.nzb_backend {
        None => None,
        Some(NzbBackendKind::Blackhole) => {
            let dir = config
                .blackhole
                .nzb_dir
                .clone()
                .ok_or_else(|| missing("blackhole.nzb_dir"))?;
            Some(Arc::new(BlackholeBackend::nzb(dir)))
        }
        Some(NzbBackendKind::Sabnzbd) => {
            let sab = config.sabnzbd.clone().ok_or_else(|| missing("sabnzbd"))?;
            Some(Arc::new(SabnzbdBackend::new(sab)?))
        }
        Some(NzbBackendKind::Nzbget) => {
            let nzbget = config.nzbget.clone().ok_or_else(|| missing("nzbget"))?;
            Some(Arc::new(NzbgetBackend::new(nzbget)?))
        }
    };

    let torrent: Option<Arc<dyn DownloadBackend>> = match config.torrent_backend {
        None => None,
        Some(TorrentBackendKind::Blackhole) => {
            let dir = config
                .blackhole
                .torrent_dir
                .clone()
                .ok_or_else(|| missing("blackhole.torrent_dir"))?;
            Some(Arc::new(BlackholeBackend::torrent(
                dir,
                config.magnet_policy,
                config.blackhole.conversion_services.clone(),
                timeout_secs,
            )?))
        }
        Some(TorrentBackendKind::Qbittorrent) => {
            let qb = config
                .qbittorrent
                .clone()
                .ok_or_else(|| missing("qbittorrent"))?;
            Some(Arc::new(QBittorrentBackend::new(qb, sessions.clone())?))
        }
        Some(TorrentBackendKind::Transmission) => {
            let tr = config
                .transmission
                .clone()
                .ok_or_else(|| missing("transmission"))?;
            Some(Arc::new(TransmissionBackend::new(tr, sessions.clone())?))
        }
        Some(TorrentBackendKind::Deluge) => {
            let deluge = config.deluge.clone().ok_or_else(|| missing("deluge"))?;
            Some(Arc::new(DelugeBackend::new(deluge, sessions.clone())?))
        }
        Some(TorrentBackendKind::Librqbit) => {
            let rqbit = config.librqbit.as_ref().ok_or_else(|| missing("librqbit"))?;
            Some(Arc::new(LibrqbitBackend::new(rqbit).await?))
        }
    };

    Ok(ConfiguredBackends { nzb, torrent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, MagnetPolicy};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_blackhole_and_qbittorrent() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from_str(&format!(
            r#"
[download]
nzb_backend = "blackhole"
torrent_backend = "qbittorrent"

[download.blackhole]
nzb_dir = "{}"

[download.qbittorrent]
url = "http://localhost:8080"
username = "admin"
password = "adminadmin"
"#,
            dir.path().display()
        ))
        .unwrap();

        let backends = build_backends(&config.download, Arc::new(SessionCache::new()), 5)
            .await
            .unwrap();
        let nzb = backends.nzb.unwrap();
        assert_eq!(nzb.name(), "nzb_blackhole");
        assert_eq!(nzb.role(), BackendRole::WatchDirectory);
        let torrent = backends.torrent.unwrap();
        assert_eq!(torrent.name(), "qbittorrent");
        assert!(!torrent.accepts_urls());
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let backends = build_backends(
            &DownloadConfig::default(),
            Arc::new(SessionCache::new()),
            5,
        )
        .await
        .unwrap();
        assert!(backends.nzb.is_none());
        assert!(backends.torrent.is_none());
    }

    #[tokio::test]
    async fn test_missing_client_section() {
        let config = DownloadConfig {
            torrent_backend: Some(TorrentBackendKind::Transmission),
            magnet_policy: MagnetPolicy::Embed,
            ..Default::default()
        };
        let result = build_backends(&config, Arc::new(SessionCache::new()), 5).await;
        assert!(matches!(result, Err(BackendError::Unsupported(_))));
    }
}
