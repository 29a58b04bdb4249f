//! Metadata read from `.torrent` payloads.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};

use super::BackendError;

/// The name and info hash a torrent declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentMeta {
    pub name: Option<String>,
    /// Lowercase hex.
    pub info_hash: String,
}

pub fn parse_torrent_meta(bytes: &[u8]) -> Result<TorrentMeta, BackendError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| BackendError::InvalidPayload(e.to_string()))?;

    let name = torrent
        .info
        .name
        .as_ref()
        .map(|b| String::from_utf8_lossy(b.as_ref()).into_owned())
        .filter(|n| !n.trim().is_empty());

    Ok(TorrentMeta {
        name,
        info_hash: torrent.info_hash.as_string(),
    })
}
