//! Mock collaborators and fixtures for tests.
//!
//! Every external seam of the pipeline has a mock here: providers, the
//! payload resolver, download backends and notification channels. Mocks
//! share their state between clones, so a test keeps one handle for
//! configuration and assertions while the code under test owns another.
//!
//! ```rust,ignore
//! use encore_core::testing::{fixtures, MockBackend, MockProvider};
//!
//! let provider = MockProvider::new("nzb-indexer", ProviderClass::Nzb);
//! provider.set_results(vec![fixtures::candidate("Foo - Bar", 100, CandidateKind::Nzb)]).await;
//!
//! let backend = MockBackend::new("sabnzbd", BackendRole::NzbClient);
//! backend.set_handle(BackendHandle::named("Foo - Bar")).await;
//! ```

mod mock_backend;
mod mock_notifier;
mod mock_payload;
mod mock_provider;

pub use mock_backend::{MockBackend, PolicyCall, RecordedSubmission};
pub use mock_notifier::MockNotifier;
pub use mock_payload::MockPayloadResolver;
pub use mock_provider::{MockProvider, RecordedProviderSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::library::{AlbumRecord, AlbumRequest, AlbumStatus, QualityTier};
    use crate::searcher::{CandidateKind, CandidateRecord};

    /// A released album request with the default quality tier.
    pub fn album_request(artist: &str, album: &str) -> AlbumRequest {
        AlbumRequest {
            album_id: format!("rg-{}", slug(album)),
            artist: artist.to_string(),
            album_title: album.to_string(),
            release_date: Some("2010-06-01".to_string()),
            album_type: Some("Album".to_string()),
            duration_ms: Some(2_400_000),
            search_term: None,
            quality: QualityTier::default(),
            is_new: false,
        }
    }

    /// A `Wanted` library album.
    pub fn album_record(album_id: &str, artist: &str, album: &str) -> AlbumRecord {
        AlbumRecord {
            album_id: album_id.to_string(),
            artist_name: artist.to_string(),
            album_title: album.to_string(),
            release_date: Some("2010-06-01".to_string()),
            album_type: Some("Album".to_string()),
            duration_ms: Some(2_400_000),
            search_term: None,
            status: AlbumStatus::Wanted,
        }
    }

    /// A candidate from `mock-indexer` with a locator derived from the title.
    pub fn candidate(title: &str, size: u64, kind: CandidateKind) -> CandidateRecord {
        let locator = match kind {
            CandidateKind::Nzb => format!("http://mock-indexer/nzb/{}", slug(title)),
            CandidateKind::Torrent => format!("http://mock-indexer/torrent/{}", slug(title)),
            CandidateKind::Magnet => format!("magnet:?xt=urn:btih:{}", fake_info_hash(title)),
        };
        CandidateRecord::new(title, size, locator, "mock-indexer", kind)
    }

    /// Bencoded single-file torrent whose `info.name` is `name`.
    pub fn single_file_torrent(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"d8:announce23:http://tracker.test/ann4:infod");
        out.extend_from_slice(b"6:lengthi1024e");
        out.extend_from_slice(format!("4:name{}:{}", name.len(), name).as_bytes());
        out.extend_from_slice(b"12:piece lengthi16384e");
        out.extend_from_slice(b"6:pieces20:");
        out.extend_from_slice(&[0xab; 20]);
        out.extend_from_slice(b"ee");
        out
    }

    fn slug(value: &str) -> String {
        value
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// 40 hex characters, stable per title.
    fn fake_info_hash(title: &str) -> String {
        let hash = title.bytes().fold(0xcbf2_9ce4_8422_2325_u128, |acc, b| {
            (acc ^ b as u128).wrapping_mul(0x0100_0000_0000_0000_0000_0000_013b)
        });
        format!("{:040x}", hash)
    }
}
