//! Library storage traits.

use thiserror::Error;

use super::{AlbumRecord, AlbumStatus, SnatchRecord};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Album not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Filter for listing albums.
#[derive(Debug, Clone)]
pub struct AlbumFilter {
    /// Only albums with one of these statuses. Empty means any.
    pub statuses: Vec<AlbumStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AlbumFilter {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            limit: 100,
            offset: 0,
        }
    }
}

impl AlbumFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wanted() -> Self {
        Self {
            statuses: vec![AlbumStatus::Wanted, AlbumStatus::WantedLossless],
            limit: i64::MAX,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: AlbumStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Albums the user tracks.
pub trait AlbumStore: Send + Sync {
    /// Insert or replace an album.
    fn upsert_album(&self, album: &AlbumRecord) -> Result<(), LibraryError>;

    fn get_album(&self, album_id: &str) -> Result<Option<AlbumRecord>, LibraryError>;

    fn list_albums(&self, filter: &AlbumFilter) -> Result<Vec<AlbumRecord>, LibraryError>;

    /// Albums in `Wanted` or `Wanted Lossless`.
    fn wanted_albums(&self) -> Result<Vec<AlbumRecord>, LibraryError> {
        self.list_albums(&AlbumFilter::wanted())
    }
}

/// Persisted snatch history.
///
/// Inserts are serialized; `has_locator` reads need not be.
pub trait HistoryStore: Send + Sync {
    /// Persist one snatch row in its own transaction.
    fn insert_snatch(&self, record: &SnatchRecord) -> Result<(), LibraryError>;

    /// Whether any snatch row has exactly this locator.
    fn has_locator(&self, locator: &str) -> Result<bool, LibraryError>;

    fn update_album_status(&self, album_id: &str, status: AlbumStatus)
        -> Result<(), LibraryError>;

    /// Most recent first.
    fn list_snatches(
        &self,
        album_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SnatchRecord>, LibraryError>;
}
