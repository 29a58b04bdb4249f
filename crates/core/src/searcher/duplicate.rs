//! Suppression of results that were already snatched.

use tracing::{debug, warn};

use crate::library::HistoryStore;

use super::CandidateRecord;

/// Consults snatch history for an exact locator match.
pub struct DuplicateFilter<'a> {
    history: &'a dyn HistoryStore,
}

impl<'a> DuplicateFilter<'a> {
    pub fn new(history: &'a dyn HistoryStore) -> Self {
        Self { history }
    }

    /// A history read failure counts as "not a duplicate".
    pub fn is_duplicate(&self, locator: &str) -> bool {
        match self.history.has_locator(locator) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Snatch history lookup failed");
                false
            }
        }
    }

    /// Whether `candidate` may proceed. Manual searches (`is_new == false`)
    /// never touch history.
    pub fn admits(&self, candidate: &CandidateRecord, is_new: bool) -> bool {
        if !is_new {
            return true;
        }
        if self.is_duplicate(&candidate.locator) {
            debug!(
                title = %candidate.title,
                provider = %candidate.provider_id,
                "Rejected: already downloaded"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{LibraryError, SnatchRecord, SqliteLibrary};
    use crate::library::{AlbumStatus, SnatchStatus};
    use crate::searcher::CandidateKind;
    use chrono::Utc;

    struct BrokenHistory;

    impl HistoryStore for BrokenHistory {
        fn insert_snatch(&self, _: &SnatchRecord) -> Result<(), LibraryError> {
            Err(LibraryError::Database("down".to_string()))
        }
        fn has_locator(&self, _: &str) -> Result<bool, LibraryError> {
            Err(LibraryError::Database("down".to_string()))
        }
        fn update_album_status(&self, _: &str, _: AlbumStatus) -> Result<(), LibraryError> {
            Err(LibraryError::Database("down".to_string()))
        }
        fn list_snatches(
            &self,
            _: Option<&str>,
            _: i64,
        ) -> Result<Vec<SnatchRecord>, LibraryError> {
            Err(LibraryError::Database("down".to_string()))
        }
    }

    fn snatch(locator: &str) -> SnatchRecord {
        SnatchRecord {
            album_id: "a1".to_string(),
            title: "Foo - Bar".to_string(),
            size: 100,
            locator: locator.to_string(),
            snatched_at: Utc::now(),
            status: SnatchStatus::Snatched,
            folder_name: "Foo - Bar".to_string(),
            kind: CandidateKind::Nzb,
            torrent_id: None,
        }
    }

    #[test]
    fn test_duplicate_only_for_new_requests() {
        let library = SqliteLibrary::in_memory().unwrap();
        library.insert_snatch(&snatch("http://idx/get/1")).unwrap();

        let filter = DuplicateFilter::new(&library);
        let seen =
            CandidateRecord::new("Foo - Bar", 100, "http://idx/get/1", "p", CandidateKind::Nzb);
        let fresh =
            CandidateRecord::new("Foo - Bar", 100, "http://idx/get/2", "p", CandidateKind::Nzb);

        assert!(!filter.admits(&seen, true));
        assert!(filter.admits(&seen, false));
        assert!(filter.admits(&fresh, true));
    }

    #[test]
    fn test_store_failure_is_not_duplicate() {
        let broken = BrokenHistory;
        let filter = DuplicateFilter::new(&broken);
        assert!(!filter.is_duplicate("http://idx/get/1"));
    }
}
