//! The automatic pass over every still-wanted album.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::library::{AlbumRequest, AlbumStore, LibraryError, QualityTier};

use super::{SearchMode, SearchOutcome, SelectionPipeline};

/// What happened to one album during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WantedResult {
    Skipped { reason: String },
    Searched { outcome: SearchOutcome },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WantedReport {
    pub album_id: String,
    pub artist: String,
    pub album: String,
    #[serde(flatten)]
    pub result: WantedResult,
}

pub struct WantedSearch {
    albums: Arc<dyn AlbumStore>,
    pipeline: Arc<SelectionPipeline>,
    default_tier: QualityTier,
    wait_until_release_date: bool,
}

impl WantedSearch {
    pub fn new(albums: Arc<dyn AlbumStore>, pipeline: Arc<SelectionPipeline>) -> Self {
        let prefs = pipeline.preferences();
        Self {
            default_tier: prefs.quality,
            wait_until_release_date: prefs.wait_until_release_date,
            albums,
            pipeline,
        }
    }

    pub async fn run_once(&self) -> Result<Vec<WantedReport>, LibraryError> {
        self.run_once_at(Local::now().date_naive()).await
    }

    /// One pass, treating `today` as the current date for the release gate.
    pub async fn run_once_at(&self, today: NaiveDate) -> Result<Vec<WantedReport>, LibraryError> {
        let wanted = self.albums.wanted_albums()?;
        info!(count = wanted.len(), "Searching wanted albums");

        let mut reports = Vec::with_capacity(wanted.len());
        for record in &wanted {
            let request = AlbumRequest::from_record(record, self.default_tier, true);

            let result = match self.skip_reason(&request, today) {
                Some(reason) => {
                    debug!(album_id = %request.album_id, reason = %reason, "Skipping album");
                    WantedResult::Skipped { reason }
                }
                None => WantedResult::Searched {
                    outcome: self.pipeline.search(&request, SearchMode::Automatic).await,
                },
            };

            reports.push(WantedReport {
                album_id: request.album_id,
                artist: request.artist,
                album: request.album_title,
                result,
            });
        }

        let snatched = reports
            .iter()
            .filter(|r| {
                matches!(&r.result, WantedResult::Searched { outcome } if outcome.is_snatched())
            })
            .count();
        info!(albums = reports.len(), snatched, "Wanted search finished");
        Ok(reports)
    }

    fn skip_reason(&self, request: &AlbumRequest, today: NaiveDate) -> Option<String> {
        if request.artist.trim().is_empty() || request.album_title.trim().is_empty() {
            return Some("missing artist or album title".to_string());
        }
        if self.wait_until_release_date {
            // unparseable dates are searched anyway
            if let Some(release) = request.parsed_release_date() {
                if release > today {
                    return Some(format!("not released until {}", release));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchPreferences;
    use crate::download::{BackendHandle, BackendRole, DownloadBackend, DownloadDispatcher};
    use crate::library::{AlbumStatus, SqliteLibrary};
    use crate::searcher::{CandidateKind, ProviderClass};
    use crate::testing::{fixtures, MockBackend, MockPayloadResolver, MockProvider};

    struct Harness {
        library: Arc<SqliteLibrary>,
        provider: MockProvider,
        backend: Arc<MockBackend>,
    }

    fn harness(wait_until_release_date: bool) -> (Harness, WantedSearch) {
        let library = Arc::new(SqliteLibrary::in_memory().unwrap());
        let provider = MockProvider::new("nzb-indexer", ProviderClass::Nzb);
        let backend = Arc::new(MockBackend::new("sabnzbd", BackendRole::NzbClient));
        let dispatcher = DownloadDispatcher::new(
            Some(backend.clone() as Arc<dyn DownloadBackend>),
            None,
            library.clone(),
        );
        let prefs = SearchPreferences {
            quality: QualityTier::HighestIncludingLossless,
            wait_until_release_date,
            ..Default::default()
        };
        let pipeline = Arc::new(SelectionPipeline::new(
            prefs,
            vec![Arc::new(provider.clone())],
            library.clone(),
            Arc::new(MockPayloadResolver::new()),
            Arc::new(dispatcher),
        ));
        let search = WantedSearch::new(library.clone(), pipeline);
        (
            Harness {
                library,
                provider,
                backend,
            },
            search,
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_wanted_album_is_snatched() {
        let (h, search) = harness(false);
        h.library
            .upsert_album(&fixtures::album_record("rg-1", "Foo", "Bar"))
            .unwrap();
        h.backend.set_handle(BackendHandle::named("Foo - Bar 2010")).await;
        h.provider
            .set_results(vec![fixtures::candidate("Foo - Bar 2010", 100, CandidateKind::Nzb)])
            .await;

        let reports = search.run_once_at(today()).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert!(matches!(
            &reports[0].result,
            WantedResult::Searched { outcome } if outcome.is_snatched()
        ));
        assert_eq!(
            h.library.get_album("rg-1").unwrap().unwrap().status,
            AlbumStatus::Snatched
        );

        // no longer wanted
        assert!(search.run_once_at(today()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreleased_album_waits() {
        let (h, search) = harness(true);
        let mut record = fixtures::album_record("rg-2", "Foo", "Future");
        record.release_date = Some("2030-05".to_string());
        h.library.upsert_album(&record).unwrap();
        let mut undated = fixtures::album_record("rg-3", "Foo", "Undated");
        undated.release_date = Some("someday".to_string());
        h.library.upsert_album(&undated).unwrap();

        let reports = search.run_once_at(today()).await.unwrap();
        let future = reports.iter().find(|r| r.album_id == "rg-2").unwrap();
        assert!(matches!(
            &future.result,
            WantedResult::Skipped { reason } if reason.contains("2030-05-01")
        ));
        let undated = reports.iter().find(|r| r.album_id == "rg-3").unwrap();
        assert!(matches!(
            &undated.result,
            WantedResult::Searched { outcome: SearchOutcome::NothingFound }
        ));
        assert_eq!(h.provider.searches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_album_without_artist_is_skipped() {
        let (h, search) = harness(false);
        h.library
            .upsert_album(&fixtures::album_record("rg-4", "", "Bar"))
            .unwrap();

        let reports = search.run_once_at(today()).await.unwrap();
        assert!(matches!(&reports[0].result, WantedResult::Skipped { .. }));
        assert!(h.provider.searches().await.is_empty());
    }

    #[tokio::test]
    async fn test_report_serialization() {
        let report = WantedReport {
            album_id: "rg-1".to_string(),
            artist: "Foo".to_string(),
            album: "Bar".to_string(),
            result: WantedResult::Searched {
                outcome: SearchOutcome::NoSuitableRelease,
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["result"], "searched");
        assert_eq!(json["outcome"]["outcome"], "no_suitable_release");
    }
}
