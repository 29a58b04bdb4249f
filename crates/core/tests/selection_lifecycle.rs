//! Selection lifecycle integration tests.
//!
//! These run a wanted album through the whole flow:
//! provider results -> filtering -> ranking -> payload -> blackhole -> history

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use encore_core::{
    config::{MagnetPolicy, ProviderPreference},
    download::{BlackholeBackend, DownloadBackend, DownloadDispatcher},
    library::{AlbumStatus, QualityTier, SnatchStatus},
    notify::{create_notification_system, NotificationEvent, Notifier},
    searcher::{CandidateKind, ProviderClass},
    selection::{SearchMode, SearchOutcome, WantedResult},
    testing::{fixtures, MockNotifier, MockPayloadResolver, MockProvider},
    AlbumStore, HistoryStore, HttpPayloadResolver, PayloadResolver, SearchPreferences,
    SelectionPipeline, SqliteLibrary, WantedSearch,
};

struct TestHarness {
    library: Arc<SqliteLibrary>,
    nzb_provider: MockProvider,
    torrent_provider: MockProvider,
    notifier: MockNotifier,
    nzb_dir: TempDir,
    torrent_dir: TempDir,
    _db_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let db_dir = TempDir::new().expect("Failed to create temp dir");
        let library = Arc::new(
            SqliteLibrary::new(&db_dir.path().join("encore.db")).expect("Failed to open library"),
        );
        library
            .upsert_album(&fixtures::album_record("rg-1", "Foo", "Bar"))
            .unwrap();

        Self {
            library,
            nzb_provider: MockProvider::new("nzbgeek", ProviderClass::Nzb),
            torrent_provider: MockProvider::new("Jackett_public", ProviderClass::Torrent),
            notifier: MockNotifier::new("mock"),
            nzb_dir: TempDir::new().unwrap(),
            torrent_dir: TempDir::new().unwrap(),
            _db_dir: db_dir,
        }
    }

    fn pipeline(
        &self,
        prefer: ProviderPreference,
        resolver: Arc<dyn PayloadResolver>,
    ) -> Arc<SelectionPipeline> {
        let nzb: Arc<dyn DownloadBackend> = Arc::new(BlackholeBackend::nzb(self.nzb_dir.path()));
        let torrent: Arc<dyn DownloadBackend> = Arc::new(
            BlackholeBackend::torrent(self.torrent_dir.path(), MagnetPolicy::Embed, Vec::new(), 5)
                .unwrap(),
        );

        let (notify, worker) = create_notification_system(
            vec![Arc::new(self.notifier.clone()) as Arc<dyn Notifier>],
            8,
        );
        tokio::spawn(worker.run());

        let dispatcher =
            DownloadDispatcher::new(Some(nzb), Some(torrent), self.library.clone())
                .with_notifications(notify);

        let prefs = SearchPreferences {
            quality: QualityTier::HighestIncludingLossless,
            prefer,
            ..Default::default()
        };
        Arc::new(SelectionPipeline::new(
            prefs,
            vec![
                Arc::new(self.nzb_provider.clone()),
                Arc::new(self.torrent_provider.clone()),
            ],
            self.library.clone(),
            resolver,
            Arc::new(dispatcher),
        ))
    }

    async fn wait_for_notifications(&self, count: usize) -> Vec<NotificationEvent> {
        for _ in 0..50 {
            let delivered = self.notifier.delivered().await;
            if delivered.len() >= count {
                return delivered;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.notifier.delivered().await
    }
}

#[tokio::test]
async fn test_wanted_album_snatched_through_nzb_blackhole() {
    let h = TestHarness::new();
    h.nzb_provider
        .set_results(vec![
            fixtures::candidate("Foo - Bar 2010 (Remix)", 300, CandidateKind::Nzb),
            fixtures::candidate("Foo - Bar 2010 [MP3]", 120, CandidateKind::Nzb),
            fixtures::candidate("Foo - Bar 2010 [FLAC]", 250, CandidateKind::Nzb),
        ])
        .await;

    let pipeline = h.pipeline(
        ProviderPreference::NzbFirst,
        Arc::new(MockPayloadResolver::new()),
    );
    let search = WantedSearch::new(h.library.clone(), pipeline);

    let reports = search.run_once().await.unwrap();
    assert_eq!(reports.len(), 1);
    let WantedResult::Searched {
        outcome: SearchOutcome::Snatched(outcome),
    } = &reports[0].result
    else {
        panic!("unexpected report: {:?}", reports[0]);
    };
    assert_eq!(outcome.folder_name, "Foo - Bar 2010 [FLAC]");
    assert_eq!(outcome.backend, "nzb_blackhole");

    let written = std::fs::read(h.nzb_dir.path().join("Foo - Bar 2010 [FLAC].nzb")).unwrap();
    assert!(written.starts_with(b"payload:http://mock-indexer/nzb/"));

    let rows = h.library.list_snatches(Some("rg-1"), 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, SnatchStatus::Snatched);
    assert_eq!(
        h.library.get_album("rg-1").unwrap().unwrap().status,
        AlbumStatus::Snatched
    );

    // torrents were never needed
    assert!(h.torrent_provider.searches().await.is_empty());

    let events = h.wait_for_notifications(1).await;
    assert!(matches!(
        &events[0],
        NotificationEvent::Snatched { provider, .. } if provider == "mock-indexer"
    ));
}

#[tokio::test]
async fn test_magnet_embedded_into_torrent_blackhole() {
    let h = TestHarness::new();
    h.torrent_provider
        .set_results(vec![fixtures::candidate(
            "Foo - Bar 2010 FLAC",
            400,
            CandidateKind::Magnet,
        )])
        .await;

    let resolver = Arc::new(HttpPayloadResolver::new(&Default::default(), 5).unwrap());
    let pipeline = h.pipeline(ProviderPreference::TorrentFirst, resolver);
    let request = encore_core::AlbumRequest::from_record(
        &h.library.get_album("rg-1").unwrap().unwrap(),
        QualityTier::HighestIncludingLossless,
        true,
    );

    let outcome = pipeline.search(&request, SearchMode::Automatic).await;
    let SearchOutcome::Snatched(outcome) = outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert_eq!(outcome.folder_name, "Foo - Bar 2010 FLAC");
    assert!(outcome.client_torrent_id.is_none());

    let written = std::fs::read(h.torrent_dir.path().join("Foo - Bar [2010].torrent")).unwrap();
    assert!(written.starts_with(b"d10:magnet-uri"));

    let rows = h.library.list_snatches(None, 10).unwrap();
    assert_eq!(rows[0].kind, CandidateKind::Magnet);
    assert!(rows[0].torrent_id.is_none());
}

#[tokio::test]
async fn test_already_snatched_release_is_not_repeated() {
    let h = TestHarness::new();
    h.nzb_provider
        .set_results(vec![fixtures::candidate("Foo - Bar 2010", 200, CandidateKind::Nzb)])
        .await;
    let pipeline = h.pipeline(
        ProviderPreference::NzbFirst,
        Arc::new(MockPayloadResolver::new()),
    );
    let search = WantedSearch::new(h.library.clone(), pipeline.clone());

    let first = search.run_once().await.unwrap();
    assert!(matches!(
        &first[0].result,
        WantedResult::Searched { outcome } if outcome.is_snatched()
    ));

    // the download failed downstream and the user marks the album wanted again
    let mut record = h.library.get_album("rg-1").unwrap().unwrap();
    record.status = AlbumStatus::Wanted;
    h.library.upsert_album(&record).unwrap();

    let second = search.run_once().await.unwrap();
    assert!(matches!(
        &second[0].result,
        WantedResult::Searched { outcome: SearchOutcome::NoSuitableRelease }
    ));

    // a manual search still offers it
    let request = encore_core::AlbumRequest::from_record(&record, QualityTier::default(), false);
    match pipeline.search(&request, SearchMode::ChooseSpecific).await {
        SearchOutcome::Choices(list) => assert_eq!(list.len(), 1),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(h.library.list_snatches(None, 10).unwrap().len(), 1);
}
