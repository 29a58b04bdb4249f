//! Hands the selected candidate to the configured backend and records the snatch.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::DownloadConfig;
use crate::library::{AlbumRequest, AlbumStatus, HistoryStore, SnatchRecord, SnatchStatus};
use crate::metrics;
use crate::notify::{NotificationEvent, NotifyHandle};
use crate::searcher::{CandidateKind, CandidateRecord};

use super::{
    BackendRole, DispatchError, DownloadBackend, DownloadOutcome, PostSubmitPolicy, Submission,
};

pub struct DownloadDispatcher {
    nzb_backend: Option<Arc<dyn DownloadBackend>>,
    torrent_backend: Option<Arc<dyn DownloadBackend>>,
    history: Arc<dyn HistoryStore>,
    notify: Option<NotifyHandle>,
    /// Keyed by provider id. Providers without an entry get no ratio.
    seed_ratios: HashMap<String, f64>,
    label: Option<String>,
    move_path: Option<String>,
    add_paused: bool,
}

impl DownloadDispatcher {
    pub fn new(
        nzb_backend: Option<Arc<dyn DownloadBackend>>,
        torrent_backend: Option<Arc<dyn DownloadBackend>>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            nzb_backend,
            torrent_backend,
            history,
            notify: None,
            seed_ratios: HashMap::new(),
            label: None,
            move_path: None,
            add_paused: false,
        }
    }

    pub fn with_notifications(mut self, handle: NotifyHandle) -> Self {
        self.notify = Some(handle);
        self
    }

    pub fn with_seed_ratios(mut self, seed_ratios: HashMap<String, f64>) -> Self {
        self.seed_ratios = seed_ratios;
        self
    }

    /// Label, move path and pause-on-add from the download section.
    pub fn with_post_submit(mut self, config: &DownloadConfig) -> Self {
        self.label = config.label.clone();
        self.move_path = config.move_path.clone();
        self.add_paused = config.add_paused;
        self
    }

    pub fn backend_for(&self, kind: CandidateKind) -> Option<&Arc<dyn DownloadBackend>> {
        if kind.is_torrent_like() {
            self.torrent_backend.as_ref()
        } else {
            self.nzb_backend.as_ref()
        }
    }

    pub fn has_nzb_backend(&self) -> bool {
        self.nzb_backend.is_some()
    }

    pub fn has_torrent_backend(&self) -> bool {
        self.torrent_backend.is_some()
    }

    /// Whether the backend for `kind` fetches torrent URLs on its own.
    pub fn accepts_urls(&self, kind: CandidateKind) -> bool {
        self.backend_for(kind)
            .map(|b| b.accepts_urls())
            .unwrap_or(false)
    }

    pub fn seed_ratio_for(&self, provider_id: &str) -> Option<f64> {
        self.seed_ratios.get(provider_id).copied()
    }

    /// Submit, resolve the folder name, apply post-submit settings, persist
    /// and notify. Nothing is persisted unless the backend accepted the
    /// download and reported everything its role requires.
    pub async fn dispatch(
        &self,
        request: &AlbumRequest,
        candidate: &CandidateRecord,
        payload: Option<&[u8]>,
    ) -> Result<DownloadOutcome, DispatchError> {
        let backend = self.backend_for(candidate.kind).ok_or_else(|| {
            error!(kind = candidate.kind.as_str(), "No backend configured for candidate");
            DispatchError::NoBackend(if candidate.kind.is_torrent_like() {
                "torrent"
            } else {
                "nzb"
            })
        })?;

        match self.submit(backend.as_ref(), request, candidate, payload).await {
            Ok(outcome) => Ok(self.record(request, candidate, outcome).await),
            Err(e) => {
                error!(
                    backend = %backend.name(),
                    title = %candidate.title,
                    error = %e,
                    "Dispatch failed"
                );
                metrics::DISPATCH_FAILURES
                    .with_label_values(&[backend.name()])
                    .inc();
                Err(e)
            }
        }
    }

    async fn submit(
        &self,
        backend: &dyn DownloadBackend,
        request: &AlbumRequest,
        candidate: &CandidateRecord,
        payload: Option<&[u8]>,
    ) -> Result<DownloadOutcome, DispatchError> {
        let handle = backend
            .submit(Submission {
                request,
                candidate,
                payload,
            })
            .await?;

        let folder_name = backend
            .resolve_folder_name(&handle)
            .await?
            .ok_or(DispatchError::Unresolved("the folder name"))?;

        let torrent_id = if candidate.kind.is_torrent_like() {
            handle.id.clone()
        } else {
            None
        };
        if backend.role() == BackendRole::TorrentClient && torrent_id.is_none() {
            return Err(DispatchError::Unresolved("the torrent id"));
        }

        let seed_ratio = if candidate.kind.is_torrent_like() {
            self.seed_ratio_for(&candidate.provider_id)
        } else {
            None
        };
        let policy = PostSubmitPolicy {
            seed_ratio,
            label: self.label.clone(),
            move_path: self.move_path.clone(),
            pause: self.add_paused,
        };
        let failures = backend.apply_post_submit_policy(&handle, &policy).await;
        if failures > 0 {
            warn!(
                backend = %backend.name(),
                failures,
                "Some post-submit settings were not applied"
            );
        }

        Ok(DownloadOutcome {
            folder_name,
            client_torrent_id: torrent_id,
            effective_seed_ratio: seed_ratio,
            kind: candidate.kind,
            backend: backend.name().to_string(),
            persistence_warning: None,
        })
    }

    async fn record(
        &self,
        request: &AlbumRequest,
        candidate: &CandidateRecord,
        mut outcome: DownloadOutcome,
    ) -> DownloadOutcome {
        let seeding = outcome.effective_seed_ratio.is_some() && outcome.client_torrent_id.is_some();
        let status = if seeding {
            SnatchStatus::SeedSnatched
        } else {
            SnatchStatus::Snatched
        };

        let row = SnatchRecord {
            album_id: request.album_id.clone(),
            title: candidate.title.clone(),
            size: candidate.size,
            locator: candidate.locator.clone(),
            snatched_at: Utc::now(),
            status,
            folder_name: outcome.folder_name.clone(),
            kind: candidate.kind,
            torrent_id: outcome.client_torrent_id.clone(),
        };

        let inserted = self.history.insert_snatch(&row);
        let status_updated = self
            .history
            .update_album_status(&request.album_id, AlbumStatus::Snatched);
        if let Err(e) = inserted.and(status_updated) {
            warn!(album_id = %request.album_id, error = %e, "Snatch was not persisted");
            outcome.note_persistence_failure(&e);
        }

        info!(
            album_id = %request.album_id,
            title = %candidate.title,
            folder = %outcome.folder_name,
            backend = %outcome.backend,
            "Snatched release"
        );

        if let Some(notify) = &self.notify {
            notify
                .emit(NotificationEvent::Snatched {
                    artist: request.artist.clone(),
                    album: request.album_title.clone(),
                    provider: candidate.provider_id.clone(),
                    folder_name: outcome.folder_name.clone(),
                    kind: candidate.kind,
                })
                .await;
        }

        metrics::SNATCHES_TOTAL
            .with_label_values(&[candidate.kind.as_str(), outcome.backend.as_str()])
            .inc();

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{BackendError, BackendHandle};
    use crate::library::{AlbumStore, SqliteLibrary};
    use crate::testing::{fixtures, MockBackend, PolicyCall};
    use tokio::sync::mpsc;

    struct Setup {
        library: Arc<SqliteLibrary>,
        nzb: Arc<MockBackend>,
        torrent: Arc<MockBackend>,
    }

    fn setup() -> (Setup, DownloadDispatcher) {
        let library = Arc::new(SqliteLibrary::in_memory().unwrap());
        library
            .upsert_album(&fixtures::album_record("rg-1", "Foo", "Bar"))
            .unwrap();
        let nzb = Arc::new(MockBackend::new("sabnzbd", BackendRole::NzbClient));
        let torrent = Arc::new(MockBackend::new("qbittorrent", BackendRole::TorrentClient));

        let dispatcher = DownloadDispatcher::new(
            Some(nzb.clone() as Arc<dyn DownloadBackend>),
            Some(torrent.clone() as Arc<dyn DownloadBackend>),
            library.clone(),
        )
        .with_seed_ratios(HashMap::from([("Jackett_private".to_string(), 2.0)]));

        (
            Setup {
                library,
                nzb,
                torrent,
            },
            dispatcher,
        )
    }

    fn request() -> AlbumRequest {
        let mut request = fixtures::album_request("Foo", "Bar");
        request.album_id = "rg-1".to_string();
        request
    }

    #[tokio::test]
    async fn test_nzb_dispatch_persists_snatch() {
        let (s, dispatcher) = setup();
        s.nzb.set_handle(BackendHandle::named("Foo - Bar")).await;
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Nzb);

        let outcome = dispatcher
            .dispatch(&request(), &candidate, Some(b"<nzb/>"))
            .await
            .unwrap();

        assert_eq!(outcome.folder_name, "Foo - Bar");
        assert_eq!(outcome.client_torrent_id, None);
        assert_eq!(outcome.backend, "sabnzbd");
        assert!(outcome.persistence_warning.is_none());

        let rows = s.library.list_snatches(Some("rg-1"), 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, SnatchStatus::Snatched);
        assert_eq!(
            s.library.get_album("rg-1").unwrap().unwrap().status,
            AlbumStatus::Snatched
        );
        assert_eq!(s.nzb.submissions().await[0].payload.as_deref(), Some(&b"<nzb/>"[..]));
    }

    #[tokio::test]
    async fn test_seed_ratio_marks_seed_snatched() {
        let (s, dispatcher) = setup();
        s.torrent
            .set_handle(BackendHandle {
                id: Some("abc".to_string()),
                name: None,
            })
            .await;
        s.torrent.set_folder_name(Some("Foo.Bar.FLAC")).await;

        let mut candidate = fixtures::candidate("Foo - Bar FLAC", 100, CandidateKind::Magnet);
        candidate.provider_id = "Jackett_private".to_string();

        let outcome = dispatcher.dispatch(&request(), &candidate, None).await.unwrap();
        assert_eq!(outcome.effective_seed_ratio, Some(2.0));
        assert_eq!(outcome.client_torrent_id.as_deref(), Some("abc"));
        assert_eq!(s.torrent.policy_calls().await, vec![PolicyCall::SeedRatio(2.0)]);

        let rows = s.library.list_snatches(Some("rg-1"), 10).unwrap();
        assert_eq!(rows[0].status, SnatchStatus::SeedSnatched);
        assert_eq!(rows[0].torrent_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_unknown_provider_gets_no_ratio() {
        let (s, dispatcher) = setup();
        s.torrent
            .set_handle(BackendHandle {
                id: Some("abc".to_string()),
                name: Some("Foo - Bar".to_string()),
            })
            .await;
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Torrent);

        let outcome = dispatcher.dispatch(&request(), &candidate, None).await.unwrap();
        assert_eq!(outcome.effective_seed_ratio, None);
        assert!(s.torrent.policy_calls().await.is_empty());
        assert_eq!(
            s.library.list_snatches(None, 10).unwrap()[0].status,
            SnatchStatus::Snatched
        );
    }

    #[tokio::test]
    async fn test_missing_torrent_id_writes_nothing() {
        let (s, dispatcher) = setup();
        s.torrent.set_handle(BackendHandle::named("Foo - Bar")).await;
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Torrent);

        let err = dispatcher
            .dispatch(&request(), &candidate, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unresolved(_)));
        assert!(s.library.list_snatches(None, 10).unwrap().is_empty());
        assert_eq!(
            s.library.get_album("rg-1").unwrap().unwrap().status,
            AlbumStatus::Wanted
        );
    }

    #[tokio::test]
    async fn test_unresolved_folder_name_fails() {
        let (s, dispatcher) = setup();
        s.torrent
            .set_handle(BackendHandle {
                id: Some("abc".to_string()),
                name: None,
            })
            .await;
        s.torrent.set_folder_name(None).await;
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Magnet);

        let err = dispatcher
            .dispatch(&request(), &candidate, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unresolved(_)));
        assert!(s.library.list_snatches(None, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_rejection_propagates() {
        let (s, dispatcher) = setup();
        s.nzb
            .set_next_error(BackendError::ConnectionFailed("refused".to_string()))
            .await;
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Nzb);

        let err = dispatcher
            .dispatch(&request(), &candidate, Some(b"<nzb/>"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Backend(BackendError::ConnectionFailed(_))));
        assert!(s.library.list_snatches(None, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_backend_is_reported() {
        let library = Arc::new(SqliteLibrary::in_memory().unwrap());
        let dispatcher = DownloadDispatcher::new(None, None, library);
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Torrent);

        let err = dispatcher
            .dispatch(&request(), &candidate, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoBackend("torrent")));
        assert!(!dispatcher.accepts_urls(CandidateKind::Torrent));
    }

    #[tokio::test]
    async fn test_post_submit_failures_are_not_fatal() {
        let (s, dispatcher) = setup();
        let dispatcher = dispatcher.with_post_submit(&DownloadConfig {
            label: Some("music".to_string()),
            move_path: Some("/done".to_string()),
            add_paused: true,
            ..Default::default()
        });
        s.torrent
            .set_handle(BackendHandle {
                id: Some("abc".to_string()),
                name: Some("Foo - Bar".to_string()),
            })
            .await;
        s.torrent.set_policy_failure(true).await;
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Torrent);

        let outcome = dispatcher.dispatch(&request(), &candidate, None).await.unwrap();
        assert_eq!(outcome.folder_name, "Foo - Bar");
        assert_eq!(s.torrent.policy_calls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_a_warning() {
        let (s, _) = setup();
        s.nzb.set_handle(BackendHandle::named("Foo - Bar")).await;
        let dispatcher = DownloadDispatcher::new(
            Some(s.nzb.clone() as Arc<dyn DownloadBackend>),
            None,
            Arc::new(SqliteLibrary::in_memory().unwrap()),
        );
        // album row absent, so the status update fails
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Nzb);

        let outcome = dispatcher
            .dispatch(&request(), &candidate, Some(b"<nzb/>"))
            .await
            .unwrap();
        assert!(outcome
            .persistence_warning
            .as_deref()
            .unwrap()
            .contains("rg-1"));
    }

    #[tokio::test]
    async fn test_snatch_notification_emitted() {
        let (s, dispatcher) = setup();
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = dispatcher.with_notifications(NotifyHandle::new(tx));
        s.nzb.set_handle(BackendHandle::named("Foo - Bar")).await;
        let candidate = fixtures::candidate("Foo - Bar", 100, CandidateKind::Nzb);

        dispatcher
            .dispatch(&request(), &candidate, Some(b"<nzb/>"))
            .await
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(
            envelope.event,
            NotificationEvent::Snatched { ref folder_name, .. } if folder_name == "Foo - Bar"
        ));
    }
}
