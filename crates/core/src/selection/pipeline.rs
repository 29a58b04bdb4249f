//! One search attempt for one album: query, judge, rank, fetch, dispatch.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{ProviderPreference, SearchPreferences};
use crate::download::DownloadDispatcher;
use crate::library::{AlbumRequest, HistoryStore};
use crate::metrics;
use crate::payload::{FetchOutcome, PayloadResolver};
use crate::searcher::{
    CandidateRecord, DuplicateFilter, Provider, ProviderClass, QualityConstraints, RankingEngine,
    SearchTerm, SizeWindow, TermFlavor, TokenMatcher,
};

use super::{SearchMode, SearchOutcome};

/// Candidates from one provider class.
#[derive(Debug, Default)]
struct ClassResults {
    /// How many results providers returned before any filtering.
    raw: usize,
    survivors: Vec<CandidateRecord>,
}

impl ClassResults {
    fn extend(&mut self, other: ClassResults) {
        self.raw += other.raw;
        self.survivors.extend(other.survivors);
    }
}

pub struct SelectionPipeline {
    preferences: SearchPreferences,
    nzb_providers: Vec<Arc<dyn Provider>>,
    torrent_providers: Vec<Arc<dyn Provider>>,
    history: Arc<dyn HistoryStore>,
    resolver: Arc<dyn PayloadResolver>,
    dispatcher: Arc<DownloadDispatcher>,
    ranking: RankingEngine,
}

impl SelectionPipeline {
    /// Providers keep their configured order within each class.
    pub fn new(
        preferences: SearchPreferences,
        providers: Vec<Arc<dyn Provider>>,
        history: Arc<dyn HistoryStore>,
        resolver: Arc<dyn PayloadResolver>,
        dispatcher: Arc<DownloadDispatcher>,
    ) -> Self {
        let (nzb_providers, torrent_providers) = providers
            .into_iter()
            .partition(|p| p.class() == ProviderClass::Nzb);
        let ranking = RankingEngine::from_preferences(&preferences);

        Self {
            preferences,
            nzb_providers,
            torrent_providers,
            history,
            resolver,
            dispatcher,
            ranking,
        }
    }

    pub fn preferences(&self) -> &SearchPreferences {
        &self.preferences
    }

    pub fn dispatcher(&self) -> &Arc<DownloadDispatcher> {
        &self.dispatcher
    }

    pub fn provider_count(&self) -> usize {
        self.nzb_providers.len() + self.torrent_providers.len()
    }

    /// Classes worth querying: the ones with both providers and a backend.
    fn class_enabled(&self, class: ProviderClass) -> bool {
        match class {
            ProviderClass::Nzb => {
                !self.nzb_providers.is_empty() && self.dispatcher.has_nzb_backend()
            }
            ProviderClass::Torrent => {
                !self.torrent_providers.is_empty() && self.dispatcher.has_torrent_backend()
            }
        }
    }

    pub async fn search(&self, request: &AlbumRequest, mode: SearchMode) -> SearchOutcome {
        info!(
            album_id = %request.album_id,
            artist = %request.artist,
            album = %request.album_title,
            quality = request.quality.as_str(),
            ?mode,
            "Searching for album"
        );

        let outcome = match mode {
            SearchMode::Automatic => self.search_automatic(request).await,
            SearchMode::ChooseSpecific => self.search_choices(request).await,
        };

        metrics::SEARCHES_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
        outcome
    }

    async fn search_automatic(&self, request: &AlbumRequest) -> SearchOutcome {
        let (first, second) = match self.preferences.prefer {
            ProviderPreference::NzbFirst => (ProviderClass::Nzb, Some(ProviderClass::Torrent)),
            ProviderPreference::TorrentFirst => (ProviderClass::Torrent, Some(ProviderClass::Nzb)),
            ProviderPreference::Both => (ProviderClass::Nzb, None),
        };

        let results = match second {
            Some(fallback) => {
                let mut results = self.judged(first, request).await;
                if results.survivors.is_empty() {
                    debug!(class = ?first, "Nothing usable, trying the other provider class");
                    results.extend(self.judged(fallback, request).await);
                }
                results
            }
            None => {
                let (mut nzb, torrent) = tokio::join!(
                    self.judged(ProviderClass::Nzb, request),
                    self.judged(ProviderClass::Torrent, request)
                );
                nzb.extend(torrent);
                nzb
            }
        };

        if results.raw == 0 {
            info!(album_id = %request.album_id, "No results from any provider");
            return SearchOutcome::NothingFound;
        }

        let Some(ranked) = self.ranking.rank(results.survivors, request) else {
            info!(album_id = %request.album_id, "No suitable release found");
            return SearchOutcome::NoSuitableRelease;
        };

        // rank never returns an empty list
        let Some(winner) = ranked.into_iter().next() else {
            return SearchOutcome::NoSuitableRelease;
        };
        info!(
            title = %winner.title,
            provider = %winner.provider_id,
            size = winner.size,
            "Selected release"
        );

        self.fetch_and_dispatch(request, winner).await
    }

    async fn search_choices(&self, request: &AlbumRequest) -> SearchOutcome {
        let (nzb, torrent) = tokio::join!(
            self.token_matched(ProviderClass::Nzb, request),
            self.token_matched(ProviderClass::Torrent, request)
        );
        let mut results = nzb;
        results.extend(torrent);

        if results.raw == 0 {
            return SearchOutcome::NothingFound;
        }
        SearchOutcome::Choices(results.survivors)
    }

    /// Dispatch a candidate picked from an earlier `Choices` list.
    pub async fn snatch(
        &self,
        request: &AlbumRequest,
        mut candidate: CandidateRecord,
    ) -> SearchOutcome {
        candidate.assign_policy(true);
        let outcome = self.fetch_and_dispatch(request, candidate).await;
        metrics::SEARCHES_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
        outcome
    }

    async fn fetch_and_dispatch(
        &self,
        request: &AlbumRequest,
        candidate: CandidateRecord,
    ) -> SearchOutcome {
        let accepts_urls = self.dispatcher.accepts_urls(candidate.kind);
        let fetched = match self.resolver.fetch(&candidate, accepts_urls).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(title = %candidate.title, error = %e, "Could not fetch the release payload");
                return SearchOutcome::PayloadUnresolvable(e.to_string());
            }
        };

        let (candidate, payload) = match fetched {
            FetchOutcome::Bytes(bytes) => (candidate, Some(bytes)),
            FetchOutcome::Redirected { candidate, bytes } => (candidate, Some(bytes)),
            FetchOutcome::AlreadyLocal => (candidate, None),
        };

        match self
            .dispatcher
            .dispatch(request, &candidate, payload.as_deref())
            .await
        {
            Ok(outcome) => SearchOutcome::Snatched(outcome),
            Err(e) => SearchOutcome::NotSnatched(e.to_string()),
        }
    }

    /// Query one class and run every filter stage over its results.
    async fn judged(&self, class: ProviderClass, request: &AlbumRequest) -> ClassResults {
        let term = SearchTerm::build(request, flavor(class));
        let raw = self.query(class, request, &term).await;
        let total = raw.len();

        let matcher = self.matcher(request);
        let window = SizeWindow::compute(&self.preferences, request);
        let duplicates = DuplicateFilter::new(self.history.as_ref());

        let survivors = raw
            .into_iter()
            .filter_map(|mut candidate| {
                let lossless = request.is_lossless_request();
                let stage = if !matcher.matches(&candidate.title, &term, lossless) {
                    Some("token")
                } else if !window.admits(&candidate) {
                    Some("size")
                } else if !duplicates.admits(&candidate, request.is_new) {
                    Some("duplicate")
                } else {
                    None
                };

                candidate.assign_policy(stage.is_none());
                match stage {
                    Some(stage) => {
                        metrics::CANDIDATES_REJECTED.with_label_values(&[stage]).inc();
                        None
                    }
                    None => Some(candidate),
                }
            })
            .collect();

        ClassResults {
            raw: total,
            survivors,
        }
    }

    /// Query one class and keep only token matches.
    async fn token_matched(&self, class: ProviderClass, request: &AlbumRequest) -> ClassResults {
        let term = SearchTerm::build(request, flavor(class));
        let raw = self.query(class, request, &term).await;
        let total = raw.len();
        let matcher = self.matcher(request);

        let survivors = raw
            .into_iter()
            .filter(|c| {
                let keep = matcher.matches(&c.title, &term, request.is_lossless_request());
                if !keep {
                    metrics::CANDIDATES_REJECTED.with_label_values(&["token"]).inc();
                }
                keep
            })
            .collect();

        ClassResults {
            raw: total,
            survivors,
        }
    }

    fn matcher(&self, request: &AlbumRequest) -> TokenMatcher {
        TokenMatcher::new(
            request.quality,
            &self.preferences.ignored_words,
            &self.preferences.required_words,
            self.preferences.ignore_clean_releases,
        )
    }

    /// Results of every provider in `class`, concatenated in provider order.
    /// A failing provider contributes nothing.
    async fn query(
        &self,
        class: ProviderClass,
        request: &AlbumRequest,
        term: &SearchTerm,
    ) -> Vec<CandidateRecord> {
        if !self.class_enabled(class) {
            return Vec::new();
        }
        let providers = match class {
            ProviderClass::Nzb => &self.nzb_providers,
            ProviderClass::Torrent => &self.torrent_providers,
        };
        let constraints = QualityConstraints::for_tier(
            request.quality,
            self.preferences.allow_lossless,
            self.preferences.min_seeders,
        );

        debug!(
            class = ?class,
            term = %term.term,
            providers = providers.len(),
            "Querying providers"
        );

        let searches = providers.iter().map(|provider| {
            let constraints = &constraints;
            async move {
                let started = Instant::now();
                let result = provider.search(&term.term, constraints).await;
                metrics::PROVIDER_DURATION
                    .with_label_values(&[provider.id()])
                    .observe(started.elapsed().as_secs_f64());
                (provider.id(), result)
            }
        });

        join_all(searches)
            .await
            .into_iter()
            .flat_map(|(id, result)| match result {
                Ok(candidates) => {
                    debug!(provider = %id, count = candidates.len(), "Provider returned results");
                    candidates
                }
                Err(e) => {
                    warn!(provider = %id, error = %e, "Provider search failed");
                    metrics::PROVIDER_FAILURES.with_label_values(&[id]).inc();
                    Vec::new()
                }
            })
            .collect()
    }
}

fn flavor(class: ProviderClass) -> TermFlavor {
    match class {
        ProviderClass::Nzb => TermFlavor::Nzb,
        ProviderClass::Torrent => TermFlavor::Torrent,
    }
}
