//! Mock search provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::searcher::{
    CandidateRecord, Provider, ProviderClass, QualityConstraints, SearchError,
};

/// A search as the provider received it.
#[derive(Debug, Clone)]
pub struct RecordedProviderSearch {
    pub term: String,
    pub constraints: QualityConstraints,
}

/// Mock implementation of the Provider trait.
///
/// Clones share state, so a test can keep one handle while the pipeline
/// owns another.
///
/// ```rust,ignore
/// let provider = MockProvider::new("nzb-indexer", ProviderClass::Nzb);
/// provider.set_results(vec![fixtures::candidate("Foo - Bar", 100, CandidateKind::Nzb)]).await;
/// // ...run a search...
/// assert_eq!(provider.searches().await, vec!["Foo Bar".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    id: String,
    class: ProviderClass,
    results: Arc<RwLock<Vec<CandidateRecord>>>,
    recorded: Arc<RwLock<Vec<RecordedProviderSearch>>>,
    /// If set, the next search fails with this error.
    next_error: Arc<RwLock<Option<SearchError>>>,
    /// Apply the constraints' caps like real adapters do.
    apply_constraints: bool,
}

impl MockProvider {
    pub fn new(id: &str, class: ProviderClass) -> Self {
        Self {
            id: id.to_string(),
            class,
            results: Arc::new(RwLock::new(Vec::new())),
            recorded: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            apply_constraints: true,
        }
    }

    /// Return results verbatim, ignoring size and seeder caps.
    pub fn without_constraints(mut self) -> Self {
        self.apply_constraints = false;
        self
    }

    /// Set the results returned by every subsequent search.
    pub async fn set_results(&self, results: Vec<CandidateRecord>) {
        *self.results.write().await = results;
    }

    /// Configure the next search to fail with the given error.
    pub async fn set_next_error(&self, error: SearchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Terms searched so far, in order.
    pub async fn searches(&self) -> Vec<String> {
        self.recorded
            .read()
            .await
            .iter()
            .map(|s| s.term.clone())
            .collect()
    }

    pub async fn recorded_searches(&self) -> Vec<RecordedProviderSearch> {
        self.recorded.read().await.clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn class(&self) -> ProviderClass {
        self.class
    }

    async fn search(
        &self,
        term: &str,
        constraints: &QualityConstraints,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.recorded.write().await.push(RecordedProviderSearch {
            term: term.to_string(),
            constraints: constraints.clone(),
        });

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let results = self.results.read().await.clone();
        if !self.apply_constraints {
            return Ok(results);
        }
        Ok(results
            .into_iter()
            .filter(|c| constraints.admits(c))
            .collect())
    }
}
