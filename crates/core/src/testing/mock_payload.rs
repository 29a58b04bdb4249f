//! Mock payload resolver for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::payload::{FetchOutcome, PayloadError, PayloadResolver};
use crate::searcher::CandidateRecord;

/// Mock implementation of the PayloadResolver trait.
///
/// Queued outcomes are returned first. After that, torrent URLs headed for a
/// URL-capable backend resolve to `AlreadyLocal` and everything else to
/// `payload:<locator>` bytes.
#[derive(Debug, Clone, Default)]
pub struct MockPayloadResolver {
    queued: Arc<RwLock<VecDeque<FetchOutcome>>>,
    next_error: Arc<RwLock<Option<PayloadError>>>,
    /// Locators fetched so far, with the `accepts_urls` flag they came with.
    fetches: Arc<RwLock<Vec<(String, bool)>>>,
}

impl MockPayloadResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_outcome(&self, outcome: FetchOutcome) {
        self.queued.write().await.push_back(outcome);
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: PayloadError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn fetches(&self) -> Vec<(String, bool)> {
        self.fetches.read().await.clone()
    }
}

#[async_trait]
impl PayloadResolver for MockPayloadResolver {
    async fn fetch(
        &self,
        candidate: &CandidateRecord,
        backend_accepts_urls: bool,
    ) -> Result<FetchOutcome, PayloadError> {
        self.fetches
            .write()
            .await
            .push((candidate.locator.clone(), backend_accepts_urls));

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(outcome) = self.queued.write().await.pop_front() {
            return Ok(outcome);
        }

        if backend_accepts_urls && !candidate.is_magnet_locator() && !candidate.requires_payload {
            return Ok(FetchOutcome::AlreadyLocal);
        }
        Ok(FetchOutcome::Bytes(
            format!("payload:{}", candidate.locator).into_bytes(),
        ))
    }
}
