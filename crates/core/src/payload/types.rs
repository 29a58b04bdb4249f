use async_trait::async_trait;
use thiserror::Error;

use crate::searcher::CandidateRecord;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {0} fetching payload")]
    Http(u16),

    #[error("Redirect without a Location header")]
    MissingLocation,

    #[error("Provider returned an empty payload")]
    Empty,
}

impl From<reqwest::Error> for PayloadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PayloadError::Timeout
        } else {
            PayloadError::Request(e.to_string())
        }
    }
}

/// Result of resolving the winner's locator.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Bytes(Vec<u8>),
    /// The provider redirected to a different locator (a magnet URI);
    /// dispatch continues with the replacement candidate.
    Redirected {
        candidate: CandidateRecord,
        bytes: Vec<u8>,
    },
    /// The backend fetches the locator itself.
    AlreadyLocal,
}

impl FetchOutcome {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            FetchOutcome::Bytes(bytes) | FetchOutcome::Redirected { bytes, .. } => Some(bytes),
            FetchOutcome::AlreadyLocal => None,
        }
    }
}

#[async_trait]
pub trait PayloadResolver: Send + Sync {
    /// `backend_accepts_urls` says whether the backend that will receive the
    /// candidate can fetch plain torrent URLs on its own.
    async fn fetch(
        &self,
        candidate: &CandidateRecord,
        backend_accepts_urls: bool,
    ) -> Result<FetchOutcome, PayloadError>;
}
