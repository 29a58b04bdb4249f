//! Types shared by providers and the filtering/ranking stages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::QualityTier;

/// Errors a provider can report. The pipeline logs them and moves on.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::ConnectionFailed(e.to_string())
        } else {
            SearchError::ApiError(e.to_string())
        }
    }
}

/// What a locator points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Nzb,
    Torrent,
    Magnet,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::Nzb => "nzb",
            CandidateKind::Torrent => "torrent",
            CandidateKind::Magnet => "magnet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nzb" => Some(CandidateKind::Nzb),
            "torrent" => Some(CandidateKind::Torrent),
            "magnet" => Some(CandidateKind::Magnet),
            _ => None,
        }
    }

    /// Torrents and magnets go to the torrent backend.
    pub fn is_torrent_like(&self) -> bool {
        !matches!(self, CandidateKind::Nzb)
    }
}

/// A provider result normalized into one shape.
///
/// Immutable after creation except for the policy verdict, which the
/// filtering stage assigns exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    pub size: u64,
    /// URL or magnet URI.
    pub locator: String,
    pub provider_id: String,
    pub kind: CandidateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    /// The uploader-supplied payload must be fetched and handed over as bytes.
    #[serde(default)]
    pub requires_payload: bool,
    #[serde(default)]
    matches_policy: Option<bool>,
}

impl CandidateRecord {
    pub fn new(
        title: impl Into<String>,
        size: u64,
        locator: impl Into<String>,
        provider_id: impl Into<String>,
        kind: CandidateKind,
    ) -> Self {
        Self {
            title: title.into(),
            size,
            locator: locator.into(),
            provider_id: provider_id.into(),
            kind,
            seeders: None,
            requires_payload: false,
            matches_policy: None,
        }
    }

    pub fn with_seeders(mut self, seeders: u32) -> Self {
        self.seeders = Some(seeders);
        self
    }

    pub fn with_requires_payload(mut self, requires: bool) -> Self {
        self.requires_payload = requires;
        self
    }

    /// True once the filtering stage has accepted this candidate.
    pub fn matches_policy(&self) -> bool {
        self.matches_policy.unwrap_or(false)
    }

    pub fn policy_assigned(&self) -> bool {
        self.matches_policy.is_some()
    }

    /// Record the filtering verdict. A second assignment is ignored and
    /// reported by returning `false`.
    pub fn assign_policy(&mut self, matches: bool) -> bool {
        if self.matches_policy.is_some() {
            return false;
        }
        self.matches_policy = Some(matches);
        true
    }

    pub fn is_magnet_locator(&self) -> bool {
        self.locator.to_lowercase().starts_with("magnet:")
    }

    /// Heuristic used by the lossless pool split and the lossy-tier guard.
    pub fn looks_lossless(&self) -> bool {
        self.title.to_lowercase().contains("flac")
    }
}

/// Which family of providers an adapter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderClass {
    Nzb,
    Torrent,
}

/// Caps applied at the provider boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityConstraints {
    /// Newznab/Torznab category ids.
    pub categories: Vec<u32>,
    pub max_size: u64,
    pub min_seeders: u32,
}

const LOSSLESS_MAX_SIZE: u64 = 10_000_000_000;
const LOSSY_MAX_SIZE: u64 = 300_000_000;
const CATEGORY_LOSSLESS: u32 = 3040;
const CATEGORY_MP3: u32 = 3010;

impl QualityConstraints {
    /// `lossless_fallback` widens a preferred-bitrate search to lossless releases.
    pub fn for_tier(tier: QualityTier, lossless_fallback: bool, min_seeders: u32) -> Self {
        let both = (vec![CATEGORY_LOSSLESS, CATEGORY_MP3], LOSSLESS_MAX_SIZE);
        let (categories, max_size) = match tier {
            QualityTier::LosslessOnly => (vec![CATEGORY_LOSSLESS], LOSSLESS_MAX_SIZE),
            QualityTier::HighestIncludingLossless => both,
            QualityTier::PreferredBitrate if lossless_fallback => both,
            QualityTier::PreferredBitrate | QualityTier::HighestExcludingLossless => {
                (vec![CATEGORY_MP3], LOSSY_MAX_SIZE)
            }
        };
        Self {
            categories,
            max_size,
            min_seeders,
        }
    }

    /// Whether a candidate passes the caps. Unknown seeders pass.
    pub fn admits(&self, candidate: &CandidateRecord) -> bool {
        if candidate.size > self.max_size {
            return false;
        }
        match candidate.seeders {
            Some(seeders) => seeders >= self.min_seeders,
            None => true,
        }
    }
}

/// A search provider: a black-box producer of candidates.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider id for logs, history and seed-ratio lookup.
    fn id(&self) -> &str;

    fn class(&self) -> ProviderClass;

    /// Search for `term`, with the provider's caps already applied to the result.
    async fn search(
        &self,
        term: &str,
        constraints: &QualityConstraints,
    ) -> Result<Vec<CandidateRecord>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_assigned_once() {
        let mut c = CandidateRecord::new("A - B", 10, "http://x", "p", CandidateKind::Torrent);
        assert!(!c.matches_policy());
        assert!(!c.policy_assigned());

        assert!(c.assign_policy(true));
        assert!(c.matches_policy());

        assert!(!c.assign_policy(false));
        assert!(c.matches_policy());
    }

    #[test]
    fn test_policy_verdict_survives_serialization() {
        let mut c = CandidateRecord::new("A - B", 10, "http://x", "p", CandidateKind::Nzb);
        c.assign_policy(true);
        let json = serde_json::to_string(&c).unwrap();
        let back: CandidateRecord = serde_json::from_str(&json).unwrap();
        assert!(back.matches_policy());
    }

    #[test]
    fn test_constraints_by_tier() {
        let lossless = QualityConstraints::for_tier(QualityTier::LosslessOnly, false, 0);
        assert_eq!(lossless.categories, vec![3040]);
        assert_eq!(lossless.max_size, 10_000_000_000);

        let lossy = QualityConstraints::for_tier(QualityTier::PreferredBitrate, false, 3);
        assert_eq!(lossy.categories, vec![3010]);
        assert_eq!(lossy.max_size, 300_000_000);

        let big = CandidateRecord::new("x", 400_000_000, "u", "p", CandidateKind::Torrent);
        assert!(!lossy.admits(&big));
        assert!(lossless.admits(&big));

        let starved =
            CandidateRecord::new("x", 10, "u", "p", CandidateKind::Torrent).with_seeders(1);
        assert!(!lossy.admits(&starved));
        let unknown = CandidateRecord::new("x", 10, "u", "p", CandidateKind::Nzb);
        assert!(lossy.admits(&unknown));

        let widened = QualityConstraints::for_tier(QualityTier::PreferredBitrate, true, 0);
        assert_eq!(widened.categories, vec![3040, 3010]);
        assert_eq!(widened.max_size, 10_000_000_000);
    }

    #[test]
    fn test_kind_helpers() {
        assert!(CandidateKind::Magnet.is_torrent_like());
        assert!(!CandidateKind::Nzb.is_torrent_like());
        assert_eq!(CandidateKind::parse("magnet"), Some(CandidateKind::Magnet));
        assert_eq!(CandidateKind::parse("ftp"), None);
    }
}
