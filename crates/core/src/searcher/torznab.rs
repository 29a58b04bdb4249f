//! Torznab provider backed by a Jackett (or compatible) results endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::TorznabProviderConfig;

use super::{
    CandidateKind, CandidateRecord, Provider, ProviderClass, QualityConstraints, SearchError,
};

/// One configured indexer behind a Jackett server.
pub struct TorznabProvider {
    client: Client,
    config: TorznabProviderConfig,
}

impl TorznabProvider {
    pub fn new(config: TorznabProviderConfig, timeout_secs: u32) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_search_url(&self, term: &str, constraints: &QualityConstraints) -> String {
        let mut url = format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.indexer),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(term)
        );

        for cat in &constraints.categories {
            url.push_str(&format!("&Category[]={}", cat));
        }

        url
    }

    fn to_candidate(&self, r: JackettResult) -> Option<CandidateRecord> {
        let (locator, kind) = match (r.Link, r.MagnetUri) {
            (Some(link), _) if !link.is_empty() => (link, CandidateKind::Torrent),
            (_, Some(magnet)) if !magnet.is_empty() => (magnet, CandidateKind::Magnet),
            _ => return None,
        };

        let mut candidate = CandidateRecord::new(
            r.Title,
            r.Size.unwrap_or(0).max(0) as u64,
            locator,
            &self.config.id,
            kind,
        )
        .with_requires_payload(self.config.requires_payload);

        if let Some(seeders) = r.Seeders {
            candidate = candidate.with_seeders(seeders.max(0) as u32);
        }
        Some(candidate)
    }
}

#[async_trait]
impl Provider for TorznabProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn class(&self) -> ProviderClass {
        ProviderClass::Torrent
    }

    async fn search(
        &self,
        term: &str,
        constraints: &QualityConstraints,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        let url = self.build_search_url(term, constraints);
        debug!(provider = %self.config.id, term = %term, "Searching torznab indexer");

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SearchError::AuthenticationFailed(format!(
                "indexer {} rejected the API key",
                self.config.indexer
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: JackettResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        let total = parsed.Results.len();
        let candidates: Vec<_> = parsed
            .Results
            .into_iter()
            .filter_map(|r| self.to_candidate(r))
            .filter(|c| constraints.admits(c))
            .collect();

        debug!(
            provider = %self.config.id,
            results = total,
            kept = candidates.len(),
            "Torznab search complete"
        );

        Ok(candidates)
    }
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::QualityTier;

    fn config() -> TorznabProviderConfig {
        TorznabProviderConfig {
            id: "Jackett_rutracker".to_string(),
            url: "http://localhost:9117/".to_string(),
            indexer: "rutracker".to_string(),
            api_key: "test-key".to_string(),
            seed_ratio: None,
            enabled: true,
            requires_payload: true,
        }
    }

    #[test]
    fn test_build_search_url() {
        let provider = TorznabProvider::new(config(), 30).unwrap();
        let constraints =
            QualityConstraints::for_tier(QualityTier::HighestIncludingLossless, false, 0);

        let url = provider.build_search_url("Foo Bar 2010", &constraints);
        assert!(url.starts_with("http://localhost:9117/api/v2.0/indexers/rutracker/results"));
        assert!(url.contains("apikey=test-key"));
        assert!(url.contains("Query=Foo%20Bar%202010"));
        assert!(url.contains("Category[]=3040"));
        assert!(url.contains("Category[]=3010"));
    }

    #[test]
    fn test_result_mapping() {
        let provider = TorznabProvider::new(config(), 30).unwrap();
        let body = r#"{"Results": [
            {"Title": "Foo - Bar", "Link": "http://localhost:9117/dl/1", "MagnetUri": "magnet:?xt=urn:btih:abc", "Size": 1000, "Seeders": 4},
            {"Title": "Foo - Bar (2010)", "Link": null, "MagnetUri": "magnet:?xt=urn:btih:def", "Size": -5, "Seeders": null},
            {"Title": "No locator", "Link": null, "MagnetUri": null, "Size": 1, "Seeders": 1}
        ]}"#;
        let parsed: JackettResponse = serde_json::from_str(body).unwrap();
        let candidates: Vec<_> = parsed
            .Results
            .into_iter()
            .filter_map(|r| provider.to_candidate(r))
            .collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].kind, CandidateKind::Torrent);
        assert_eq!(candidates[0].seeders, Some(4));
        assert!(candidates[0].requires_payload);
        assert_eq!(candidates[0].provider_id, "Jackett_rutracker");
        assert_eq!(candidates[1].kind, CandidateKind::Magnet);
        assert_eq!(candidates[1].size, 0);
        assert_eq!(candidates[1].seeders, None);
    }
}
