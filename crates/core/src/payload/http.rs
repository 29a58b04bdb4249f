//! Payload resolution over HTTP.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::LOCATION, redirect::Policy, Client, RequestBuilder};
use tracing::debug;

use crate::config::{Credentials, ProvidersConfig};
use crate::download::magnet;
use crate::searcher::{CandidateKind, CandidateRecord};

use super::{FetchOutcome, PayloadError, PayloadResolver};

pub struct HttpPayloadResolver {
    client: Client,
    /// Basic-auth credentials keyed by provider id.
    credentials: HashMap<String, Credentials>,
}

impl HttpPayloadResolver {
    pub fn new(providers: &ProvidersConfig, timeout_secs: u32) -> Result<Self, PayloadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .redirect(Policy::none())
            .build()
            .map_err(|e| PayloadError::Request(e.to_string()))?;

        let credentials = providers
            .newznab
            .iter()
            .filter_map(|p| p.credentials.clone().map(|c| (p.id.clone(), c)))
            .collect();

        Ok(Self {
            client,
            credentials,
        })
    }

    fn get(&self, url: &str, provider_id: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match self.credentials.get(provider_id) {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    async fn body(&self, request: RequestBuilder) -> Result<Vec<u8>, PayloadError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(PayloadError::Http(response.status().as_u16()));
        }
        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(bytes)
    }
}

/// Replacement candidate for a download link that redirected to a magnet URI.
fn redirected_to_magnet(candidate: &CandidateRecord, uri: &str) -> FetchOutcome {
    let mut replacement = candidate.clone();
    replacement.locator = uri.to_string();
    replacement.kind = CandidateKind::Magnet;
    FetchOutcome::Redirected {
        candidate: replacement,
        bytes: magnet::embed_bytes(uri),
    }
}

#[async_trait]
impl PayloadResolver for HttpPayloadResolver {
    async fn fetch(
        &self,
        candidate: &CandidateRecord,
        backend_accepts_urls: bool,
    ) -> Result<FetchOutcome, PayloadError> {
        if candidate.is_magnet_locator() {
            return Ok(FetchOutcome::Bytes(magnet::embed_bytes(&candidate.locator)));
        }

        if candidate.kind == CandidateKind::Torrent
            && backend_accepts_urls
            && !candidate.requires_payload
        {
            debug!(title = %candidate.title, "Backend fetches the torrent URL itself");
            return Ok(FetchOutcome::AlreadyLocal);
        }

        let response = self
            .get(&candidate.locator, &candidate.provider_id)
            .send()
            .await?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or(PayloadError::MissingLocation)?
                .to_string();

            if location.to_lowercase().starts_with("magnet:") {
                debug!(title = %candidate.title, "Download link redirected to a magnet URI");
                return Ok(redirected_to_magnet(candidate, &location));
            }

            debug!(location = %location, "Following payload redirect");
            let bytes = self
                .body(self.get(&location, &candidate.provider_id))
                .await?;
            return Ok(FetchOutcome::Bytes(bytes));
        }

        if !response.status().is_success() {
            return Err(PayloadError::Http(response.status().as_u16()));
        }
        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(FetchOutcome::Bytes(bytes))
    }
}
