//! Newznab (Usenet) provider reading the RSS search feed.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::NewznabProviderConfig;

use super::{
    CandidateKind, CandidateRecord, Provider, ProviderClass, QualityConstraints, SearchError,
};

pub struct NewznabProvider {
    client: Client,
    config: NewznabProviderConfig,
}

impl NewznabProvider {
    pub fn new(config: NewznabProviderConfig, timeout_secs: u32) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_search_url(&self, term: &str, constraints: &QualityConstraints) -> String {
        let categories = constraints
            .categories
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{}/api?t=search&apikey={}&cat={}&q={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.api_key),
            categories,
            urlencoding::encode(term)
        )
    }
}

#[async_trait]
impl Provider for NewznabProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn class(&self) -> ProviderClass {
        ProviderClass::Nzb
    }

    async fn search(
        &self,
        term: &str,
        constraints: &QualityConstraints,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        let url = self.build_search_url(term, constraints);
        debug!(provider = %self.config.id, term = %term, "Searching newznab indexer");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SearchError::ApiError(format!("HTTP {}", response.status())));
        }

        let body = response.text().await?;
        let candidates: Vec<_> = parse_feed(&body, &self.config.id)?
            .into_iter()
            .filter(|c| constraints.admits(c))
            .collect();

        debug!(
            provider = %self.config.id,
            kept = candidates.len(),
            "Newznab search complete"
        );
        Ok(candidates)
    }
}

#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    link: Option<String>,
    enclosure_url: Option<String>,
    enclosure_length: Option<u64>,
    attr_size: Option<u64>,
}

impl ItemBuilder {
    fn read_element(&mut self, e: &BytesStart) {
        let mut name = None;
        let mut value = None;
        let mut url = None;
        let mut length = None;

        for attr in e.attributes().flatten() {
            let val = String::from_utf8_lossy(&attr.value).to_string();
            match attr.key.as_ref() {
                b"name" => name = Some(val),
                b"value" => value = Some(val),
                b"url" => url = Some(val),
                b"length" => length = val.parse::<u64>().ok(),
                _ => {}
            }
        }

        match e.name().as_ref() {
            b"newznab:attr" if name.as_deref() == Some("size") => {
                self.attr_size = value.and_then(|v| v.parse().ok());
            }
            b"enclosure" => {
                self.enclosure_url = url;
                self.enclosure_length = length;
            }
            _ => {}
        }
    }

    fn build(self, provider_id: &str) -> Option<CandidateRecord> {
        let title = self.title?;
        let locator = self.link.or(self.enclosure_url)?;
        let size = self.attr_size.or(self.enclosure_length).unwrap_or(0);
        Some(CandidateRecord::new(title, size, locator, provider_id, CandidateKind::Nzb))
    }
}

/// Parse a Newznab RSS feed. Size comes from `newznab:attr name="size"`,
/// falling back to the enclosure length.
fn parse_feed(xml: &str, provider_id: &str) -> Result<Vec<CandidateRecord>, SearchError> {
    if xml.contains("<error") {
        return Err(SearchError::ApiError(error_description(xml)));
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut candidates = Vec::new();
    let mut item: Option<ItemBuilder> = None;
    let mut current_tag = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                current_tag = e.name().as_ref().to_vec();
                if current_tag == b"item" {
                    item = Some(ItemBuilder::default());
                } else if let Some(ref mut it) = item {
                    it.read_element(e);
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(ref mut it) = item {
                    it.read_element(e);
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(ref mut it) = item {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match current_tag.as_slice() {
                        b"title" => it.title = Some(text),
                        b"link" => it.link = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(c) = item.take().and_then(|it| it.build(provider_id)) {
                        candidates.push(c);
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SearchError::ParseError(e.to_string())),
            _ => {}
        }
    }

    Ok(candidates)
}

fn error_description(xml: &str) -> String {
    xml.find("description=\"")
        .map(|start| &xml[start + 13..])
        .and_then(|rest| rest.find('"').map(|end| rest[..end].to_string()))
        .unwrap_or_else(|| "unknown API error".to_string())
}
