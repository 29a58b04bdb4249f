//! Generic JSON webhook and Slack incoming-webhook channels.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::{SlackConfig, WebhookConfig};

use super::{NotificationEnvelope, NotificationEvent, Notifier, NotifyError};

fn client(timeout_secs: u32) -> Result<Client, NotifyError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs as u64))
        .build()
        .map_err(|e| NotifyError::Delivery(e.to_string()))
}

async fn post_json(client: &Client, url: &str, body: &Value) -> Result<(), NotifyError> {
    let response = client.post(url).json(body).send().await?;
    if !response.status().is_success() {
        return Err(NotifyError::Rejected(response.status().as_u16()));
    }
    Ok(())
}

/// POSTs the event as JSON.
pub struct WebhookNotifier {
    client: Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig, timeout_secs: u32) -> Result<Self, NotifyError> {
        Ok(Self {
            client: client(timeout_secs)?,
            config,
        })
    }
}

pub(crate) fn webhook_body(envelope: &NotificationEnvelope) -> Value {
    json!({
        "id": envelope.id.to_string(),
        "timestamp": envelope.timestamp.to_rfc3339(),
        "message": envelope.event.summary(),
        "event": envelope.event,
    })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn accepts(&self, event: &NotificationEvent) -> bool {
        match event {
            NotificationEvent::Snatched { .. } => self.config.on_snatch,
        }
    }

    async fn notify(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError> {
        post_json(&self.client, &self.config.url, &webhook_body(envelope)).await
    }
}

/// Slack incoming webhook.
pub struct SlackNotifier {
    client: Client,
    config: SlackConfig,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig, timeout_secs: u32) -> Result<Self, NotifyError> {
        Ok(Self {
            client: client(timeout_secs)?,
            config,
        })
    }
}

pub(crate) fn slack_body(event: &NotificationEvent) -> Value {
    match event {
        NotificationEvent::Snatched {
            artist,
            album,
            provider,
            folder_name,
            ..
        } => json!({
            "text": format!(
                "Encore: snatched *{} - {}* from {} (`{}`)",
                artist, album, provider, folder_name
            ),
        }),
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    fn accepts(&self, event: &NotificationEvent) -> bool {
        match event {
            NotificationEvent::Snatched { .. } => self.config.on_snatch,
        }
    }

    async fn notify(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError> {
        post_json(&self.client, &self.config.webhook_url, &slack_body(&envelope.event)).await
    }
}
