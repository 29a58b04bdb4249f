use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::searcher::CandidateKind;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Channel rejected notification: HTTP {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Delivery(e.to_string())
    }
}

/// Something worth telling the user about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    Snatched {
        artist: String,
        album: String,
        provider: String,
        folder_name: String,
        kind: CandidateKind,
    },
}

impl NotificationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::Snatched { .. } => "snatched",
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self {
            NotificationEvent::Snatched {
                artist,
                album,
                provider,
                ..
            } => format!("Snatched {} - {} from {}", artist, album, provider),
        }
    }
}

/// Event with the time it was emitted.
#[derive(Debug, Clone)]
pub struct NotificationEnvelope {
    /// Lets receivers drop redelivered events.
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: NotificationEvent,
}

impl NotificationEnvelope {
    pub fn new(event: NotificationEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// A notification channel. Each enabled channel is called independently.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this channel wants `event`.
    fn accepts(&self, _event: &NotificationEvent) -> bool {
        true
    }

    async fn notify(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError>;
}
