//! Mock notification channel for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{NotificationEnvelope, NotificationEvent, Notifier, NotifyError};

/// Mock implementation of the Notifier trait. Records delivered events.
#[derive(Debug, Clone)]
pub struct MockNotifier {
    name: String,
    delivered: Arc<RwLock<Vec<NotificationEvent>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockNotifier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delivered: Arc::new(RwLock::new(Vec::new())),
            fail: Arc::new(RwLock::new(false)),
        }
    }

    /// Make every delivery fail until reset.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn delivered(&self) -> Vec<NotificationEvent> {
        self.delivered.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError> {
        if *self.fail.read().await {
            return Err(NotifyError::Delivery(format!("{} is down", self.name)));
        }
        self.delivered.write().await.push(envelope.event.clone());
        Ok(())
    }
}
