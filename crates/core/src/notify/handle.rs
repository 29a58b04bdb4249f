use tokio::sync::mpsc;

use super::{NotificationEnvelope, NotificationEvent};

/// Handle for emitting notifications.
///
/// Cheaply cloneable. Events go through a channel to the `NotificationWorker`,
/// so the caller never waits on a notification channel.
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<NotificationEnvelope>,
}

impl NotifyHandle {
    pub fn new(tx: mpsc::Sender<NotificationEnvelope>) -> Self {
        Self { tx }
    }

    /// Queue an event, waiting for buffer space. A closed channel is logged.
    pub async fn emit(&self, event: NotificationEvent) {
        if let Err(e) = self.tx.send(NotificationEnvelope::new(event)).await {
            tracing::error!("Failed to emit notification: {}", e);
        }
    }

    /// Queue an event without waiting. Returns false when it was dropped.
    pub fn try_emit(&self, event: NotificationEvent) -> bool {
        match self.tx.try_send(NotificationEnvelope::new(event)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit notification: {}", e);
                false
            }
        }
    }
}
