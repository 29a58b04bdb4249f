use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics;

use super::{NotificationEnvelope, Notifier, NotifyHandle};

/// Background task that fans each event out to every notifier.
pub struct NotificationWorker {
    rx: mpsc::Receiver<NotificationEnvelope>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationWorker {
    pub fn new(
        rx: mpsc::Receiver<NotificationEnvelope>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        Self { rx, notifiers }
    }

    /// Deliver one event. Returns the number of channels that failed.
    pub async fn deliver(
        notifiers: &[Arc<dyn Notifier>],
        envelope: &NotificationEnvelope,
    ) -> usize {
        let mut failures = 0;
        for notifier in notifiers {
            if !notifier.accepts(&envelope.event) {
                continue;
            }
            match notifier.notify(envelope).await {
                Ok(()) => debug!(
                    channel = %notifier.name(),
                    event = envelope.event.event_type(),
                    "Notification sent"
                ),
                Err(e) => {
                    warn!(channel = %notifier.name(), error = %e, "Notification failed");
                    metrics::NOTIFICATION_FAILURES
                        .with_label_values(&[notifier.name()])
                        .inc();
                    failures += 1;
                }
            }
        }
        failures
    }

    /// Consume events until every handle is dropped.
    pub async fn run(mut self) {
        info!(channels = self.notifiers.len(), "Notification worker started");

        while let Some(envelope) = self.rx.recv().await {
            Self::deliver(&self.notifiers, &envelope).await;
        }

        info!("Notification worker shutting down");
    }
}

/// Returns the handle to share and the worker to spawn with
/// `tokio::spawn(worker.run())`.
pub fn create_notification_system(
    notifiers: Vec<Arc<dyn Notifier>>,
    buffer_size: usize,
) -> (NotifyHandle, NotificationWorker) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (NotifyHandle::new(tx), NotificationWorker::new(rx, notifiers))
}
