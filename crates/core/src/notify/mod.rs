//! Fire-and-forget notifications about snatches.

mod handle;
mod types;
mod webhook;
mod worker;

use std::sync::Arc;

pub use handle::NotifyHandle;
pub use types::*;
pub use webhook::{SlackNotifier, WebhookNotifier};
pub use worker::{create_notification_system, NotificationWorker};

use crate::config::NotificationsConfig;

/// Build the configured channels.
pub fn build_notifiers(
    config: &NotificationsConfig,
    timeout_secs: u32,
) -> Result<Vec<Arc<dyn Notifier>>, NotifyError> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(webhook) = &config.webhook {
        notifiers.push(Arc::new(WebhookNotifier::new(webhook.clone(), timeout_secs)?));
    }
    if let Some(slack) = &config.slack {
        notifiers.push(Arc::new(SlackNotifier::new(slack.clone(), timeout_secs)?));
    }
    Ok(notifiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SlackConfig, WebhookConfig};

    #[test]
    fn test_build_notifiers() {
        assert!(build_notifiers(&NotificationsConfig::default(), 5)
            .unwrap()
            .is_empty());

        let config = NotificationsConfig {
            webhook: Some(WebhookConfig {
                url: "http://localhost/hook".to_string(),
                on_snatch: true,
            }),
            slack: Some(SlackConfig {
                webhook_url: "https://hooks.slack.com/services/x".to_string(),
                on_snatch: true,
            }),
            buffer_size: 8,
        };
        let names: Vec<String> = build_notifiers(&config, 5)
            .unwrap()
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        assert_eq!(names, vec!["webhook", "slack"]);
    }
}
