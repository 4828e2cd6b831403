//! Notifier that writes notifications to the log

use async_trait::async_trait;
use tracing::info;

use crate::domain::notification::{Notification, Notifier};
use crate::domain::DomainError;

/// Development notifier; every notification becomes an `info` line
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DomainError> {
        info!(
            kind = %notification.kind,
            team_id = %notification.team_id,
            recipients = notification.recipients.len(),
            deliver_after = ?notification.deliver_after,
            payload = %notification.payload,
            "Notification dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TeamId;
    use crate::domain::notification::{NotificationKind, Recipient};
    use serde_json::json;

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let notifier = LogNotifier::new();
        let notification = Notification::new(
            NotificationKind::Invitation,
            TeamId::generate(),
            vec![Recipient::Email("a@x.com".to_string())],
            json!({"team_name": "Core"}),
        );

        assert!(notifier.notify(notification).await.is_ok());
    }
}
