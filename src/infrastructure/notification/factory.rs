//! Notifier selection from configuration

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{NotificationChannel, NotificationSettings};
use crate::domain::notification::Notifier;
use crate::domain::DomainError;

use super::log::LogNotifier;
use super::webhook::WebhookNotifier;

#[derive(Debug)]
pub struct NotifierFactory;

impl NotifierFactory {
    pub fn create(settings: &NotificationSettings) -> Result<Arc<dyn Notifier>, DomainError> {
        match settings.channel {
            NotificationChannel::Log => {
                info!("Using log notifier");
                Ok(Arc::new(LogNotifier::new()))
            }
            NotificationChannel::Webhook => {
                let url = settings.webhook_url.clone().ok_or_else(|| {
                    DomainError::configuration(
                        "notifications.webhook_url is required for the webhook channel",
                    )
                })?;
                info!(url = %url, "Using webhook notifier");
                Ok(Arc::new(WebhookNotifier::new(
                    url,
                    settings.webhook_secret.clone(),
                    Duration::from_secs(settings.timeout_secs),
                )?))
            }
        }
    }
}
