//! Notifier that POSTs notifications to an HTTP endpoint

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{info, warn};

use crate::domain::notification::{Notification, Notifier};
use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Delivers each notification as a JSON body.
///
/// When a secret is configured the body is signed with HMAC-SHA256 and the
/// hex digest sent as `X-Webhook-Signature: sha256=<digest>`.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    secret: Option<String>,
    http_client: Client,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            DomainError::configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            url: url.into(),
            secret,
            http_client,
        })
    }

    fn generate_signature(secret: &str, payload: &str) -> Result<String, DomainError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| DomainError::notification(format!("Invalid signing key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DomainError> {
        let payload = serde_json::to_string(&notification).map_err(|e| {
            DomainError::internal(format!("Failed to serialize notification: {}", e))
        })?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Event", notification.kind.as_str());

        if let Some(ref secret) = self.secret {
            let signature = Self::generate_signature(secret, &payload)?;
            request = request.header("X-Webhook-Signature", format!("sha256={}", signature));
        }

        let response = request.body(payload).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "Request timed out".to_string()
            } else if e.is_connect() {
                "Connection failed".to_string()
            } else {
                format!("Request failed: {}", e)
            };
            warn!(kind = %notification.kind, error = %message, "Notification delivery failed");
            DomainError::notification(message)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                kind = %notification.kind,
                status = status.as_u16(),
                "Notification delivery failed with HTTP error"
            );
            return Err(DomainError::notification(format!(
                "HTTP status {}",
                status.as_u16()
            )));
        }

        info!(
            kind = %notification.kind,
            team_id = %notification.team_id,
            status = status.as_u16(),
            "Notification delivered"
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
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> Notification {
        Notification::new(
            NotificationKind::MemberAdded,
            TeamId::generate(),
            vec![Recipient::Email("a@x.com".to_string())],
            json!({"team_name": "Core"}),
        )
    }

    #[test]
    fn test_generate_signature() {
        let a = WebhookNotifier::generate_signature("secret", "{}").unwrap();
        let b = WebhookNotifier::generate_signature("secret", "{}").unwrap();
        let c = WebhookNotifier::generate_signature("other", "{}").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_posts_signed_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/teams"))
            .and(header("X-Webhook-Event", "member_added"))
            .and(header_exists("X-Webhook-Signature"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(
            format!("{}/hooks/teams", server.uri()),
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let sent = notification();
        notifier.notify(sent.clone()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Notification = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body, sent);

        let expected = WebhookNotifier::generate_signature(
            "secret",
            std::str::from_utf8(&requests[0].body).unwrap(),
        )
        .unwrap();
        let signature = requests[0]
            .headers
            .get("X-Webhook-Signature")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(signature, format!("sha256={}", expected));
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier =
            WebhookNotifier::new(server.uri(), None, Duration::from_secs(5)).unwrap();

        let err = notifier.notify(notification()).await.unwrap_err();
        assert!(matches!(err, DomainError::Notification { .. }));
    }
}
