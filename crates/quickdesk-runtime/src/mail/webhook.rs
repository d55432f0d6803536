use std::time::Duration;

use async_trait::async_trait;
use quickdesk_core::error::{DeskError, Result};
use quickdesk_core::notify::{EmailMessage, Mailer};
use serde::Serialize;

/// Hands e-mails to an HTTP relay as JSON.
///
/// The relay receives `{"from", "to", "subject", "body"}` and is expected
/// to answer with a 2xx status once the message is accepted.
#[derive(Debug, Clone)]
pub struct WebhookMailer {
    client: reqwest::Client,
    url: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct Outgoing<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl WebhookMailer {
    pub fn new(url: impl Into<String>, from: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeskError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = Outgoing {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            body: &message.body,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeskError::Internal(format!("Mail relay unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeskError::Internal(format!(
                "Mail relay rejected message to {}: {}",
                message.to, status
            )));
        }

        tracing::debug!(to = %message.to, subject = %message.subject, "E-mail relayed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = Outgoing {
            from: "QuickDesk <noreply@quickdesk.local>",
            to: "ana@example.com",
            subject: "Ticket Update",
            body: "Hello",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["from"], "QuickDesk <noreply@quickdesk.local>");
        assert_eq!(json["to"], "ana@example.com");
        assert_eq!(json["subject"], "Ticket Update");
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_an_error() {
        let mailer = WebhookMailer::new("http://127.0.0.1:9/mail", "noreply@quickdesk.local")
            .unwrap();
        let message = EmailMessage {
            to: "ana@example.com".into(),
            subject: "s".into(),
            body: "b".into(),
        };
        assert!(mailer.send(&message).await.is_err());
    }
}
