//! Delivery channels for monitor digests: SMTP email per recipient and a
//! Teams-style incoming webhook.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use healthwatch_domain::model::SmtpCredentials;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build email: {0}")]
    Build(String),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned {status}: {body}")]
    Webhook { status: u16, body: String },
}

/// Legacy connector card accepted by Teams incoming webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageCard {
    #[serde(rename = "@type")]
    card_type: &'static str,
    #[serde(rename = "@context")]
    context: &'static str,
    pub summary: String,
    pub title: String,
    pub text: String,
    pub markdown: bool,
}

impl MessageCard {
    /// Card whose summary repeats the title.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            card_type: "MessageCard",
            context: "http://schema.org/extensions",
            summary: title.clone(),
            title,
            text: text.into(),
            markdown: true,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn post(&self, url: &str, card: &MessageCard) -> Result<(), DeliveryError>;
}

/// STARTTLS submission with the sender's own credentials.
pub struct SmtpMailer {
    host: String,
    port: u16,
}

impl SmtpMailer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        let email = Message::builder()
            .from(credentials.username.parse()?)
            .to(recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|err| DeliveryError::Build(err.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ))
            .authentication(vec![Mechanism::Login, Mechanism::Plain])
            .build();
        transport.send(email).await?;
        Ok(())
    }
}

/// Webhook poster; every request is bounded by `timeout` so a silent
/// endpoint cannot hold up the family that posts to it.
#[derive(Clone)]
pub struct HttpWebhook {
    client: reqwest::Client,
}

impl HttpWebhook {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhook {
    async fn post(&self, url: &str, card: &MessageCard) -> Result<(), DeliveryError> {
        let response = self.client.post(url).json(card).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Webhook {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Outcome of fanning one email out to every recipient.
#[derive(Debug, Default)]
pub struct EmailOutcome {
    pub sent: usize,
    pub failed: Vec<(String, DeliveryError)>,
}

/// Both channels behind one handle; each delivery is independent and a
/// failure is logged and counted, never propagated to the other channel.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    webhook: Arc<dyn WebhookSender>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, webhook: Arc<dyn WebhookSender>) -> Self {
        Self { mailer, webhook }
    }

    pub async fn send_email(
        &self,
        credentials: &SmtpCredentials,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> EmailOutcome {
        let mut outcome = EmailOutcome::default();
        for recipient in recipients {
            match self.mailer.send(credentials, recipient, subject, body).await {
                Ok(()) => {
                    counter!("monitor_notifications_total", "channel" => "email", "result" => "sent")
                        .increment(1);
                    info!(recipient = %recipient, subject, "email sent");
                    outcome.sent += 1;
                }
                Err(err) => {
                    counter!("monitor_notifications_total", "channel" => "email", "result" => "failed")
                        .increment(1);
                    warn!(recipient = %recipient, subject, error = %err, "email delivery failed");
                    outcome.failed.push((recipient.clone(), err));
                }
            }
        }
        outcome
    }

    pub async fn send_webhook(&self, url: &str, title: &str, text: &str) -> Result<(), DeliveryError> {
        let card = MessageCard::new(title, text);
        match self.webhook.post(url, &card).await {
            Ok(()) => {
                counter!("monitor_notifications_total", "channel" => "webhook", "result" => "sent")
                    .increment(1);
                info!(title, "webhook posted");
                Ok(())
            }
            Err(err) => {
                counter!("monitor_notifications_total", "channel" => "webhook", "result" => "failed")
                    .increment(1);
                warn!(title, error = %err, "webhook delivery failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    fn webhook() -> HttpWebhook {
        HttpWebhook::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn message_card_serializes_connector_fields() {
        let card = MessageCard::new("Chain Status Warning", "only 2 transactions");
        assert_eq!(
            serde_json::to_value(&card).unwrap(),
            json!({
                "@type": "MessageCard",
                "@context": "http://schema.org/extensions",
                "summary": "Chain Status Warning",
                "title": "Chain Status Warning",
                "text": "only 2 transactions",
                "markdown": true
            })
        );
    }

    #[tokio::test]
    async fn webhook_posts_card_json() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hook")
                    .json_body_partial(r#"{"title": "Wallet Balance Change Update"}"#);
                then.status(200).body("1");
            })
            .await;

        let card = MessageCard::new("Wallet Balance Change Update", "line");
        webhook()
            .post(&server.url("/hook"), &card)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_non_success_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(400).body("Bad payload");
            })
            .await;

        let err = webhook()
            .post(&server.url("/hook"), &MessageCard::new("t", "x"))
            .await
            .unwrap_err();
        match err {
            DeliveryError::Webhook { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "Bad payload");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn silent_webhook_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        // Accept and hold the connection without ever answering.
        let held = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let webhook = HttpWebhook::new(Duration::from_millis(200)).unwrap();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            webhook.post(&url, &MessageCard::new("t", "x")),
        )
        .await
        .expect("post returns once its own timeout fires");

        match outcome {
            Err(DeliveryError::Http(err)) => assert!(err.is_timeout()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        held.abort();
    }

    #[tokio::test]
    async fn smtp_mailer_rejects_bad_sender_before_connecting() {
        let mailer = SmtpMailer::new("localhost", 2525);
        let credentials = SmtpCredentials {
            username: "not-an-address".into(),
            password: "pw".into(),
        };
        let err = mailer
            .send(&credentials, "ops@example.com", "subject", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Address(_)));
    }
}
