use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use url::Url;

use staffdesk_core::message::{AdminAlert, RenderedMessage};

/// Delivery channel for rendered messages and administrator alerts.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_message(&self, message: &RenderedMessage) -> Result<(), MailError>;
    async fn send_admin_alert(&self, alert: &AdminAlert) -> Result<(), MailError>;
}

/// Client for an HTTP mail delivery API.
#[derive(Clone)]
pub struct MailApiClient {
    http: Client,
    base_url: Url,
    api_token: String,
    sender: String,
}

impl MailApiClient {
    /// Creates a new client with the provided configuration.
    pub fn new(
        api_token: impl Into<String>,
        sender: impl Into<String>,
        base_url: Url,
        http: Client,
    ) -> Self {
        Self {
            http,
            base_url,
            api_token: api_token.into(),
            sender: sender.into(),
        }
    }

    async fn post_message(&self, body: serde_json::Value) -> Result<(), MailError> {
        let url = self.base_url.join("messages")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&body)
            .send()
            .await?;

        ensure_success(response).await
    }
}

#[async_trait]
impl MailTransport for MailApiClient {
    async fn send_message(&self, message: &RenderedMessage) -> Result<(), MailError> {
        let body = serde_json::json!({
            "from": self.sender,
            "to": message.recipient,
            "subject": message.subject,
            "html": message.html_body,
            "text": message.text_body,
        });
        self.post_message(body).await
    }

    async fn send_admin_alert(&self, alert: &AdminAlert) -> Result<(), MailError> {
        let body = serde_json::json!({
            "from": self.sender,
            "to": alert.recipient,
            "subject": alert.subject,
            "text": alert.body,
        });
        self.post_message(body).await
    }
}

/// Errors produced by the mail transport.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

async fn ensure_success(response: Response) -> Result<(), MailError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(MailError::Status { status, body });
    }
    Ok(())
}
