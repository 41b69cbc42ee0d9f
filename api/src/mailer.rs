//! Outbound delivery through the Resend HTTP API.

use kvmail_types::AttachmentRef;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail delivery is not configured, RESEND_API_KEY is not set")]
    NotConfigured,

    /// The delivery API answered with an error.
    #[error("{message}")]
    Rejected { name: String, message: String },

    #[error("mail delivery request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The JSON body posted to the delivery API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentRef>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: String,
}

pub trait Mailer: Clone + Send + Sync + 'static {
    fn is_configured(&self) -> bool;

    fn send(
        &self,
        email: &OutgoingEmail,
    ) -> impl Future<Output = Result<SendReceipt, MailerError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ResendError {
    name: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
        }
    }
}

impl Mailer for ResendMailer {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, MailerError> {
        let api_key = self.api_key.as_deref().ok_or(MailerError::NotConfigured)?;

        let response = self
            .client
            .post(format!("{}/emails", self.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(email)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        let status = response.status();
        let body = response.json::<ResendError>().await.ok();
        let (name, message) = match body {
            Some(ResendError { name, message }) => (name, message),
            None => (None, None),
        };
        Err(MailerError::Rejected {
            name: name.unwrap_or_else(|| status.to_string()),
            message: message.unwrap_or_else(|| format!("delivery API returned {status}")),
        })
    }
}
