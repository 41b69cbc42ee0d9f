use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a stored email relative to this mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailType {
    Sent,
    Received,
    /// Any other value found in storage. Never matched by a type filter.
    #[serde(other)]
    Unknown,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Sent => "sent",
            EmailType::Received => "received",
            EmailType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEmailTypeError(pub String);

impl fmt::Display for ParseEmailTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid email type {:?}, expected \"sent\" or \"received\"", self.0)
    }
}

impl std::error::Error for ParseEmailTypeError {}

impl FromStr for EmailType {
    type Err = ParseEmailTypeError;

    /// Only the two filterable types parse; `Unknown` exists for stored data.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(EmailType::Sent),
            "received" => Ok(EmailType::Received),
            other => Err(ParseEmailTypeError(other.to_string())),
        }
    }
}

/// A file referenced by an outgoing email, fetched by the delivery API from `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub path: String,
    pub filename: String,
}

/// An email that has not been stored yet. This is exactly the JSON value
/// persisted under an `email:<millis>` key; the key itself is the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<EmailType>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentRef>>,
}

impl NewEmail {
    pub fn new(
        kind: EmailType,
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            html: None,
            kind: Some(kind),
            timestamp: Utc::now(),
            attachments: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = (!attachments.is_empty()).then_some(attachments);
        self
    }

    pub fn into_record(self, id: String) -> EmailRecord {
        EmailRecord {
            id,
            from: self.from,
            to: self.to,
            subject: self.subject,
            text: self.text,
            html: self.html,
            kind: self.kind,
            timestamp: self.timestamp,
            attachments: self.attachments,
        }
    }
}

/// A stored email, tagged with the key it lives under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<EmailType>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentRef>>,
}

/// Metadata kept beside an uploaded attachment blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub id: String,
    pub original_name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_count: usize,
    pub total_pages: usize,
}

/// One page of a listing, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPage {
    pub emails: Vec<EmailRecord>,
    pub pagination: Pagination,
}
