use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use kvmail_store::DEFAULT_PAGE_SIZE;
use kvmail_types::{AttachmentRef, EmailType, NewEmail};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use url::Url;

use crate::error::ApiError;
use crate::mailer::{Mailer, OutgoingEmail};
use crate::session::CurrentUser;
use crate::state::{AppState, Backend};

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    to: String,
    subject: String,
    text: String,
    from: Option<String>,
    html: Option<String>,
    attachments: Option<Vec<AttachmentRef>>,
}

impl SendRequest {
    fn validate(&self) -> Result<(), ApiError> {
        for (name, value) in [("to", &self.to), ("subject", &self.subject), ("text", &self.text)] {
            if value.is_empty() {
                return Err(ApiError::Validation(format!("{name} must not be empty")));
            }
        }
        if self.from.as_deref() == Some("") {
            return Err(ApiError::Validation("from must not be empty".to_string()));
        }
        for attachment in self.attachments.iter().flatten() {
            if Url::parse(&attachment.path).is_err() {
                return Err(ApiError::Validation(format!(
                    "attachment path {:?} is not a url",
                    attachment.path
                )));
            }
            if attachment.filename.is_empty() {
                return Err(ApiError::Validation(
                    "attachment filename must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Wrap each line of plain text in a paragraph.
fn text_to_html(text: &str) -> String {
    format!("<p>{}</p>", text.replace('\n', "</p><p>"))
}

pub async fn send<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    request.validate()?;

    let outgoing = OutgoingEmail {
        from: request
            .from
            .unwrap_or_else(|| state.config.default_from.clone()),
        to: request.to,
        subject: request.subject,
        html: request.html.unwrap_or_else(|| text_to_html(&request.text)),
        text: request.text,
        attachments: request.attachments.filter(|a| !a.is_empty()),
    };

    let receipt = state.mailer.send(&outgoing).await?;

    let email = NewEmail::new(
        EmailType::Sent,
        outgoing.from,
        outgoing.to,
        outgoing.subject,
        outgoing.text,
    )
    .with_html(outgoing.html)
    .with_attachments(outgoing.attachments.unwrap_or_default());
    let record = state.emails.store(email).await?;

    info!(id = %record.id, delivery_id = %receipt.id, username = %user.username, "sent email");
    Ok(Json(json!({ "success": true, "data": receipt })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    page: Option<String>,
    #[serde(rename = "pageSize")]
    page_size: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn parse_integer(name: &str, value: Option<&str>, default: i64) -> Result<i64, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::Validation(format!("{name} must be an integer, got {value:?}"))),
    }
}

pub async fn list<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    _user: CurrentUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;

    let page = parse_integer("page", query.page.as_deref(), 1)?;
    let page_size = parse_integer(
        "pageSize",
        query.page_size.as_deref(),
        i64::from(DEFAULT_PAGE_SIZE),
    )?;
    let kind = match query.kind.as_deref() {
        None | Some("") => None,
        Some(kind) => Some(
            kind.parse::<EmailType>()
                .map_err(|e| ApiError::Validation(e.to_string()))?,
        ),
    };

    let page = state.emails.list(page, page_size, kind).await?;
    Ok(Json(json!({
        "success": true,
        "emails": page.emails,
        "pagination": page.pagination,
    })))
}

pub async fn get<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.emails.get_by_id(&id).await {
        Ok(email) => Ok(Json(json!({ "success": true, "data": email }))),
        Err(kvmail_store::Error::NotFound(_)) => Err(ApiError::NotFound("Email not found")),
        Err(e) => Err(e.into()),
    }
}
