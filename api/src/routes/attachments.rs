use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use kvmail_store::NewAttachment;
use serde_json::{Value, json};
use tracing::info;

use super::public_origin;
use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::session::CurrentUser;
use crate::state::{AppState, Backend};

/// A file part read out of a multipart body.
pub(crate) struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Read the `file` part and the optional `filename` override part.
pub(crate) async fn read_upload(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, Option<String>), ApiError> {
    let mut file = None;
    let mut filename = None;

    while let Some(field) = multipart.next_field().await? {
        let part = field.name().map(str::to_owned);
        match part.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("attachment").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?.to_vec();
                file = Some(UploadedFile {
                    name,
                    content_type,
                    data,
                });
            }
            Some("filename") => {
                filename = Some(field.text().await?).filter(|name| !name.trim().is_empty());
            }
            _ => {}
        }
    }

    Ok((file, filename))
}

pub async fn upload<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    _user: CurrentUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (file, filename) = read_upload(multipart).await?;
    let file = file.ok_or_else(|| ApiError::Validation("No file uploaded".to_string()))?;

    let origin = public_origin(&state.config, &headers);
    let meta = state
        .attachments
        .upload(
            NewAttachment {
                data: file.data,
                original_name: file.name,
                content_type: file.content_type,
                filename,
            },
            &origin,
        )
        .await?;

    info!(id = %meta.id, size = meta.size, "uploaded attachment");
    Ok(Json(json!({
        "success": true,
        "id": meta.id,
        "name": meta.original_name,
        "type": meta.content_type,
        "size": meta.size,
        "url": meta.url,
    })))
}

fn content_disposition(filename: &str) -> HeaderValue {
    let cleaned: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{cleaned}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub async fn download<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blob = match state.attachments.get(&id).await {
        Ok(blob) => blob,
        Err(kvmail_store::Error::NotFound(_)) => {
            return Err(ApiError::NotFound("Attachment not found"));
        }
        Err(e) => return Err(e.into()),
    };

    let content_type = HeaderValue::from_str(&blob.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, content_disposition(&blob.filename)),
        ],
        blob.data,
    ))
}

pub async fn delete<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.attachments.delete(&id).await?;
    info!(%id, "deleted attachment");
    Ok(Json(json!({ "success": true })))
}

pub async fn list<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    _user: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let attachments = state.attachments.list().await?;
    Ok(Json(json!({ "success": true, "data": attachments })))
}
