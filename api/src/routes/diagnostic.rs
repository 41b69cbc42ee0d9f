//! Health checks for the storage backends and the delivery configuration.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use chrono::Utc;
use kvmail_store::{Blob, BlobStore, RecordStore, now_millis};
use serde_json::{Value, json};
use tracing::warn;

use super::attachments::read_upload;
use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::session::CurrentUser;
use crate::state::{AppState, Backend};

const RECORD_PROBE_KEY: &str = "diagnostic:test";
const BLOB_PROBE_KEY: &str = "diagnostic-test.txt";

async fn probe_records<S: RecordStore>(store: &S) -> kvmail_store::Result<Option<Value>> {
    store
        .put(RECORD_PROBE_KEY, &json!({ "test": true }).to_string())
        .await?;
    let value = store.get(RECORD_PROBE_KEY).await?;
    store.delete(RECORD_PROBE_KEY).await?;
    Ok(value.and_then(|v| serde_json::from_str(&v).ok()))
}

async fn probe_blobs<S: BlobStore>(store: &S) -> kvmail_store::Result<Option<usize>> {
    let blob = Blob {
        data: b"diagnostic test".to_vec(),
        content_type: "text/plain".to_string(),
        filename: BLOB_PROBE_KEY.to_string(),
    };
    round_trip(store, BLOB_PROBE_KEY, blob).await
}

pub async fn env<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    _user: CurrentUser,
) -> Json<Value> {
    let record_test = match probe_records(&state.store).await {
        Ok(value) => json!({ "success": value.is_some(), "value": value }),
        Err(e) => {
            warn!("record store probe failed: {e}");
            json!({ "success": false, "error": e.to_string() })
        }
    };

    let blob_test = match probe_blobs(&state.store).await {
        Ok(size) => json!({ "success": size.is_some(), "size": size.unwrap_or(0) }),
        Err(e) => {
            warn!("blob store probe failed: {e}");
            json!({ "success": false, "error": e.to_string() })
        }
    };

    Json(json!({
        "success": true,
        "timestamp": Utc::now(),
        "backend": state.store.backend(),
        "hasResendApiKey": state.mailer.is_configured(),
        "recordTest": record_test,
        "blobTest": blob_test,
    }))
}

pub async fn upload_test<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    _user: CurrentUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (file, _) = read_upload(multipart).await?;

    let mut report = json!({
        "success": true,
        "timestamp": Utc::now(),
        "request": {
            "contentType": headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            "hasFile": file.is_some(),
        },
    });

    let Some(file) = file else {
        return Ok(Json(report));
    };

    report["file"] = json!({
        "name": file.name,
        "size": file.data.len(),
        "type": file.content_type,
    });

    let key = format!("diagnostic-{}-{}", now_millis(), file.name);
    let blob = Blob {
        data: file.data,
        content_type: file.content_type,
        filename: file.name,
    };
    report["upload"] = match round_trip(&state.store, &key, blob).await {
        Ok(size) => json!({
            "success": size.is_some(),
            "filename": key,
            "uploadedSize": size.unwrap_or(0),
        }),
        Err(e) => {
            warn!(%key, "upload probe failed: {e}");
            json!({ "success": false, "filename": key, "error": e.to_string() })
        }
    };

    Ok(Json(report))
}

/// Write, read back and delete a blob. Returns the size read back.
async fn round_trip<S: BlobStore>(
    store: &S,
    key: &str,
    blob: Blob,
) -> kvmail_store::Result<Option<usize>> {
    store.put_blob(key, blob).await?;
    let stored = store.get_blob(key).await?;
    store.delete_blob(key).await?;
    Ok(stored.map(|blob| blob.data.len()))
}
