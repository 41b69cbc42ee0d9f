use chrono::Utc;
use kvmail_types::AttachmentMeta;
use tracing::debug;
use url::Url;

use crate::id::now_millis;
use crate::traits::{Blob, BlobStore, RecordStore};
use crate::{Error, Result};

pub const ATTACHMENT_PREFIX: &str = "attachment:";

/// Largest accepted upload, 10 MiB.
pub const MAX_ATTACHMENT_SIZE: u64 = 10 * 1024 * 1024;

pub fn attachment_key(id: &str) -> String {
    format!("{ATTACHMENT_PREFIX}{id}")
}

/// An upload as received from a client.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub data: Vec<u8>,
    pub original_name: String,
    pub content_type: String,
    /// Overrides the generated `<millis>-<original_name>` id.
    pub filename: Option<String>,
}

/// Attachment blobs plus a metadata record for each one.
#[derive(Debug, Clone)]
pub struct AttachmentRepository<S> {
    store: S,
}

impl<S: RecordStore + BlobStore> AttachmentRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Store the blob and its metadata. `origin` is the scheme and host the
    /// download url is built on, e.g. `https://mail.example.com`.
    ///
    /// Oversized uploads fail before anything is written.
    pub async fn upload(&self, upload: NewAttachment, origin: &str) -> Result<AttachmentMeta> {
        let size = upload.data.len() as u64;
        if size > MAX_ATTACHMENT_SIZE {
            return Err(Error::TooLarge {
                size,
                limit: MAX_ATTACHMENT_SIZE,
            });
        }

        let id = match upload.filename.as_deref().map(str::trim) {
            Some(filename) if !filename.is_empty() => sanitize_id(filename),
            _ => sanitize_id(&format!("{}-{}", now_millis(), upload.original_name)),
        };
        let url = download_url(origin, &id)?;

        self.store
            .put_blob(
                &id,
                Blob {
                    data: upload.data,
                    content_type: upload.content_type.clone(),
                    filename: upload.original_name.clone(),
                },
            )
            .await?;

        let meta = AttachmentMeta {
            id,
            original_name: upload.original_name,
            content_type: upload.content_type,
            size,
            uploaded_at: Utc::now(),
            url,
        };
        self.store
            .put(&attachment_key(&meta.id), &serde_json::to_string(&meta)?)
            .await?;

        debug!(id = %meta.id, size, "stored attachment");
        Ok(meta)
    }

    pub async fn get(&self, id: &str) -> Result<Blob> {
        self.store
            .get_blob(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Remove the blob and its metadata. Either may already be gone.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete_blob(id).await?;
        self.store.delete(&attachment_key(id)).await
    }

    /// Metadata for every attachment, in id order.
    pub async fn list(&self) -> Result<Vec<AttachmentMeta>> {
        let keys = self.store.list(ATTACHMENT_PREFIX).await?;
        let mut attachments = Vec::with_capacity(keys.len());

        for key in keys {
            let Some(value) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str(&value) {
                Ok(meta) => attachments.push(meta),
                Err(source) => return Err(Error::Parse { key, source }),
            }
        }

        Ok(attachments)
    }
}

/// Ids end up as a single url path segment, so `.` and `..` are not allowed either.
fn sanitize_id(id: &str) -> String {
    match id {
        "." => "_".to_string(),
        ".." => "__".to_string(),
        _ => id.replace(['/', '\\'], "_"),
    }
}

fn download_url(origin: &str, id: &str) -> Result<String> {
    let mut url = Url::parse(origin).map_err(|e| Error::InvalidOrigin(format!("{origin}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::InvalidOrigin(origin.to_string()))?
        .pop_if_empty()
        .extend(["api", "attachments", id]);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn upload(name: &str, data: &[u8]) -> NewAttachment {
        NewAttachment {
            data: data.to_vec(),
            original_name: name.to_string(),
            content_type: "text/plain".to_string(),
            filename: None,
        }
    }

    #[tokio::test]
    async fn test_upload_get_list_delete() {
        let store = MemoryStore::new();
        let repo = AttachmentRepository::new(store.clone());

        let meta = repo
            .upload(upload("notes.txt", b"hello"), "http://localhost:3000")
            .await
            .unwrap();

        assert!(meta.id.ends_with("-notes.txt"));
        assert_eq!(meta.size, 5);
        assert_eq!(
            meta.url,
            format!("http://localhost:3000/api/attachments/{}", meta.id)
        );

        let blob = repo.get(&meta.id).await.unwrap();
        assert_eq!(blob.data, b"hello");
        assert_eq!(blob.filename, "notes.txt");

        assert_eq!(repo.list().await.unwrap(), vec![meta.clone()]);

        repo.delete(&meta.id).await.unwrap();
        assert!(matches!(repo.get(&meta.id).await, Err(Error::NotFound(_))));
        assert!(repo.list().await.unwrap().is_empty());
        assert!(store.get(&attachment_key(&meta.id)).await.unwrap().is_none());

        repo.delete(&meta.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_filename_override_and_sanitizing() {
        let repo = AttachmentRepository::new(MemoryStore::new());
        let mut new = upload("report.pdf", b"%PDF");
        new.filename = Some("../q3 report.pdf".to_string());

        let meta = repo.upload(new, "https://mail.example.com/").await.unwrap();

        assert_eq!(meta.id, ".._q3 report.pdf");
        assert_eq!(
            meta.url,
            "https://mail.example.com/api/attachments/.._q3%20report.pdf"
        );
    }

    #[tokio::test]
    async fn test_dot_segment_override_stays_addressable() {
        let repo = AttachmentRepository::new(MemoryStore::new());

        for (filename, id) in [(".", "_"), ("..", "__")] {
            let mut new = upload("notes.txt", b"hello");
            new.filename = Some(filename.to_string());

            let meta = repo.upload(new, "http://localhost:3000").await.unwrap();

            assert_eq!(meta.id, id);
            assert_eq!(
                meta.url,
                format!("http://localhost:3000/api/attachments/{id}")
            );
            assert_eq!(repo.get(id).await.unwrap().data, b"hello");
        }
    }

    #[tokio::test]
    async fn test_oversized_upload_writes_nothing() {
        let store = MemoryStore::new();
        let repo = AttachmentRepository::new(store.clone());
        let data = vec![0u8; MAX_ATTACHMENT_SIZE as usize + 1];

        let result = repo
            .upload(upload("big.bin", &data), "http://localhost:3000")
            .await;

        assert!(matches!(result, Err(Error::TooLarge { .. })));
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exactly_max_size_is_accepted() {
        let repo = AttachmentRepository::new(MemoryStore::new());
        let data = vec![0u8; MAX_ATTACHMENT_SIZE as usize];

        let meta = repo
            .upload(upload("edge.bin", &data), "http://localhost:3000")
            .await
            .unwrap();
        assert_eq!(meta.size, MAX_ATTACHMENT_SIZE);
    }

    #[tokio::test]
    async fn test_invalid_origin() {
        let repo = AttachmentRepository::new(MemoryStore::new());
        let result = repo.upload(upload("a.txt", b"a"), "not a url").await;
        assert!(matches!(result, Err(Error::InvalidOrigin(_))));
    }
}
