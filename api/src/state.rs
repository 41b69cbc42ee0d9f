use kvmail_store::{AttachmentRepository, BlobStore, EmailRepository, RecordStore};
use std::sync::Arc;

use crate::config::Config;
use crate::mailer::Mailer;

/// A storage backend the HTTP layer can run on.
pub trait Backend: RecordStore + BlobStore {}

impl<T: RecordStore + BlobStore> Backend for T {}

#[derive(Debug, Clone)]
pub struct AppState<S, M> {
    pub store: S,
    pub emails: EmailRepository<S>,
    pub attachments: AttachmentRepository<S>,
    pub mailer: M,
    pub config: Arc<Config>,
}

impl<S: Backend, M: Mailer> AppState<S, M> {
    pub fn new(store: S, mailer: M, config: Config) -> Self {
        Self {
            emails: EmailRepository::new(store.clone()),
            attachments: AttachmentRepository::new(store.clone()),
            store,
            mailer,
            config: Arc::new(config),
        }
    }
}
