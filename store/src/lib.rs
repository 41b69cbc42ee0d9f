//! Key-value backed storage for kvmail.
//!
//! [`RecordStore`] and [`BlobStore`] are the storage seams; [`MemoryStore`]
//! and [`PgStore`] implement both. [`EmailRepository`] and
//! [`AttachmentRepository`] own the key scheme on top of them:
//!
//! - `email:<millis>` holds one JSON email record
//! - `attachment:<id>` holds the metadata for the blob stored under `<id>`
//! - `session:<token>` is used by the HTTP layer for login sessions

mod attachment;
mod email;
mod error;
mod id;
mod memory;
mod postgres;
mod traits;

pub use attachment::{
    ATTACHMENT_PREFIX, AttachmentRepository, MAX_ATTACHMENT_SIZE, NewAttachment, attachment_key,
};
pub use email::{
    DEFAULT_PAGE_SIZE, EMAIL_PREFIX, EmailRepository, MAX_PAGE_SIZE, PageRequest, email_key,
    id_millis,
};
pub use error::{Error, Result};
pub use id::{IdGenerator, now_millis};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::{Blob, BlobStore, RecordStore};
