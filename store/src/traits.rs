use crate::Result;
use std::future::Future;

/// A flat, namespaced key-value collection of string values.
///
/// Every returned future is `Send` so callers can hold them across await
/// points inside multi-threaded runtimes.
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Short backend name, reported by diagnostics.
    fn backend(&self) -> &'static str;

    /// Write `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Write `value` under `key` only if the key is free.
    ///
    /// Returns `false` and leaves the stored value untouched when the key exists.
    fn insert(&self, key: &str, value: &str) -> impl Future<Output = Result<bool>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// All keys starting with `prefix`, in ascending byte order.
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// An opaque binary object plus the HTTP metadata needed to serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub content_type: String,
    /// Name the blob was uploaded with, used for `Content-Disposition`.
    pub filename: String,
}

pub trait BlobStore: Clone + Send + Sync + 'static {
    fn put_blob(&self, key: &str, blob: Blob) -> impl Future<Output = Result<()>> + Send;

    fn get_blob(&self, key: &str) -> impl Future<Output = Result<Option<Blob>>> + Send;

    /// Remove a blob. Removing an absent blob succeeds.
    fn delete_blob(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}
