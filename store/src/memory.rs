//! In-process store used by tests and when no database is configured.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Result;
use crate::traits::{Blob, BlobStore, RecordStore};

/// Clones share the same underlying maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<BTreeMap<String, String>>>,
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn insert(&self, key: &str, value: &str) -> Result<bool> {
        match self.records.write().await.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(value.to_string());
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let keys = records
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(keys)
    }
}

impl BlobStore for MemoryStore {
    async fn put_blob(&self, key: &str, blob: Blob) -> Result<()> {
        self.blobs.write().await.insert(key.to_string(), blob);
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> Result<Option<Blob>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn delete_blob(&self, key: &str) -> Result<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_by_prefix_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        for key in ["email:3", "attachment:a", "email:1", "emails", "email:2", "f"] {
            store.put(key, "{}").await.unwrap();
        }

        let keys = store.list("email:").await.unwrap();
        assert_eq!(keys, vec!["email:1", "email:2", "email:3"]);
        assert!(store.list("nothing:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_does_not_overwrite() {
        let store = MemoryStore::new();
        assert!(store.insert("k", "first").await.unwrap());
        assert!(!store.insert("k", "second").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));

        store.put("k", "third").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let store = MemoryStore::new();
        store.delete("missing").await.unwrap();
        store.delete_blob("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone
            .put_blob(
                "b",
                Blob {
                    data: vec![1, 2, 3],
                    content_type: "application/octet-stream".to_string(),
                    filename: "b.bin".to_string(),
                },
            )
            .await
            .unwrap();

        let blob = store.get_blob("b").await.unwrap().unwrap();
        assert_eq!(blob.data, vec![1, 2, 3]);
    }
}
