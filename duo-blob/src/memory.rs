use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{BlobError, BlobResult, BlobStore, PutResult};

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// In-memory blob store for tests and local development
#[derive(Clone)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<HashMap<String, StoredBlob>>>,
    base_url: String,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://blobs")
    }

    /// URLs are resolved as `<base_url>/<key>`
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.read().get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult> {
        let size_bytes = body.len() as u64;
        self.objects.write().insert(
            key.to_string(),
            StoredBlob {
                body,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn resolve_url(&self, key: &str) -> BlobResult<String> {
        if !self.objects.read().contains_key(key) {
            return Err(BlobError::not_found(key));
        }
        Ok(format!("{}/{}", self.base_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_resolve() {
        let store = MemoryBlobStore::with_base_url("https://cdn.example.com/");
        let put = store
            .put("images/a.jpg", Some("image/jpeg"), Bytes::from_static(b"abc"))
            .await
            .unwrap();

        assert_eq!(put.size_bytes, 3);
        assert_eq!(
            store.resolve_url("images/a.jpg").await.unwrap(),
            "https://cdn.example.com/images/a.jpg"
        );
        assert_eq!(
            store.get("images/a.jpg").unwrap().content_type.as_deref(),
            Some("image/jpeg")
        );
    }

    #[tokio::test]
    async fn resolve_unknown_key_fails() {
        let store = MemoryBlobStore::new();
        let err = store.resolve_url("images/missing.jpg").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound { .. }));
    }
}
