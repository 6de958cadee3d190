use async_trait::async_trait;
use bytes::Bytes;

use crate::{BlobId, BlobResult};

/// Blob storage primitives the uploader is built on
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `key`, replacing nothing (keys are never reused)
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult>;

    /// Resolve a publicly retrievable URL for a stored object
    async fn resolve_url(&self, key: &str) -> BlobResult<String>;
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Strategy for generating blob keys
pub trait BlobKeyStrategy: Send + Sync {
    /// Generate the object key for a new blob
    fn object_key(&self, prefix: &str, blob_id: &BlobId, content_type: &str) -> String;
}

/// Default key strategy: `<prefix>/<blob_id>.<ext>`
#[derive(Debug, Clone, Default)]
pub struct DefaultKeyStrategy;

impl BlobKeyStrategy for DefaultKeyStrategy {
    fn object_key(&self, prefix: &str, blob_id: &BlobId, content_type: &str) -> String {
        let prefix = prefix.trim_matches('/');
        let ext = extension_for(content_type);
        if prefix.is_empty() {
            format!("{}.{}", blob_id, ext)
        } else {
            format!("{}/{}.{}", prefix, blob_id, ext)
        }
    }
}

/// File extension for a content type, ignoring any parameters
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/heic" => "heic",
        "image/heif" => "heif",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}
