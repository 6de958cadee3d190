use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BlobId;

/// Receipt returned after an image was stored and its URL resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobReceipt {
    pub id: BlobId,
    pub key: String,
    pub url: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub etag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlobReceipt {
    pub fn new<S: Into<String>>(id: BlobId, key: String, url: S, size_bytes: u64) -> Self {
        Self {
            id,
            key,
            url: url.into(),
            size_bytes,
            content_type: "application/octet-stream".to_string(),
            etag: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }
}
