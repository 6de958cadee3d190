use std::sync::Arc;

use bytes::Bytes;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::{
    BlobId, BlobKeyStrategy, BlobReceipt, BlobStore, DefaultKeyStrategy, UploadConfig,
    UploadError, UploadResult,
};

/// Uploads single images and hands back a retrievable URL.
///
/// Every call writes exactly one new object; there is no dedup and no retry.
pub struct BlobUploader {
    store: Arc<dyn BlobStore>,
    keys: Arc<dyn BlobKeyStrategy>,
    config: UploadConfig,
}

impl BlobUploader {
    pub fn new<S: BlobStore + 'static>(store: S, config: UploadConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    /// Share a store that is also used elsewhere (tests, admin tooling)
    pub fn from_arc(store: Arc<dyn BlobStore>, config: UploadConfig) -> Self {
        Self {
            store,
            keys: Arc::new(DefaultKeyStrategy),
            config,
        }
    }

    pub fn with_key_strategy<K: BlobKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Write `payload` under a fresh key and resolve its public URL
    #[instrument(skip(self, payload), fields(size = payload.len()))]
    pub async fn upload(&self, payload: Bytes, content_type: &str) -> UploadResult<BlobReceipt> {
        if payload.is_empty() {
            return Err(UploadError::EmptyPayload);
        }
        let size = payload.len() as u64;
        if size > self.config.max_blob_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.config.max_blob_bytes,
            });
        }

        let blob_id = BlobId::new();
        let key = self
            .keys
            .object_key(&self.config.key_prefix, &blob_id, content_type);

        let put = match timeout(
            self.config.write_timeout,
            self.store.put(&key, Some(content_type), payload),
        )
        .await
        {
            Ok(Ok(put)) => put,
            Ok(Err(e)) => {
                warn!("Error uploading image {}: {}", key, e);
                return Err(UploadError::write_failed(key, e));
            }
            Err(_) => {
                warn!("Timed out uploading image {}", key);
                return Err(UploadError::write_failed(
                    key,
                    format!("timed out after {:?}", self.config.write_timeout),
                ));
            }
        };

        // The object stays behind if this step fails.
        let url = match timeout(self.config.url_timeout, self.store.resolve_url(&key)).await {
            Ok(Ok(url)) if url.trim().is_empty() => {
                warn!("Store returned an empty download URL for {}", key);
                return Err(UploadError::url_resolution_failed(key, "empty URL"));
            }
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                warn!("Error getting download URL for {}: {}", key, e);
                return Err(UploadError::url_resolution_failed(key, e));
            }
            Err(_) => {
                warn!("Timed out getting download URL for {}", key);
                return Err(UploadError::url_resolution_failed(
                    key,
                    format!("timed out after {:?}", self.config.url_timeout),
                ));
            }
        };

        debug!("Uploaded image {} ({} bytes)", key, put.size_bytes);

        let mut receipt = BlobReceipt::new(blob_id, key, url, put.size_bytes)
            .with_content_type(content_type);
        if let Some(etag) = put.etag {
            receipt = receipt.with_etag(etag);
        }
        Ok(receipt)
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }
}
