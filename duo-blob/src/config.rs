use std::time::Duration;

/// Configuration for image uploads
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory-style prefix every object key starts with
    pub key_prefix: String,

    /// Absolute max size allowed for a single image (safety guard)
    pub max_blob_bytes: u64,

    /// Upper bound for the blob write
    pub write_timeout: Duration,

    /// Upper bound for resolving the public URL after a write
    pub url_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            key_prefix: "images".to_string(),
            max_blob_bytes: 32 * 1024 * 1024, // 32MB
            write_timeout: Duration::from_secs(60),
            url_timeout: Duration::from_secs(15),
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_url_timeout(mut self, timeout: Duration) -> Self {
        self.url_timeout = timeout;
        self
    }
}
