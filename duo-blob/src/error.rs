use thiserror::Error;

/// Result type for blob store operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Result type for [`crate::BlobUploader::upload`]
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors reported by a [`crate::BlobStore`] backend
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {key}")]
    NotFound { key: String },

    #[error("Storage backend error: {message}")]
    Backend { message: String },

    #[error("Storage backend error: {source}")]
    Source {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BlobError {
    /// Wrap any error coming out of a storage SDK
    pub fn source<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source {
            source: Box::new(error),
        }
    }

    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }
}

/// Coarse classification of an [`UploadError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadFailureReason {
    /// The payload was rejected before touching the store
    Invalid,
    WriteFailed,
    UrlResolutionFailed,
}

/// Failure of a single image upload.
///
/// A `UrlResolutionFailed` upload has already written its object; nothing
/// removes it.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload payload is empty")]
    EmptyPayload,

    #[error("Upload payload is {size} bytes (max: {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Failed to write blob {key}: {message}")]
    WriteFailed { key: String, message: String },

    #[error("Failed to resolve URL for blob {key}: {message}")]
    UrlResolutionFailed { key: String, message: String },
}

impl UploadError {
    pub fn write_failed<K: Into<String>, M: ToString>(key: K, cause: M) -> Self {
        Self::WriteFailed {
            key: key.into(),
            message: cause.to_string(),
        }
    }

    pub fn url_resolution_failed<K: Into<String>, M: ToString>(key: K, cause: M) -> Self {
        Self::UrlResolutionFailed {
            key: key.into(),
            message: cause.to_string(),
        }
    }

    pub fn reason(&self) -> UploadFailureReason {
        match self {
            Self::EmptyPayload | Self::TooLarge { .. } => UploadFailureReason::Invalid,
            Self::WriteFailed { .. } => UploadFailureReason::WriteFailed,
            Self::UrlResolutionFailed { .. } => UploadFailureReason::UrlResolutionFailed,
        }
    }

    /// Storage key of the object involved, if the failure happened after key assignment
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::WriteFailed { key, .. } | Self::UrlResolutionFailed { key, .. } => Some(key),
            _ => None,
        }
    }
}
