use std::fmt;
use std::time::Duration;

use duo_blob::UploadError;
use thiserror::Error;

/// Result type for document store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for [`crate::PostRepository::create`]
pub type CreateResult<T> = Result<T, CreatePostError>;

/// Errors reported by a [`crate::DocumentStore`].
///
/// `Transport` is what a live watch yields when its connection hiccups; the
/// watch itself stays open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("Watch transport error: {0}")]
    Transport(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn write_rejected(msg: impl Into<String>) -> Self {
        Self::WriteRejected(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// A stored record that does not decode into a [`crate::Post`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed post record {id}: {message}")]
pub struct DecodeError {
    pub id: String,
    pub message: String,
}

impl DecodeError {
    pub fn new(id: impl Into<String>, message: impl ToString) -> Self {
        Self {
            id: id.into(),
            message: message.to_string(),
        }
    }
}

/// Which of the two images of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    /// Back camera, stored as `imageUrlBack`
    Primary,
    /// Front camera, stored as `imageUrlFront`
    Secondary,
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSlot::Primary => f.write_str("primary"),
            ImageSlot::Secondary => f.write_str("secondary"),
        }
    }
}

/// Coarse classification of a [`CreatePostError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreatePostFailure {
    InvalidInput,
    ImageUploadFailed,
    PersistFailed,
}

/// Failure of a post submission. Nothing was written to the post collection;
/// images uploaded before the failure are not removed.
#[derive(Error, Debug)]
pub enum CreatePostError {
    #[error("Invalid post: {0}")]
    InvalidInput(String),

    #[error("Failed to upload {slot} image: {source}")]
    ImageUploadFailed {
        slot: ImageSlot,
        #[source]
        source: UploadError,
    },

    #[error("Failed to save post: {source}")]
    PersistFailed {
        #[source]
        source: StoreError,
    },
}

impl CreatePostError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn reason(&self) -> CreatePostFailure {
        match self {
            Self::InvalidInput(_) => CreatePostFailure::InvalidInput,
            Self::ImageUploadFailed { .. } => CreatePostFailure::ImageUploadFailed,
            Self::PersistFailed { .. } => CreatePostFailure::PersistFailed,
        }
    }
}

impl From<StoreError> for CreatePostError {
    fn from(source: StoreError) -> Self {
        Self::PersistFailed { source }
    }
}
