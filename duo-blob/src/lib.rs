//! # duo-blob: image uploads for the Duo feed
//!
//! `duo-blob` turns raw image bytes into a publicly retrievable URL. Each
//! upload gets a collision-free key (`images/<uuid>.<ext>`), is written to a
//! [`BlobStore`], and then has its URL resolved.
//!
//! ```text
//! ┌─────────────────┐
//! │  PostRepository │  ← joins two uploads, writes the post
//! ├─────────────────┤
//! │   BlobUploader  │  ← key assignment, timeouts, error mapping
//! ├─────────────────┤
//! │    BlobStore    │  ← storage primitives (put, resolve_url)
//! └─────────────────┘
//! ```
//!
//! ```rust
//! use duo_blob::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> UploadResult<()> {
//! let uploader = BlobUploader::new(MemoryBlobStore::new(), UploadConfig::default());
//! let receipt = uploader.upload(Bytes::from_static(b"\xff\xd8\xff"), "image/jpeg").await?;
//! assert!(receipt.key.starts_with("images/"));
//! assert!(receipt.key.ends_with(".jpg"));
//! # Ok(())
//! # }
//! ```
//!
//! Uploads are not transactional: an upload that fails while resolving its URL
//! leaves the written object behind.

mod config;
mod error;
mod memory;
mod receipt;
pub mod store;
mod types;
mod uploader;

pub use config::UploadConfig;
pub use error::{BlobError, BlobResult, UploadError, UploadFailureReason, UploadResult};
pub use memory::{MemoryBlobStore, StoredBlob};
pub use receipt::BlobReceipt;
pub use store::{extension_for, BlobKeyStrategy, BlobStore, DefaultKeyStrategy, PutResult};
pub use types::BlobId;
pub use uploader::BlobUploader;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobError, BlobReceipt, BlobResult, BlobStore, BlobUploader, MemoryBlobStore,
        UploadConfig, UploadError, UploadResult,
    };
}
