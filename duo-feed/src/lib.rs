//! # duo-feed: dual-image posts and a live feed
//!
//! A post is a caption plus two photos (back and front camera). Submitting one
//! uploads both images concurrently through [`duo_blob::BlobUploader`], waits
//! for both, then writes a single document. Reading the feed is a standing
//! watch that yields the whole collection, newest first, after every change.
//!
//! ```text
//! caller ──create──▶ PostRepository ──2× upload──▶ BlobUploader ──▶ BlobStore
//!                          │
//!                          └──add_document──▶ DocumentStore ──watch──▶ FeedSyncSession ──▶ UI
//! ```
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use duo_feed::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let uploader = BlobUploader::new(MemoryBlobStore::new(), UploadConfig::default());
//! let repository = Arc::new(PostRepository::new(
//!     uploader,
//!     MemoryDocumentStore::new(),
//!     FeedConfig::default(),
//! ));
//!
//! let session = FeedSyncSession::new(repository.clone());
//! session.start().await?;
//!
//! let post = repository
//!     .create("Lunch", Bytes::from_static(b"back"), Bytes::from_static(b"front"))
//!     .await?;
//!
//! let mut updates = session.updates();
//! updates.wait_for(|posts| posts.first().map(|p| &p.id) == Some(&post.id)).await?;
//! session.stop().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod document;
mod error;
mod memory;
mod post;
mod repository;
mod session;

pub use config::FeedConfig;
pub use document::{
    BoxStream, DocumentStore, DocumentWrite, RawDocument, SnapshotStream, WriteReceipt,
};
pub use error::{
    CreatePostError, CreatePostFailure, CreateResult, DecodeError, ImageSlot, StoreError,
    StoreResult,
};
pub use memory::MemoryDocumentStore;
pub use post::{
    decode_post, decode_snapshot, FeedSnapshot, Post, PostId, PostRecord, FIELD_DESCRIPTION,
    FIELD_IMAGE_URL_BACK, FIELD_IMAGE_URL_FRONT, FIELD_TIMESTAMP,
};
pub use repository::{PostRepository, PostStream};
pub use session::{FeedSyncSession, SharedPosts};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CreatePostError, DocumentStore, FeedConfig, FeedSnapshot, FeedSyncSession,
        MemoryDocumentStore, Post, PostId, PostRepository, StoreError,
    };
    pub use duo_blob::{BlobUploader, MemoryBlobStore, UploadConfig};
}
