use std::sync::Arc;

use bytes::Bytes;
use duo_blob::{BlobReceipt, BlobUploader, UploadResult};
use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::{
    decode_snapshot, BoxStream, CreatePostError, CreateResult, DocumentStore, DocumentWrite,
    FeedConfig, FeedSnapshot, ImageSlot, Post, PostId, StoreError, StoreResult,
    FIELD_DESCRIPTION, FIELD_IMAGE_URL_BACK, FIELD_IMAGE_URL_FRONT, FIELD_TIMESTAMP,
};

/// Live feed: a fresh, newest-first snapshot after every change to the collection
pub type PostStream = BoxStream<FeedSnapshot>;

/// Owns the post collection: submits new posts and watches the feed.
///
/// Construct one per application and share it; every call to
/// [`PostRepository::subscribe`] opens its own backend watch.
pub struct PostRepository {
    uploader: Arc<BlobUploader>,
    store: Arc<dyn DocumentStore>,
    config: FeedConfig,
}

impl PostRepository {
    pub fn new<S: DocumentStore + 'static>(uploader: BlobUploader, store: S, config: FeedConfig) -> Self {
        Self::from_arcs(Arc::new(uploader), Arc::new(store), config)
    }

    pub fn from_arcs(
        uploader: Arc<BlobUploader>,
        store: Arc<dyn DocumentStore>,
        config: FeedConfig,
    ) -> Self {
        Self {
            uploader,
            store,
            config,
        }
    }

    /// Upload both images concurrently, then write the post.
    ///
    /// The write only happens once both uploads have settled and succeeded.
    /// If either upload fails the whole call fails; the other image, if it
    /// made it, stays in blob storage.
    #[instrument(skip(self, primary, secondary), fields(collection = %self.config.collection))]
    pub async fn create(&self, description: &str, primary: Bytes, secondary: Bytes) -> CreateResult<Post> {
        if description.trim().is_empty() {
            return Err(CreatePostError::invalid("description is empty"));
        }
        if primary.is_empty() {
            return Err(CreatePostError::invalid("primary image is empty"));
        }
        if secondary.is_empty() {
            return Err(CreatePostError::invalid("secondary image is empty"));
        }

        let content_type = self.config.image_content_type.as_str();
        let (primary, secondary) = tokio::join!(
            self.uploader.upload(primary, content_type),
            self.uploader.upload(secondary, content_type),
        );
        let (primary, secondary) = joined_uploads(primary, secondary)?;

        let write = DocumentWrite::new()
            .with_field(FIELD_DESCRIPTION, description)
            .with_field(FIELD_IMAGE_URL_BACK, primary.url.as_str())
            .with_field(FIELD_IMAGE_URL_FRONT, secondary.url.as_str())
            .with_server_timestamp(FIELD_TIMESTAMP);

        let receipt = match timeout(
            self.config.write_timeout,
            self.store.add_document(&self.config.collection, write),
        )
        .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                warn!("Error saving post: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Timed out saving post after {:?}", self.config.write_timeout);
                return Err(StoreError::Timeout(self.config.write_timeout).into());
            }
        };

        // Committed from here on; the post is built from what was sent.
        let post = Post {
            id: PostId::from_string(receipt.id),
            description: description.to_string(),
            primary_image_url: primary.url,
            secondary_image_url: Some(secondary.url),
            created_at: receipt.server_time,
        };

        info!("Successfully created post {}", post.id);
        Ok(post)
    }

    /// Open a live, newest-first view of the collection.
    ///
    /// Records that fail to decode are left out of each snapshot. Transport
    /// errors reported by the watch are logged and the stream keeps going;
    /// it ends only when dropped.
    pub async fn subscribe(&self) -> StoreResult<PostStream> {
        let mut snapshots = self
            .store
            .watch(&self.config.collection, FIELD_TIMESTAMP, true)
            .await?;
        let collection = self.config.collection.clone();

        let stream = async_stream::stream! {
            while let Some(item) = snapshots.next().await {
                match item {
                    Ok(documents) => yield decode_snapshot(&documents),
                    Err(e) => warn!("Error getting posts from {}: {}", collection, e),
                }
            }
        };

        Ok(Box::pin(stream))
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

/// Combine the outcomes of both uploads, reporting the primary failure first
fn joined_uploads(
    primary: UploadResult<BlobReceipt>,
    secondary: UploadResult<BlobReceipt>,
) -> CreateResult<(BlobReceipt, BlobReceipt)> {
    match (primary, secondary) {
        (Ok(primary), Ok(secondary)) => Ok((primary, secondary)),
        (Err(source), other) => {
            match other {
                Ok(orphan) => warn!("One or more images failed to upload; leaving {}", orphan.key),
                Err(e) => warn!("Both images failed to upload; secondary: {}", e),
            }
            Err(CreatePostError::ImageUploadFailed {
                slot: ImageSlot::Primary,
                source,
            })
        }
        (Ok(orphan), Err(source)) => {
            warn!("One or more images failed to upload; leaving {}", orphan.key);
            Err(CreatePostError::ImageUploadFailed {
                slot: ImageSlot::Secondary,
                source,
            })
        }
    }
}
