use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Barrier;
use tokio_test::assert_ok;
use tracing_test::traced_test;

use duo_blob::{
    BlobError, BlobResult, BlobStore, BlobUploader, MemoryBlobStore, PutResult, UploadConfig,
    UploadFailureReason,
};
use duo_feed::{
    CreatePostError, CreatePostFailure, DocumentStore, DocumentWrite, FeedConfig, ImageSlot,
    MemoryDocumentStore, PostId, PostRepository, SnapshotStream, StoreError, StoreResult,
    WriteReceipt, FIELD_DESCRIPTION, FIELD_IMAGE_URL_BACK, FIELD_IMAGE_URL_FRONT, FIELD_TIMESTAMP,
};

const FAIL: &[u8] = b"fail";

/// Blob store that rejects any payload equal to `FAIL`
#[derive(Clone, Default)]
struct FlakyBlobStore {
    inner: MemoryBlobStore,
    barrier: Option<Arc<Barrier>>,
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, key: &str, content_type: Option<&str>, body: Bytes) -> BlobResult<PutResult> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if body.as_ref() == FAIL {
            return Err(BlobError::backend("rejected"));
        }
        self.inner.put(key, content_type, body).await
    }

    async fn resolve_url(&self, key: &str) -> BlobResult<String> {
        self.inner.resolve_url(key).await
    }
}

/// Document store whose writes always fail
#[derive(Clone, Default)]
struct ReadOnlyDocumentStore {
    inner: MemoryDocumentStore,
}

#[async_trait]
impl DocumentStore for ReadOnlyDocumentStore {
    async fn add_document(&self, _collection: &str, _write: DocumentWrite) -> StoreResult<WriteReceipt> {
        Err(StoreError::write_rejected("permission denied"))
    }

    async fn watch(&self, collection: &str, order_field: &str, descending: bool) -> StoreResult<SnapshotStream> {
        self.inner.watch(collection, order_field, descending).await
    }
}

/// Document store that acknowledges writes with an id and a time and nothing else
#[derive(Default)]
struct ReceiptOnlyDocumentStore {
    writes: Mutex<Vec<DocumentWrite>>,
}

fn server_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 11, 12, 30, 0).unwrap()
}

#[async_trait]
impl DocumentStore for ReceiptOnlyDocumentStore {
    async fn add_document(&self, _collection: &str, write: DocumentWrite) -> StoreResult<WriteReceipt> {
        self.writes.lock().push(write);
        Ok(WriteReceipt {
            id: "srv-42".to_string(),
            server_time: server_time(),
        })
    }

    async fn watch(&self, _collection: &str, _order_field: &str, _descending: bool) -> StoreResult<SnapshotStream> {
        Err(StoreError::unavailable("no watch support"))
    }
}

/// Document store whose writes never come back
#[derive(Clone, Default)]
struct StalledDocumentStore {
    inner: MemoryDocumentStore,
}

#[async_trait]
impl DocumentStore for StalledDocumentStore {
    async fn add_document(&self, _collection: &str, _write: DocumentWrite) -> StoreResult<WriteReceipt> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(StoreError::unavailable("unreachable"))
    }

    async fn watch(&self, collection: &str, order_field: &str, descending: bool) -> StoreResult<SnapshotStream> {
        self.inner.watch(collection, order_field, descending).await
    }
}

/// Blob store that writes objects but hands back a blank download URL
#[derive(Clone, Default)]
struct BlankUrlBlobStore {
    inner: MemoryBlobStore,
}

#[async_trait]
impl BlobStore for BlankUrlBlobStore {
    async fn put(&self, key: &str, content_type: Option<&str>, body: Bytes) -> BlobResult<PutResult> {
        self.inner.put(key, content_type, body).await
    }

    async fn resolve_url(&self, _key: &str) -> BlobResult<String> {
        Ok(String::new())
    }
}

fn repository_with(blobs: FlakyBlobStore, documents: MemoryDocumentStore) -> PostRepository {
    let uploader = BlobUploader::new(blobs, UploadConfig::default());
    PostRepository::new(uploader, documents, FeedConfig::default())
}

fn payload(ok: bool, tag: &'static [u8]) -> Bytes {
    if ok {
        Bytes::from_static(tag)
    } else {
        Bytes::from_static(FAIL)
    }
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("fixture must be an object"),
    }
}

#[tokio::test]
async fn create_writes_post_with_both_urls() {
    let blobs = FlakyBlobStore::default();
    let documents = MemoryDocumentStore::new();
    let repository = repository_with(blobs.clone(), documents.clone());

    let post = assert_ok!(
        repository
            .create("Lunch", Bytes::from_static(b"A"), Bytes::from_static(b"B"))
            .await
    );

    let url_of = |body: &[u8]| {
        let key = blobs
            .inner
            .keys()
            .into_iter()
            .find(|k| blobs.inner.get(k).unwrap().body.as_ref() == body)
            .unwrap();
        format!("memory://blobs/{}", key)
    };

    assert_eq!(post.description, "Lunch");
    assert_eq!(post.primary_image_url, url_of(b"A"));
    assert_eq!(post.secondary_image_url, Some(url_of(b"B")));
    assert!(!post.id.as_str().is_empty());
    assert!(post.created_at <= chrono::Utc::now());
    assert_eq!(documents.document_count("posts"), 1);
    assert_eq!(
        blobs.inner.get(&blobs.inner.keys()[0]).unwrap().content_type.as_deref(),
        Some("image/jpeg")
    );
}

#[tokio::test]
async fn create_succeeds_only_when_both_uploads_succeed() {
    for (primary_ok, secondary_ok) in [(true, true), (true, false), (false, true), (false, false)] {
        let documents = MemoryDocumentStore::new();
        let repository = repository_with(FlakyBlobStore::default(), documents.clone());

        let result = repository
            .create("Coffee", payload(primary_ok, b"back"), payload(secondary_ok, b"front"))
            .await;

        match result {
            Ok(_) => assert!(primary_ok && secondary_ok),
            Err(e) => {
                assert!(!(primary_ok && secondary_ok));
                assert_eq!(e.reason(), CreatePostFailure::ImageUploadFailed);
                let expected_slot = if primary_ok { ImageSlot::Secondary } else { ImageSlot::Primary };
                match e {
                    CreatePostError::ImageUploadFailed { slot, source } => {
                        assert_eq!(slot, expected_slot);
                        assert_eq!(source.reason(), UploadFailureReason::WriteFailed);
                    }
                    other => panic!("unexpected error: {other}"),
                }
                assert_eq!(documents.document_count("posts"), 0);
            }
        }
    }
}

#[tokio::test]
async fn failed_secondary_leaves_primary_blob_but_no_post() {
    let blobs = FlakyBlobStore::default();
    let documents = MemoryDocumentStore::new();
    let repository = repository_with(blobs.clone(), documents.clone());

    let err = repository
        .create("Lunch", Bytes::from_static(b"A"), Bytes::from_static(FAIL))
        .await
        .unwrap_err();

    assert_eq!(err.reason(), CreatePostFailure::ImageUploadFailed);
    assert_eq!(documents.document_count("posts"), 0);
    assert_eq!(blobs.inner.object_count(), 1);
}

#[tokio::test]
async fn uploads_run_concurrently() {
    // Each put waits for the other one; sequential uploads would never get past it.
    let blobs = FlakyBlobStore {
        barrier: Some(Arc::new(Barrier::new(2))),
        ..Default::default()
    };
    let repository = repository_with(blobs, MemoryDocumentStore::new());

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        repository.create("Together", Bytes::from_static(b"A"), Bytes::from_static(b"B")),
    )
    .await
    .expect("uploads did not overlap");

    assert!(result.is_ok());
}

#[tokio::test]
async fn invalid_input_touches_nothing() {
    let blobs = FlakyBlobStore::default();
    let documents = MemoryDocumentStore::new();
    let repository = repository_with(blobs.clone(), documents.clone());

    let cases = [
        ("   ", Bytes::from_static(b"A"), Bytes::from_static(b"B")),
        ("Lunch", Bytes::new(), Bytes::from_static(b"B")),
        ("Lunch", Bytes::from_static(b"A"), Bytes::new()),
    ];
    for (description, primary, secondary) in cases {
        let err = repository.create(description, primary, secondary).await.unwrap_err();
        assert_eq!(err.reason(), CreatePostFailure::InvalidInput);
    }

    assert_eq!(blobs.inner.object_count(), 0);
    assert_eq!(documents.document_count("posts"), 0);
}

#[tokio::test]
async fn rejected_write_is_persist_failed() {
    let blobs = FlakyBlobStore::default();
    let uploader = BlobUploader::new(blobs.clone(), UploadConfig::default());
    let repository = PostRepository::new(uploader, ReadOnlyDocumentStore::default(), FeedConfig::default());

    let err = repository
        .create("Lunch", Bytes::from_static(b"A"), Bytes::from_static(b"B"))
        .await
        .unwrap_err();

    assert_eq!(err.reason(), CreatePostFailure::PersistFailed);
    assert!(err.to_string().contains("permission denied"));
    assert_eq!(blobs.inner.object_count(), 2);
}

#[tokio::test]
async fn subscribe_emits_newest_first() {
    let documents = MemoryDocumentStore::new();
    let repository = repository_with(FlakyBlobStore::default(), documents);

    let mut created = Vec::new();
    for caption in ["one", "two", "three", "four"] {
        let post = repository
            .create(caption, Bytes::from_static(b"A"), Bytes::from_static(b"B"))
            .await
            .unwrap();
        created.push(post.id);
    }

    let mut feed = repository.subscribe().await.unwrap();
    let snapshot = feed.next().await.unwrap();

    created.reverse();
    let ids: Vec<_> = snapshot.posts.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, created);
    assert!(snapshot
        .posts
        .windows(2)
        .all(|w| w[0].created_at > w[1].created_at));
}

#[tokio::test]
async fn subscribe_follows_new_posts() {
    let repository = repository_with(FlakyBlobStore::default(), MemoryDocumentStore::new());
    let mut feed = repository.subscribe().await.unwrap();
    assert!(feed.next().await.unwrap().posts.is_empty());

    let post = repository
        .create("Lunch", Bytes::from_static(b"A"), Bytes::from_static(b"B"))
        .await
        .unwrap();

    let snapshot = feed.next().await.unwrap();
    assert_eq!(snapshot.posts.len(), 1);
    assert_eq!(snapshot.posts[0], post);
}

#[tokio::test]
async fn subscribe_skips_malformed_records() {
    let documents = MemoryDocumentStore::new();
    documents.insert_raw(
        "posts",
        "first",
        fields(json!({
            "description": "First",
            "imageUrlBack": "https://cdn/1b.jpg",
            "imageUrlFront": "https://cdn/1f.jpg",
            "timestamp": "2025-11-11T09:00:00Z",
        })),
    );
    documents.insert_raw(
        "posts",
        "broken",
        fields(json!({
            "imageUrlBack": "https://cdn/2b.jpg",
            "timestamp": "2025-11-11T10:00:00Z",
        })),
    );
    documents.insert_raw(
        "posts",
        "legacy",
        fields(json!({
            "description": "Legacy",
            "imageUrlBack": "https://cdn/3b.jpg",
            "timestamp": "2025-11-11T11:00:00Z",
        })),
    );
    let repository = repository_with(FlakyBlobStore::default(), documents);

    let snapshot = repository.subscribe().await.unwrap().next().await.unwrap();

    let ids: Vec<&str> = snapshot.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["legacy", "first"]);
    assert_eq!(snapshot.skipped, 1);
    assert_eq!(snapshot.posts[0].secondary_image_url, None);
}

#[tokio::test]
async fn create_trusts_the_write_receipt() {
    let blobs = FlakyBlobStore::default();
    let store = Arc::new(ReceiptOnlyDocumentStore::default());
    let repository = PostRepository::from_arcs(
        Arc::new(BlobUploader::new(blobs.clone(), UploadConfig::default())),
        store.clone(),
        FeedConfig::default(),
    );

    let post = assert_ok!(
        repository
            .create("Lunch", Bytes::from_static(b"A"), Bytes::from_static(b"B"))
            .await
    );

    assert_eq!(post.id, PostId::from("srv-42"));
    assert_eq!(post.created_at, server_time());
    assert_eq!(post.description, "Lunch");
    assert!(post.primary_image_url.starts_with("memory://blobs/images/"));
    assert_ne!(post.secondary_image_url.as_deref(), Some(post.primary_image_url.as_str()));

    let writes = store.writes.lock();
    assert_eq!(writes.len(), 1);
    let write = &writes[0];
    assert_eq!(write.fields[FIELD_DESCRIPTION], "Lunch");
    assert_eq!(write.fields[FIELD_IMAGE_URL_BACK], post.primary_image_url.as_str());
    assert_eq!(
        Some(write.fields[FIELD_IMAGE_URL_FRONT].as_str().unwrap()),
        post.secondary_image_url.as_deref()
    );
    assert_eq!(write.server_timestamps, vec![FIELD_TIMESTAMP.to_string()]);
}

#[tokio::test]
async fn blank_image_url_fails_before_the_write() {
    let blobs = BlankUrlBlobStore::default();
    let documents = MemoryDocumentStore::new();
    let repository = PostRepository::new(
        BlobUploader::new(blobs.clone(), UploadConfig::default()),
        documents.clone(),
        FeedConfig::default(),
    );

    let err = repository
        .create("Lunch", Bytes::from_static(b"A"), Bytes::from_static(b"B"))
        .await
        .unwrap_err();

    match err {
        CreatePostError::ImageUploadFailed { slot, source } => {
            assert_eq!(slot, ImageSlot::Primary);
            assert_eq!(source.reason(), UploadFailureReason::UrlResolutionFailed);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(documents.document_count("posts"), 0);
    assert_eq!(blobs.inner.object_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn stalled_write_is_persist_failed_timeout() {
    let uploader = BlobUploader::new(FlakyBlobStore::default(), UploadConfig::default());
    let repository = PostRepository::new(
        uploader,
        StalledDocumentStore::default(),
        FeedConfig::default().with_write_timeout(Duration::from_secs(2)),
    );

    let err = repository
        .create("Lunch", Bytes::from_static(b"A"), Bytes::from_static(b"B"))
        .await
        .unwrap_err();

    assert_eq!(err.reason(), CreatePostFailure::PersistFailed);
    match err {
        CreatePostError::PersistFailed { source } => {
            assert_eq!(source, StoreError::Timeout(Duration::from_secs(2)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
#[traced_test]
async fn subscribe_survives_transport_errors() {
    let documents = MemoryDocumentStore::new();
    let repository = repository_with(FlakyBlobStore::default(), documents.clone());
    let mut feed = repository.subscribe().await.unwrap();
    feed.next().await.unwrap();

    documents.inject_watch_error("posts", "connection reset");
    repository
        .create("After the blip", Bytes::from_static(b"A"), Bytes::from_static(b"B"))
        .await
        .unwrap();

    let snapshot = tokio::time::timeout(Duration::from_secs(1), feed.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.posts[0].description, "After the blip");
    assert!(logs_contain("Error getting posts"));
}

#[tokio::test]
async fn subscribe_reflects_external_deletes() {
    let documents = MemoryDocumentStore::new();
    let repository = repository_with(FlakyBlobStore::default(), documents.clone());
    let post = repository
        .create("Soon gone", Bytes::from_static(b"A"), Bytes::from_static(b"B"))
        .await
        .unwrap();

    let mut feed = repository.subscribe().await.unwrap();
    assert_eq!(feed.next().await.unwrap().posts.len(), 1);

    assert!(documents.delete_document("posts", post.id.as_str()));
    assert!(feed.next().await.unwrap().posts.is_empty());
}
