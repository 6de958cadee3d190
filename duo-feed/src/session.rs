use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Post, PostRepository, PostStream, StoreResult};

/// Latest published feed; each value is a separate allocation that is never
/// mutated after it is sent
pub type SharedPosts = Arc<Vec<Post>>;

/// Handle for the background task draining the subscription
struct SyncHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

/// Keeps one live subscription open and exposes its latest snapshot.
///
/// The background task is the only writer; readers get immutable snapshots
/// through [`FeedSyncSession::current_posts`] or [`FeedSyncSession::updates`].
pub struct FeedSyncSession {
    repository: Arc<PostRepository>,
    posts: Arc<watch::Sender<SharedPosts>>,
    worker: Mutex<Option<SyncHandle>>,
}

impl FeedSyncSession {
    pub fn new(repository: Arc<PostRepository>) -> Self {
        let (posts, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            repository,
            posts: Arc::new(posts),
            worker: Mutex::new(None),
        }
    }

    /// Open the subscription. Does nothing if it is already open.
    pub async fn start(&self) -> StoreResult<()> {
        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.as_ref() {
            if !handle.join_handle.is_finished() {
                debug!("Feed sync already running");
                return Ok(());
            }
        }

        let stream = self.repository.subscribe().await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = tokio::spawn(run_sync(stream, self.posts.clone(), shutdown_rx));

        *worker = Some(SyncHandle {
            shutdown_tx,
            join_handle,
        });
        info!("Started feed sync on {}", self.repository.config().collection);
        Ok(())
    }

    /// Close the subscription. Once this returns nothing more is published
    /// until [`FeedSyncSession::start`] is called again. The last snapshot
    /// stays readable.
    pub async fn stop(&self) {
        let handle = self.worker.lock().await.take();
        let Some(handle) = handle else {
            return;
        };

        let _ = handle.shutdown_tx.send(());
        if let Err(e) = handle.join_handle.await {
            warn!("Feed sync task join error: {}", e);
        }
        info!("Stopped feed sync");
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.join_handle.is_finished())
    }

    /// Latest snapshot, empty until the first one arrives
    pub fn current_posts(&self) -> SharedPosts {
        self.posts.borrow().clone()
    }

    /// Receiver that is notified whenever a new snapshot is published
    pub fn updates(&self) -> watch::Receiver<SharedPosts> {
        self.posts.subscribe()
    }
}

impl Drop for FeedSyncSession {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            handle.join_handle.abort();
        }
    }
}

async fn run_sync(
    mut stream: PostStream,
    posts: Arc<watch::Sender<SharedPosts>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                debug!("Feed sync received shutdown");
                break;
            }
            next = stream.next() => match next {
                Some(snapshot) => {
                    if snapshot.skipped > 0 {
                        debug!("Skipped {} malformed posts", snapshot.skipped);
                    }
                    posts.send_replace(Arc::new(snapshot.posts));
                }
                None => {
                    warn!("Post subscription ended");
                    break;
                }
            }
        }
    }
}
