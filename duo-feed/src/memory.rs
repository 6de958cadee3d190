use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;
use uuid::Uuid;

use crate::{
    DocumentStore, DocumentWrite, RawDocument, SnapshotStream, StoreError, StoreResult, WriteReceipt,
};

#[derive(Debug, Clone)]
enum StoreEvent {
    Changed { collection: String },
    TransportError { collection: String, message: String },
}

/// In-memory document store for testing and development.
///
/// Server timestamps are strictly increasing at microsecond precision, so
/// documents written in quick succession still have a total order.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    /// collection -> documents in insertion order
    collections: Arc<RwLock<HashMap<String, Vec<RawDocument>>>>,
    last_timestamp: Arc<Mutex<DateTime<Utc>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);

        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            last_timestamp: Arc::new(Mutex::new(DateTime::<Utc>::MIN_UTC)),
            events,
        }
    }

    /// Insert a record as-is, bypassing id and timestamp assignment
    pub fn insert_raw(&self, collection: &str, id: &str, fields: Map<String, Value>) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(RawDocument::new(id, fields));
        self.notify_changed(collection);
    }

    /// Remove a record, as an external client would
    pub fn delete_document(&self, collection: &str, id: &str) -> bool {
        let removed = {
            let mut collections = self.collections.write();
            match collections.get_mut(collection) {
                Some(documents) => {
                    let before = documents.len();
                    documents.retain(|d| d.id != id);
                    documents.len() != before
                }
                None => false,
            }
        };
        if removed {
            self.notify_changed(collection);
        }
        removed
    }

    /// Make every open watch on `collection` yield a transport error
    pub fn inject_watch_error(&self, collection: &str, message: &str) {
        let _ = self.events.send(StoreEvent::TransportError {
            collection: collection.to_string(),
            message: message.to_string(),
        });
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |documents| documents.len())
    }

    /// Number of open watch streams across all collections
    pub fn watcher_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn notify_changed(&self, collection: &str) {
        // No receivers just means nobody is watching.
        let _ = self.events.send(StoreEvent::Changed {
            collection: collection.to_string(),
        });
    }

    fn next_server_time(&self) -> DateTime<Utc> {
        let mut last = self.last_timestamp.lock();
        let mut now = Utc::now().trunc_subsecs(6);
        if now <= *last {
            now = *last + TimeDelta::microseconds(1);
        }
        *last = now;
        now
    }

    /// Current ordered contents. Documents without a readable `order_field`
    /// are not part of an ordered query.
    fn snapshot(&self, collection: &str, order_field: &str, descending: bool) -> Vec<RawDocument> {
        let collections = self.collections.read();
        let Some(documents) = collections.get(collection) else {
            return Vec::new();
        };

        let mut keyed: Vec<(DateTime<Utc>, &RawDocument)> = documents
            .iter()
            .filter_map(|d| {
                let value = d.get(order_field)?.clone();
                let at = serde_json::from_value::<DateTime<Utc>>(value).ok()?;
                Some((at, d))
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| {
            let ord = a.cmp(b);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });

        keyed.into_iter().map(|(_, d)| d.clone()).collect()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add_document(&self, collection: &str, write: DocumentWrite) -> StoreResult<WriteReceipt> {
        let server_time = self.next_server_time();
        let mut fields = write.fields;
        let stamp = server_time.to_rfc3339_opts(SecondsFormat::Micros, true);
        for name in write.server_timestamps {
            fields.insert(name, Value::String(stamp.clone()));
        }

        let id = Uuid::new_v4().simple().to_string();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(RawDocument::new(id.clone(), fields));

        debug!("Added document {} to {}", id, collection);
        self.notify_changed(collection);
        Ok(WriteReceipt { id, server_time })
    }

    async fn watch(
        &self,
        collection: &str,
        order_field: &str,
        descending: bool,
    ) -> StoreResult<SnapshotStream> {
        // Subscribe before reading the first snapshot so no change slips between them.
        let mut receiver = self.events.subscribe();
        let store = self.clone();
        let collection = collection.to_string();
        let order_field = order_field.to_string();

        let stream = async_stream::stream! {
            yield Ok(store.snapshot(&collection, &order_field, descending));

            loop {
                match receiver.recv().await {
                    Ok(StoreEvent::Changed { collection: changed }) if changed == collection => {
                        yield Ok(store.snapshot(&collection, &order_field, descending));
                    }
                    Ok(StoreEvent::TransportError { collection: failed, message }) if failed == collection => {
                        yield Err(StoreError::transport(message));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        debug!("Watch on {} lagged by {} events, resending snapshot", collection, missed);
                        yield Ok(store.snapshot(&collection, &order_field, descending));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
