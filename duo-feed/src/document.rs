use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{StoreError, StoreResult};

/// Type alias for boxed streams (stable Rust compatible)
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// One emission of a live watch: the full ordered collection, or a transport error
pub type SnapshotStream = BoxStream<Result<Vec<RawDocument>, StoreError>>;

/// A record as the document store holds it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// What the store assigned to a newly added document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub id: String,
    /// Value written into every requested server-timestamp field
    pub server_time: DateTime<Utc>,
}

/// Fields of a document about to be added.
///
/// Names listed as server timestamps are filled in by the store at write time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    pub fields: Map<String, Value>,
    pub server_timestamps: Vec<String>,
}

impl DocumentWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_server_timestamp<K: Into<String>>(mut self, name: K) -> Self {
        self.server_timestamps.push(name.into());
        self
    }
}

/// Document database primitives the post repository is built on
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Add a new document; the store assigns its id and server timestamps.
    /// `Ok` means the document is committed.
    async fn add_document(&self, collection: &str, write: DocumentWrite) -> StoreResult<WriteReceipt>;

    /// Watch a collection ordered by `order_field`.
    ///
    /// The stream yields the complete ordered collection after every change,
    /// starting with the current contents, until it is dropped.
    async fn watch(
        &self,
        collection: &str,
        order_field: &str,
        descending: bool,
    ) -> StoreResult<SnapshotStream>;
}
