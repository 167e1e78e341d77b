#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(test)]
pub mod testing;

use std::fmt;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::dao::storage::StorageResult;

/// Raw JSON document exchanged with the store, without backend metadata.
pub type Document = Map<String, Value>;

/// Location of a single document: a collection path plus a document key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// One observed state of a watched document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    /// The document exists with the given content.
    Snapshot(Document),
    /// The document does not exist or was deleted.
    Absent,
}

impl From<Option<Document>> for DocumentChange {
    fn from(value: Option<Document>) -> Self {
        value.map_or(DocumentChange::Absent, DocumentChange::Snapshot)
    }
}

/// Live subscription to a single document.
///
/// Yields the current state first, then every later change the backend
/// reports. Dropping the subscription stops the backend listener.
pub struct DocumentSubscription {
    receiver: mpsc::Receiver<StorageResult<DocumentChange>>,
    listener: JoinHandle<()>,
}

impl DocumentSubscription {
    /// Wrap a backend listener task feeding `receiver`.
    pub fn new(
        receiver: mpsc::Receiver<StorageResult<DocumentChange>>,
        listener: JoinHandle<()>,
    ) -> Self {
        Self { receiver, listener }
    }

    /// Wait for the next change. `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<StorageResult<DocumentChange>> {
        self.receiver.recv().await
    }

    /// Stop listening for changes.
    pub fn cancel(mut self) {
        self.receiver.close();
    }
}

impl Drop for DocumentSubscription {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Abstraction over the managed document database holding lobbies and profiles.
pub trait DocumentStore: Send + Sync {
    /// Create or fully replace the document at `path`.
    fn create(&self, path: DocumentPath, document: Document) -> BoxFuture<'static, StorageResult<()>>;
    /// One-shot read; `None` when the document does not exist.
    fn get_once(&self, path: DocumentPath) -> BoxFuture<'static, StorageResult<Option<Document>>>;
    /// Replace the whole value of a single field of an existing document.
    fn update_field(
        &self,
        path: DocumentPath,
        field: String,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Push every state of the document at `path` until the subscription is dropped.
    fn subscribe(&self, path: DocumentPath)
    -> BoxFuture<'static, StorageResult<DocumentSubscription>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
