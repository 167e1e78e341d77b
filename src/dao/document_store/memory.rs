//! Process-local document store used for development runs and tests.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};

use super::{Document, DocumentChange, DocumentPath, DocumentStore, DocumentSubscription};
use crate::dao::storage::{StorageError, StorageResult};

const CHANGE_CAPACITY: usize = 32;
const SUBSCRIPTION_BUFFER: usize = 16;

/// In-memory store with the same observable semantics as the remote backends:
/// upserts, whole-field updates and live subscriptions per document.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<DashMap<DocumentPath, Slot>>,
}

struct Slot {
    value: Option<Document>,
    changes: broadcast::Sender<Option<Document>>,
}

impl Slot {
    fn new() -> Self {
        let (changes, _receiver) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            value: None,
            changes,
        }
    }

    /// Store `value` and notify watchers while the slot is still locked so
    /// subscribers observe writes in the order they were applied.
    fn publish(&mut self, value: Option<Document>) {
        self.value = value.clone();
        let _ = self.changes.send(value);
    }
}

/// Receiving end of one subscription. Once dropped, the slot of a document
/// that does not exist is removed if nobody else watches it.
struct Watch {
    store: MemoryDocumentStore,
    path: DocumentPath,
    changes: Option<broadcast::Receiver<Option<Document>>>,
}

impl Watch {
    async fn recv(&mut self) -> Result<Option<Document>, RecvError> {
        match self.changes.as_mut() {
            Some(changes) => changes.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.changes.take();
        self.store.documents.remove_if(&self.path, |_, slot| {
            slot.value.is_none() && slot.changes.receiver_count() == 0
        });
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self, path: &DocumentPath) -> Option<Document> {
        self.documents
            .get(path)
            .and_then(|slot| slot.value.clone())
    }

    /// Write a document synchronously, notifying subscribers.
    #[cfg(test)]
    pub fn insert(&self, path: DocumentPath, document: Document) {
        self.documents
            .entry(path)
            .or_insert_with(Slot::new)
            .publish(Some(document));
    }

    /// Remove a document, notifying subscribers that it is gone.
    #[cfg(test)]
    pub fn delete(&self, path: &DocumentPath) {
        if let Some(mut slot) = self.documents.get_mut(path) {
            slot.publish(None);
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn create(&self, path: DocumentPath, document: Document) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .documents
                .entry(path)
                .or_insert_with(Slot::new)
                .publish(Some(document));
            Ok(())
        })
    }

    fn get_once(&self, path: DocumentPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.current(&path)) })
    }

    fn update_field(
        &self,
        path: DocumentPath,
        field: String,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let missing = || StorageError::Missing {
                collection: path.collection.clone(),
                id: path.id.clone(),
            };
            let mut slot = store.documents.get_mut(&path).ok_or_else(missing)?;
            let mut document = slot.value.clone().ok_or_else(missing)?;
            document.insert(field, value);
            slot.publish(Some(document));
            Ok(())
        })
    }

    fn subscribe(
        &self,
        path: DocumentPath,
    ) -> BoxFuture<'static, StorageResult<DocumentSubscription>> {
        let store = self.clone();
        Box::pin(async move {
            let (initial, changes) = {
                let slot = store
                    .documents
                    .entry(path.clone())
                    .or_insert_with(Slot::new);
                (slot.value.clone(), slot.changes.subscribe())
            };
            let mut watch = Watch {
                store: store.clone(),
                path: path.clone(),
                changes: Some(changes),
            };

            let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
            let listener = tokio::spawn(async move {
                if tx.send(Ok(initial.into())).await.is_err() {
                    return;
                }

                loop {
                    let change = match watch.recv().await {
                        Ok(value) => value,
                        // Skipped intermediate states; resync on the latest one.
                        Err(RecvError::Lagged(_)) => store.current(&path),
                        Err(RecvError::Closed) => break,
                    };

                    if tx.send(Ok(change.into())).await.is_err() {
                        break;
                    }
                }
            });

            Ok(DocumentSubscription::new(rx, listener))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
