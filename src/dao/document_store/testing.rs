//! Store wrapper recording every write, for asserting on roster updates.

use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use futures::future::BoxFuture;
use serde_json::Value;

use super::{
    Document, DocumentPath, DocumentStore, DocumentSubscription, memory::MemoryDocumentStore,
};
use crate::dao::storage::{StorageError, StorageResult};

/// A single `update_field` call as issued by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub path: DocumentPath,
    pub field: String,
    pub value: Value,
}

#[derive(Default)]
struct Log {
    creates: Mutex<Vec<DocumentPath>>,
    updates: Mutex<Vec<RecordedUpdate>>,
    reads: AtomicUsize,
    fail_writes: AtomicBool,
}

/// [`MemoryDocumentStore`] that logs calls and can be told to reject writes.
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: MemoryDocumentStore,
    log: Arc<Log>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a document without recording it as a create.
    pub fn seed(&self, path: DocumentPath, document: Document) {
        self.inner.insert(path, document);
    }

    pub fn delete(&self, path: &DocumentPath) {
        self.inner.delete(path);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.log.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn creates(&self) -> Vec<DocumentPath> {
        self.log.creates.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.log.updates.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.log.reads.load(Ordering::SeqCst)
    }

    fn rejected(&self) -> Option<StorageError> {
        self.log.fail_writes.load(Ordering::SeqCst).then(|| {
            StorageError::unavailable(
                "write rejected".into(),
                io::Error::new(io::ErrorKind::ConnectionRefused, "store offline"),
            )
        })
    }
}

impl DocumentStore for RecordingStore {
    fn create(&self, path: DocumentPath, document: Document) -> BoxFuture<'static, StorageResult<()>> {
        self.log.creates.lock().unwrap().push(path.clone());
        if let Some(err) = self.rejected() {
            return Box::pin(async move { Err(err) });
        }
        self.inner.create(path, document)
    }

    fn get_once(&self, path: DocumentPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        self.log.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_once(path)
    }

    fn update_field(
        &self,
        path: DocumentPath,
        field: String,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.log.updates.lock().unwrap().push(RecordedUpdate {
            path: path.clone(),
            field: field.clone(),
            value: value.clone(),
        });
        if let Some(err) = self.rejected() {
            return Box::pin(async move { Err(err) });
        }
        self.inner.update_field(path, field, value)
    }

    fn subscribe(
        &self,
        path: DocumentPath,
    ) -> BoxFuture<'static, StorageResult<DocumentSubscription>> {
        self.inner.subscribe(path)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
