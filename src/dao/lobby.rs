use std::sync::Arc;

use serde_json::Value;

use crate::dao::{
    document_store::{DocumentPath, DocumentStore, DocumentSubscription},
    models::{LobbyEntity, Players, to_document},
    storage::{StorageError, StorageResult},
};

/// Name of the lobby field rewritten by join and leave.
pub const PLAYERS_FIELD: &str = "players";

/// Data Access Object for lobby documents stored in a single flat collection.
#[derive(Clone)]
pub struct LobbyRepository {
    store: Arc<dyn DocumentStore>,
    collection: Arc<str>,
}

impl LobbyRepository {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    fn path(&self, id: &str) -> DocumentPath {
        DocumentPath::new(self.collection.as_ref(), id)
    }

    /// Write a freshly created lobby, replacing any document under the same id.
    pub async fn create(&self, lobby: &LobbyEntity) -> StorageResult<()> {
        let document = to_document(lobby).map_err(|source| StorageError::Encode {
            collection: self.collection.to_string(),
            id: lobby.id.clone(),
            source,
        })?;
        self.store.create(self.path(&lobby.id), document).await
    }

    /// Overwrite the whole players map; concurrent writers are last-write-wins.
    pub async fn replace_players(&self, id: &str, players: &Players) -> StorageResult<()> {
        let value = players
            .iter()
            .map(|(uid, username)| (uid.clone(), Value::String(username.clone())))
            .collect();
        self.store
            .update_field(self.path(id), PLAYERS_FIELD.to_string(), Value::Object(value))
            .await
    }

    /// Open a live subscription on one lobby document.
    pub async fn watch(&self, id: &str) -> StorageResult<DocumentSubscription> {
        self.store.subscribe(self.path(id)).await
    }
}
