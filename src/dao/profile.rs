use std::sync::Arc;

use crate::dao::{
    document_store::{Document, DocumentPath, DocumentStore},
    models::{ProfileEntity, to_document},
    storage::{StorageError, StorageResult},
};

const PROFILE_DOCUMENT_ID: &str = "userInfo";

/// Data Access Object for per-user profile documents, scoped under the application id.
#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
    app_id: Arc<str>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn DocumentStore>, app_id: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            app_id: app_id.into(),
        }
    }

    /// `artifacts/{app_id}/users/{uid}/profile` / `userInfo`.
    pub fn path(&self, uid: &str) -> DocumentPath {
        DocumentPath::new(
            format!("artifacts/{}/users/{}/profile", self.app_id, uid),
            PROFILE_DOCUMENT_ID,
        )
    }

    /// Raw profile document, `None` when the user never saved one.
    pub async fn find(&self, uid: &str) -> StorageResult<Option<Document>> {
        self.store.get_once(self.path(uid)).await
    }

    pub async fn save(&self, uid: &str, profile: &ProfileEntity) -> StorageResult<()> {
        let path = self.path(uid);
        let document = to_document(profile).map_err(|source| StorageError::Encode {
            collection: path.collection.clone(),
            id: path.id.clone(),
            source,
        })?;
        self.store.create(path, document).await
    }
}
