mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchDocumentStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::Conflict { doc_id } => {
                let (collection, id) = models::split_doc_id(&doc_id);
                StorageError::Conflict { collection, id }
            }
            CouchDaoError::Missing { doc_id } => {
                let (collection, id) = models::split_doc_id(&doc_id);
                StorageError::Missing { collection, id }
            }
            CouchDaoError::NotAnObject { doc_id } => {
                let (collection, id) = models::split_doc_id(&doc_id);
                StorageError::NotAnObject { collection, id }
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
