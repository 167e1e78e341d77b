use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A partial update targeted a document that does not exist.
    #[error("document `{collection}/{id}` does not exist")]
    Missing { collection: String, id: String },
    /// The backend rejected a write because the document changed underneath it.
    #[error("document `{collection}/{id}` was modified concurrently")]
    Conflict { collection: String, id: String },
    /// An entity could not be encoded into a document.
    #[error("failed to encode document `{collection}/{id}`")]
    Encode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    /// Stored payload is not a JSON object.
    #[error("document `{collection}/{id}` is not an object")]
    NotAnObject { collection: String, id: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
