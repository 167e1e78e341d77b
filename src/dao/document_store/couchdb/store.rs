use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dao::{
    document_store::{Document, DocumentChange, DocumentPath, DocumentStore, DocumentSubscription},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{ChangesResponse, DocIdsFilter, StoredDocument, doc_id, sequence_token},
};

const CHANGES_ENDPOINT: &str = "_changes";
const SUBSCRIPTION_BUFFER: usize = 16;

/// Document store backed by a CouchDB database; live subscriptions follow the
/// `_changes` feed filtered to the watched document.
#[derive(Clone)]
pub struct CouchDocumentStore {
    client: Client,
    base_url: Arc<Url>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    longpoll_timeout_ms: u128,
}

/// Result of one `_changes` request.
struct ChangesBatch {
    changes: Vec<DocumentChange>,
    last_seq: String,
}

impl CouchDocumentStore {
    /// Build the HTTP client and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Url::parse(&config.base_url).map_err(|err| CouchDaoError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: err.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CouchDaoError::InvalidBaseUrl {
                url: config.base_url,
                reason: "URL cannot carry a path".into(),
            });
        }

        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url: Arc::new(base_url),
            database: Arc::<str>::from(config.database),
            auth,
            longpoll_timeout_ms: config.longpoll_timeout.as_millis(),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    /// URL of `segments` below the database, each segment percent-encoded
    /// (document ids embed `/` from nested collection paths).
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = (*self.base_url).clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.database).extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.url(&[]);

        let response = self
            .request(Method::GET, url.clone())
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .request(Method::PUT, url)
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document(&self, doc_id: &str) -> CouchResult<Option<StoredDocument>> {
        let response = self
            .request(Method::GET, self.url(&[doc_id]))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value = response.json::<Value>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                StoredDocument::from_value(doc_id, value).map(Some)
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document(&self, doc_id: &str, document: StoredDocument) -> CouchResult<()> {
        let response = self
            .request(Method::PUT, self.url(&[doc_id]))
            .json(&document.into_payload())
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                doc_id: doc_id.to_string(),
            }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Fetch the changes of `doc_id` after `since`. Without a sequence this is
    /// a normal feed returning the current state; with one it long-polls.
    async fn poll_changes(&self, doc_id: &str, since: Option<&str>) -> CouchResult<ChangesBatch> {
        let mut url = self.url(&[CHANGES_ENDPOINT]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("filter", "_doc_ids")
                .append_pair("include_docs", "true");
            if let Some(since) = since {
                query
                    .append_pair("feed", "longpoll")
                    .append_pair("since", since)
                    .append_pair("timeout", &self.longpoll_timeout_ms.to_string());
            }
        }

        let response = self
            .request(Method::POST, url)
            .json(&DocIdsFilter { doc_ids: [doc_id] })
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES_ENDPOINT.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES_ENDPOINT.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<ChangesResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: CHANGES_ENDPOINT.to_string(),
                source,
            }
        })?;

        let mut changes = Vec::with_capacity(payload.results.len());
        for row in payload.results {
            if let Some(change) = row.into_change()? {
                changes.push(change);
            }
        }

        Ok(ChangesBatch {
            changes,
            last_seq: sequence_token(&payload.last_seq),
        })
    }
}

impl DocumentStore for CouchDocumentStore {
    fn create(&self, path: DocumentPath, document: Document) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = doc_id(&path);
            let rev = store
                .get_document(&doc_id)
                .await?
                .and_then(|existing| existing.rev);
            store
                .put_document(&doc_id, StoredDocument { rev, body: document })
                .await
                .map_err(Into::into)
        })
    }

    fn get_once(&self, path: DocumentPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move {
            let stored = store.get_document(&doc_id(&path)).await?;
            Ok(stored.map(|doc| doc.body))
        })
    }

    fn update_field(
        &self,
        path: DocumentPath,
        field: String,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = doc_id(&path);
            let Some(mut stored) = store.get_document(&doc_id).await? else {
                return Err(CouchDaoError::Missing { doc_id }.into());
            };
            stored.body.insert(field, value);
            store
                .put_document(&doc_id, stored)
                .await
                .map_err(Into::into)
        })
    }

    fn subscribe(
        &self,
        path: DocumentPath,
    ) -> BoxFuture<'static, StorageResult<DocumentSubscription>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = doc_id(&path);
            let initial = store.poll_changes(&doc_id, None).await?;
            let current = initial
                .changes
                .last()
                .cloned()
                .unwrap_or(DocumentChange::Absent);

            let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
            let listener = tokio::spawn(async move {
                if tx.send(Ok(current)).await.is_err() {
                    return;
                }

                let mut since = initial.last_seq;
                loop {
                    match store.poll_changes(&doc_id, Some(&since)).await {
                        Ok(batch) => {
                            since = batch.last_seq;
                            for change in batch.changes {
                                if tx.send(Ok(change)).await.is_err() {
                                    debug!(doc_id = %doc_id, "subscriber gone; stopping changes feed");
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            warn!(doc_id = %doc_id, error = %err, "changes feed failed");
                            let _ = tx.send(Err(err.into())).await;
                            return;
                        }
                    }
                }
            });

            Ok(DocumentSubscription::new(rx, listener))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.url(&[]);
            let response = store
                .request(Method::GET, url.clone())
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.to_string(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url.to_string(),
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
