pub mod lobby;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::document_store::DocumentStore,
    error::ServiceError,
    services::{lobby_service::LobbyController, lobby_view::LobbyView},
};

pub use self::lobby::{Identity, LobbySnapshot};

pub type SharedState = Arc<AppState>;

/// Central application state: the storage handle and the open lobby views.
pub struct AppState {
    config: AppConfig,
    document_store: RwLock<Option<Arc<dyn DocumentStore>>>,
    views: DashMap<Uuid, Arc<LobbyView>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            document_store: RwLock::new(None),
            views: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current document store, if one is installed.
    pub async fn document_store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.document_store.read().await;
        guard.as_ref().cloned()
    }

    /// Document store or [`ServiceError::Degraded`] while none is installed.
    pub async fn require_document_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.document_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new document store implementation and leave degraded mode.
    pub async fn set_document_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.document_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Lobby controller bound to the installed store.
    pub async fn lobby_controller(&self) -> Result<LobbyController, ServiceError> {
        let store = self.require_document_store().await?;
        Ok(LobbyController::new(store, &self.config))
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag, notifying watchers only when it changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Register an open lobby view under its session id.
    pub fn register_view(&self, view: Arc<LobbyView>) {
        self.views.insert(view.session_id(), view);
    }

    pub fn view(&self, session_id: Uuid) -> Option<Arc<LobbyView>> {
        self.views.get(&session_id).map(|entry| entry.value().clone())
    }

    /// Forget a view; once the last handle drops its subscription is cancelled.
    pub fn remove_view(&self, session_id: Uuid) -> Option<Arc<LobbyView>> {
        self.views.remove(&session_id).map(|(_, view)| view)
    }

    pub fn open_view_count(&self) -> usize {
        self.views.len()
    }
}
