//! Live view of one lobby for one viewer.
//!
//! A view owns the document subscription and a pump task. Each snapshot is
//! cached and broadcast to listeners. A joiner task follows the cache and
//! answers the newest snapshot that lacks the viewer with a join write, one
//! write at a time. Dropping the view stops the pump and with it the
//! subscription; a join already in flight still completes.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{DocumentChange, DocumentSubscription},
        models::Players,
    },
    error::ServiceError,
    services::lobby_service::{JoinOutcome, LobbyController},
    state::lobby::{Identity, LobbySnapshot},
};

/// Shown when the watched lobby does not exist or disappears.
pub const LOBBY_GONE_MESSAGE: &str = "Lobby not found or deleted.";
/// Shown once the viewer has left the lobby.
pub const LEFT_MESSAGE: &str = "Left lobby.";

/// Something a lobby view wants its listeners to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// Latest state of the lobby.
    Snapshot(LobbySnapshot),
    /// Transient message; the view keeps running.
    Notice(String),
    /// The lobby is gone. Terminal.
    Ended,
    /// The subscription failed. Terminal.
    Failed(String),
    /// The viewer left the lobby. Terminal.
    Left,
}

impl LobbyEvent {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LobbyEvent::Ended | LobbyEvent::Failed(_) | LobbyEvent::Left)
    }
}

struct Shared {
    lobby_id: String,
    viewer: Option<Identity>,
    controller: Arc<LobbyController>,
    events: broadcast::Sender<LobbyEvent>,
    latest: watch::Receiver<Option<LobbySnapshot>>,
    ended: AtomicBool,
    leaving: AtomicBool,
}

impl Shared {
    fn emit(&self, event: LobbyEvent) {
        // No listener attached is fine; the cache still holds the state.
        let _ = self.events.send(event);
    }
}

/// One viewer's open lobby screen.
pub struct LobbyView {
    session_id: Uuid,
    shared: Arc<Shared>,
    pump: JoinHandle<()>,
}

impl LobbyView {
    /// Subscribe to `lobby_id` and start reacting to its changes.
    ///
    /// The returned receiver is attached before the first snapshot is pumped,
    /// so it observes every event of the view.
    pub async fn open(
        controller: Arc<LobbyController>,
        lobby_id: String,
        viewer: Option<Identity>,
        capacity: usize,
    ) -> Result<(Arc<Self>, broadcast::Receiver<LobbyEvent>), ServiceError> {
        let subscription = controller.subscribe(&lobby_id).await?;
        let (events, receiver) = broadcast::channel(capacity);
        let (cache, latest) = watch::channel(None);

        let shared = Arc::new(Shared {
            lobby_id,
            viewer,
            controller,
            events,
            latest,
            ended: AtomicBool::new(false),
            leaving: AtomicBool::new(false),
        });
        if shared.viewer.is_some() {
            // Exits once the pump drops `cache`.
            tokio::spawn(run_joiner(shared.clone(), shared.latest.clone()));
        }
        let pump = tokio::spawn(run_pump(shared.clone(), subscription, cache));

        let view = Arc::new(Self {
            session_id: Uuid::new_v4(),
            shared,
            pump,
        });
        debug!(
            session_id = %view.session_id,
            lobby_id = %view.shared.lobby_id,
            "lobby view opened"
        );
        Ok((view, receiver))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn lobby_id(&self) -> &str {
        &self.shared.lobby_id
    }

    pub fn viewer(&self) -> Option<&Identity> {
        self.shared.viewer.as_ref()
    }

    /// Most recent snapshot observed by this view.
    pub fn latest(&self) -> Option<LobbySnapshot> {
        self.shared.latest.borrow().clone()
    }

    /// Remove the viewer from the lobby and close the view.
    ///
    /// The roster written is the last observed one minus the viewer. On
    /// failure a notice is emitted and the view stays open.
    pub async fn leave(&self, identity: &Identity) -> Result<Players, ServiceError> {
        if self.shared.viewer.as_ref() != Some(identity) {
            return Err(ServiceError::Unauthorized(
                "only the viewing player can leave this lobby".into(),
            ));
        }
        if self.shared.ended.load(Ordering::SeqCst) {
            return Err(ServiceError::InvalidInput(
                "lobby no longer exists".into(),
            ));
        }
        let Some(snapshot) = self.latest() else {
            return Err(ServiceError::InvalidInput(
                "lobby has not been loaded yet".into(),
            ));
        };

        // Keep the joiner from re-joining on the snapshot our own write produces.
        self.shared.leaving.store(true, Ordering::SeqCst);
        match self
            .shared
            .controller
            .leave(&self.shared.lobby_id, &snapshot.players, identity)
            .await
        {
            Ok(remaining) => {
                self.pump.abort();
                self.shared.emit(LobbyEvent::Left);
                Ok(remaining)
            }
            Err(err) => {
                self.shared.leaving.store(false, Ordering::SeqCst);
                self.shared.emit(LobbyEvent::Notice(format!(
                    "Error leaving lobby: {}",
                    err.user_message()
                )));
                Err(err)
            }
        }
    }
}

impl Drop for LobbyView {
    fn drop(&mut self) {
        self.pump.abort();
        debug!(session_id = %self.session_id, "lobby view closed");
    }
}

async fn run_pump(
    shared: Arc<Shared>,
    mut subscription: DocumentSubscription,
    cache: watch::Sender<Option<LobbySnapshot>>,
) {
    loop {
        let change = match subscription.next().await {
            Some(Ok(change)) => change,
            Some(Err(err)) => {
                warn!(lobby_id = %shared.lobby_id, error = %err, "error listening to lobby");
                shared.emit(LobbyEvent::Failed(format!("Error listening to lobby: {err}")));
                return;
            }
            None => {
                warn!(lobby_id = %shared.lobby_id, "lobby subscription closed");
                shared.emit(LobbyEvent::Failed(
                    "Error listening to lobby: subscription closed".into(),
                ));
                return;
            }
        };

        let DocumentChange::Snapshot(document) = change else {
            info!(lobby_id = %shared.lobby_id, "lobby not found or deleted");
            shared.ended.store(true, Ordering::SeqCst);
            cache.send_replace(None);
            shared.emit(LobbyEvent::Ended);
            subscription.cancel();
            return;
        };

        let snapshot = LobbySnapshot::decode(&shared.lobby_id, &document);
        cache.send_replace(Some(snapshot.clone()));
        shared.emit(LobbyEvent::Snapshot(snapshot));
    }
}

/// Answer cached snapshots lacking the viewer with join writes.
///
/// Snapshots cached while a write is in flight collapse into the newest one,
/// which is checked as soon as the write returns.
async fn run_joiner(shared: Arc<Shared>, mut latest: watch::Receiver<Option<LobbySnapshot>>) {
    while latest.changed().await.is_ok() {
        let Some(snapshot) = latest.borrow_and_update().clone() else {
            continue;
        };
        if shared.leaving.load(Ordering::SeqCst)
            || !LobbyController::needs_join(&snapshot, shared.viewer.as_ref())
        {
            continue;
        }
        join(&shared, snapshot).await;
    }
}

/// Add the viewer to the roster of `snapshot` and report the outcome.
async fn join(shared: &Shared, snapshot: LobbySnapshot) {
    let outcome = shared
        .controller
        .auto_join(&snapshot, shared.viewer.as_ref())
        .await;

    match outcome {
        Ok(JoinOutcome::Joined { .. }) => {
            shared.emit(LobbyEvent::Notice(format!(
                "Joined lobby: {}",
                snapshot.bet_title
            )));
        }
        Ok(JoinOutcome::Unchanged) => {}
        Err(err) => {
            shared.emit(LobbyEvent::Notice(format!(
                "Failed to auto-join lobby: {}",
                err.user_message()
            )));
        }
    }
}
