//! Lobby membership flows: create, observe with auto-join, and leave.
//!
//! Every roster change is computed from the last observed snapshot and
//! written back as a whole `players` field. Two clients acting on the same
//! snapshot race and the later write wins; nothing here merges or retries.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        document_store::{DocumentStore, DocumentSubscription},
        lobby::LobbyRepository,
        models::{LobbyEntity, Players, now_millis},
        profile::ProfileRepository,
    },
    dto::lobby::{CreateLobbyRequest, LeaveResponse, LobbyCreated},
    error::ServiceError,
    services::{
        join_code::{generate_join_code, is_valid_join_code},
        lobby_view::LEFT_MESSAGE,
        profile_service::resolve_username,
    },
    state::{
        SharedState,
        lobby::{
            Identity, LobbySnapshot, UNKNOWN_HOST, UNKNOWN_PLAYER, with_player, without_player,
        },
    },
};

/// Message shown when a lobby cannot be created from the provided input.
pub const CREATE_REJECTED_MESSAGE: &str =
    "Please enter a bet title and ensure you are logged in.";

/// Result of reacting to one observed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Nothing written: the viewer is anonymous or already listed.
    Unchanged,
    /// The viewer was added; `players` is the roster that was written.
    Joined { username: String, players: Players },
}

/// Presentation-side lobby logic bound to one document store.
#[derive(Clone)]
pub struct LobbyController {
    lobbies: LobbyRepository,
    profiles: ProfileRepository,
}

impl LobbyController {
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        Self {
            lobbies: LobbyRepository::new(store.clone(), config.lobby_collection()),
            profiles: ProfileRepository::new(store, config.app_id()),
        }
    }

    /// Create a lobby hosted by `identity`, seeded with the host as its only player.
    ///
    /// Input is checked before any store call. The write is not rolled back
    /// on failure; it may or may not have landed.
    pub async fn create_lobby(
        &self,
        identity: Option<&Identity>,
        bet_title: &str,
    ) -> Result<LobbyEntity, ServiceError> {
        let Some(host) = identity else {
            return Err(ServiceError::Unauthorized(CREATE_REJECTED_MESSAGE.into()));
        };
        if bet_title.trim().is_empty() {
            return Err(ServiceError::InvalidInput(CREATE_REJECTED_MESSAGE.into()));
        }

        let host_username = resolve_username(&self.profiles, &host.uid, UNKNOWN_HOST).await;
        let lobby = LobbyEntity {
            id: Uuid::new_v4().to_string(),
            bet_title: bet_title.to_string(),
            host_uid: host.uid.clone(),
            host_username: host_username.clone(),
            join_code: generate_join_code(),
            players: Players::from([(host.uid.clone(), host_username)]),
            created_at: now_millis(),
        };

        if let Err(source) = self.lobbies.create(&lobby).await {
            warn!(lobby_id = %lobby.id, error = %source, "error creating lobby");
            return Err(ServiceError::WriteFailed {
                action: "Error creating lobby",
                source,
            });
        }

        info!(
            lobby_id = %lobby.id,
            join_code = %lobby.join_code,
            host_uid = %lobby.host_uid,
            "lobby created"
        );
        Ok(lobby)
    }

    /// Live subscription on a lobby: current state first, then every change.
    pub async fn subscribe(&self, lobby_id: &str) -> Result<DocumentSubscription, ServiceError> {
        self.lobbies.watch(lobby_id).await.map_err(|err| {
            warn!(lobby_id = %lobby_id, error = %err, "error listening to lobby");
            err.into()
        })
    }

    /// Whether observing `snapshot` obliges `viewer` to join.
    pub fn needs_join(snapshot: &LobbySnapshot, viewer: Option<&Identity>) -> bool {
        viewer.is_some_and(|viewer| !snapshot.has_player(&viewer.uid))
    }

    /// React to an observed snapshot by adding the viewer when absent.
    ///
    /// Writes `observed players + {viewer: username}` in one field update. The
    /// snapshot produced by that write lists the viewer, so observing it again
    /// is a no-op.
    pub async fn auto_join(
        &self,
        snapshot: &LobbySnapshot,
        viewer: Option<&Identity>,
    ) -> Result<JoinOutcome, ServiceError> {
        if !is_valid_join_code(&snapshot.join_code) {
            debug!(lobby_id = %snapshot.id, join_code = %snapshot.join_code, "lobby has a malformed join code");
        }

        let Some(viewer) = viewer.filter(|viewer| !snapshot.has_player(&viewer.uid)) else {
            return Ok(JoinOutcome::Unchanged);
        };

        let username = resolve_username(&self.profiles, &viewer.uid, UNKNOWN_PLAYER).await;
        let players = with_player(&snapshot.players, &viewer.uid, &username);

        if let Err(err) = self.lobbies.replace_players(&snapshot.id, &players).await {
            warn!(lobby_id = %snapshot.id, uid = %viewer.uid, error = %err, "failed to auto-join lobby");
            return Err(err.into());
        }

        info!(lobby_id = %snapshot.id, uid = %viewer.uid, "joined lobby");
        Ok(JoinOutcome::Joined { username, players })
    }

    /// Remove `identity` from the last observed roster and write it back.
    pub async fn leave(
        &self,
        lobby_id: &str,
        players: &Players,
        identity: &Identity,
    ) -> Result<Players, ServiceError> {
        let remaining = without_player(players, &identity.uid);

        if let Err(err) = self.lobbies.replace_players(lobby_id, &remaining).await {
            warn!(lobby_id = %lobby_id, uid = %identity.uid, error = %err, "error leaving lobby");
            return Err(err.into());
        }

        info!(lobby_id = %lobby_id, uid = %identity.uid, "left lobby");
        Ok(remaining)
    }
}

/// Create a lobby on behalf of the caller.
pub async fn create_lobby(
    state: &SharedState,
    identity: Option<&Identity>,
    request: CreateLobbyRequest,
) -> Result<LobbyCreated, ServiceError> {
    let controller = state.lobby_controller().await?;
    let lobby = controller.create_lobby(identity, &request.bet_title).await?;
    Ok(LobbyCreated::from(&lobby))
}

/// Leave the lobby watched by view `session_id` and close that view.
pub async fn leave_session(
    state: &SharedState,
    session_id: Uuid,
    identity: &Identity,
) -> Result<LeaveResponse, ServiceError> {
    let view = state
        .view(session_id)
        .ok_or_else(|| ServiceError::NotFound(format!("lobby session `{session_id}` not found")))?;

    let remaining = view.leave(identity).await?;
    state.remove_view(session_id);

    Ok(LeaveResponse::new(view.lobby_id(), &remaining, LEFT_MESSAGE))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        dao::{
            document_store::{DocumentChange, DocumentPath, testing::RecordingStore},
            lobby::PLAYERS_FIELD,
        },
        services::join_code::JOIN_CODE_LENGTH,
    };

    const LOBBIES: &str = "betLobbies";

    fn players(entries: &[(&str, &str)]) -> Players {
        entries
            .iter()
            .map(|(uid, name)| (uid.to_string(), name.to_string()))
            .collect()
    }

    fn players_value(entries: &[(&str, &str)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(uid, name)| (uid.to_string(), Value::String(name.to_string())))
                .collect(),
        )
    }

    fn controller(store: &RecordingStore) -> LobbyController {
        LobbyController::new(Arc::new(store.clone()), &AppConfig::default())
    }

    fn seed_profile(store: &RecordingStore, uid: &str, username: &str) {
        let profiles = ProfileRepository::new(Arc::new(store.clone()), AppConfig::default().app_id());
        let Value::Object(document) = json!({"username": username}) else {
            unreachable!()
        };
        store.seed(profiles.path(uid), document);
    }

    async fn snapshot_of(store: &RecordingStore, lobby_id: &str) -> LobbySnapshot {
        let document = store
            .get_once(DocumentPath::new(LOBBIES, lobby_id))
            .await
            .unwrap()
            .expect("lobby document exists");
        LobbySnapshot::decode(lobby_id, &document)
    }

    #[tokio::test]
    async fn create_seeds_host_as_sole_player() {
        let store = RecordingStore::new();
        seed_profile(&store, "U1", "zach");
        let host = Identity::new("U1");

        let lobby = controller(&store)
            .create_lobby(Some(&host), "Super Bowl Squares")
            .await
            .unwrap();

        assert_eq!(lobby.players, players(&[("U1", "zach")]));
        assert_eq!(lobby.host_username, "zach");
        assert_eq!(lobby.join_code.len(), JOIN_CODE_LENGTH);
        assert!(is_valid_join_code(&lobby.join_code));
        assert_eq!(store.creates().len(), 1);
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn create_uses_placeholder_for_host_without_username() {
        let store = RecordingStore::new();
        let lobby = controller(&store)
            .create_lobby(Some(&Identity::new("U9")), "Darts")
            .await
            .unwrap();

        assert_eq!(lobby.host_username, UNKNOWN_HOST);
        assert_eq!(lobby.players, players(&[("U9", UNKNOWN_HOST)]));
    }

    #[tokio::test]
    async fn create_rejects_blank_title_or_missing_identity_without_writing() {
        let store = RecordingStore::new();
        let controller = controller(&store);

        let err = controller
            .create_lobby(Some(&Identity::new("U1")), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(ref m) if m == CREATE_REJECTED_MESSAGE));

        let err = controller.create_lobby(None, "Darts").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        assert!(store.creates().is_empty());
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn create_surfaces_write_failure() {
        let store = RecordingStore::new();
        store.fail_writes(true);

        let err = controller(&store)
            .create_lobby(Some(&Identity::new("U1")), "Darts")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Error creating lobby: "));
    }

    #[tokio::test]
    async fn auto_join_is_a_no_op_when_viewer_is_listed() {
        let store = RecordingStore::new();
        let snapshot = LobbySnapshot::decode(
            "l1",
            &json!({"betTitle": "t", "joinCode": "ABCDEF", "players": {"A": "alice"}})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let outcome = controller(&store)
            .auto_join(&snapshot, Some(&Identity::new("A")))
            .await
            .unwrap();

        assert_eq!(outcome, JoinOutcome::Unchanged);
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn auto_join_is_a_no_op_for_anonymous_viewers() {
        let store = RecordingStore::new();
        let snapshot = LobbySnapshot::decode("l1", &Default::default());

        let outcome = controller(&store).auto_join(&snapshot, None).await.unwrap();

        assert_eq!(outcome, JoinOutcome::Unchanged);
        assert!(store.updates().is_empty());
        assert!(!LobbyController::needs_join(&snapshot, None));
    }

    #[tokio::test]
    async fn auto_join_writes_observed_roster_plus_viewer_once() {
        let store = RecordingStore::new();
        seed_profile(&store, "B", "bob");
        let controller = controller(&store);
        let host = Identity::new("A");
        let lobby = controller.create_lobby(Some(&host), "t").await.unwrap();
        let snapshot = snapshot_of(&store, &lobby.id).await;

        let outcome = controller
            .auto_join(&snapshot, Some(&Identity::new("B")))
            .await
            .unwrap();

        let expected = players(&[("A", UNKNOWN_HOST), ("B", "bob")]);
        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                username: "bob".into(),
                players: expected.clone(),
            }
        );
        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].path, DocumentPath::new(LOBBIES, lobby.id.clone()));
        assert_eq!(updates[0].field, PLAYERS_FIELD);
        assert_eq!(
            updates[0].value,
            players_value(&[("A", UNKNOWN_HOST), ("B", "bob")])
        );

        // Observing the resulting snapshot does not write again.
        let after = snapshot_of(&store, &lobby.id).await;
        assert_eq!(after.players, expected);
        let outcome = controller
            .auto_join(&after, Some(&Identity::new("B")))
            .await
            .unwrap();
        assert_eq!(outcome, JoinOutcome::Unchanged);
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test]
    async fn auto_join_uses_placeholder_username() {
        let store = RecordingStore::new();
        let controller = controller(&store);
        let lobby = controller
            .create_lobby(Some(&Identity::new("A")), "t")
            .await
            .unwrap();
        let snapshot = snapshot_of(&store, &lobby.id).await;

        let outcome = controller
            .auto_join(&snapshot, Some(&Identity::new("C")))
            .await
            .unwrap();

        let JoinOutcome::Joined { username, .. } = outcome else {
            panic!("expected a join");
        };
        assert_eq!(username, UNKNOWN_PLAYER);
    }

    #[tokio::test]
    async fn auto_join_on_deleted_lobby_fails_without_recreating_it() {
        let store = RecordingStore::new();
        let snapshot = LobbySnapshot::decode(
            "gone",
            &json!({"players": {"A": "alice"}}).as_object().cloned().unwrap(),
        );

        let err = controller(&store)
            .auto_join(&snapshot, Some(&Identity::new("B")))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(
            store
                .get_once(DocumentPath::new(LOBBIES, "gone"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn leave_writes_observed_roster_minus_identity_once() {
        let store = RecordingStore::new();
        let controller = controller(&store);
        let lobby = controller
            .create_lobby(Some(&Identity::new("A")), "t")
            .await
            .unwrap();
        let observed = players(&[("A", "alice"), ("B", "bob"), ("C", "carol")]);

        let remaining = controller
            .leave(&lobby.id, &observed, &Identity::new("B"))
            .await
            .unwrap();

        assert_eq!(remaining, players(&[("A", "alice"), ("C", "carol")]));
        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].field, PLAYERS_FIELD);
        assert_eq!(
            updates[0].value,
            players_value(&[("A", "alice"), ("C", "carol")])
        );
    }

    #[tokio::test]
    async fn leave_surfaces_write_failure() {
        let store = RecordingStore::new();
        let controller = controller(&store);
        let lobby = controller
            .create_lobby(Some(&Identity::new("A")), "t")
            .await
            .unwrap();
        store.fail_writes(true);

        let err = controller
            .leave(&lobby.id, &players(&[("A", "alice")]), &Identity::new("A"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    /// Joins computed from the same snapshot overwrite each other: the roster
    /// ends up with only the last writer, never the union.
    #[tokio::test]
    async fn concurrent_joins_from_same_snapshot_lose_an_update() {
        let store = RecordingStore::new();
        seed_profile(&store, "B", "bob");
        seed_profile(&store, "C", "carol");
        let controller = controller(&store);
        let Value::Object(document) = json!({
            "betTitle": "t",
            "joinCode": "ABCDEF",
            "players": {"A": "alice"},
        }) else {
            unreachable!()
        };
        store.seed(DocumentPath::new(LOBBIES, "l1"), document);
        let stale = snapshot_of(&store, "l1").await;

        let (bob, carol) = (Identity::new("B"), Identity::new("C"));
        let (b, c) = tokio::join!(
            controller.auto_join(&stale, Some(&bob)),
            controller.auto_join(&stale, Some(&carol)),
        );
        b.unwrap();
        c.unwrap();

        let after = snapshot_of(&store, "l1").await;
        let with_b = players(&[("A", "alice"), ("B", "bob")]);
        let with_c = players(&[("A", "alice"), ("C", "carol")]);
        assert!(
            after.players == with_b || after.players == with_c,
            "unexpected roster {:?}",
            after.players
        );
        assert_eq!(after.players.len(), 2);
        assert_eq!(store.updates().len(), 2);
    }

    #[tokio::test]
    async fn subscribing_to_unknown_lobby_reports_absence_only() {
        let store = RecordingStore::new();
        let mut subscription = controller(&store).subscribe("missing").await.unwrap();

        let first = subscription.next().await.unwrap().unwrap();
        assert_eq!(first, DocumentChange::Absent);

        let next = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            subscription.next(),
        )
        .await;
        assert!(next.is_err(), "no further change expected");
    }

    #[tokio::test]
    async fn state_level_calls_fail_while_degraded() {
        let state = crate::state::AppState::new(AppConfig::default());
        let err = create_lobby(
            &state,
            Some(&Identity::new("U1")),
            CreateLobbyRequest {
                bet_title: "Darts".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn leaving_an_unknown_session_is_not_found() {
        let state = crate::state::AppState::new(AppConfig::default());
        state
            .set_document_store(Arc::new(RecordingStore::new()))
            .await;

        let err = leave_session(&state, Uuid::new_v4(), &Identity::new("U1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
