use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{LobbyEntity, Players},
    dto::format_epoch_millis,
    state::lobby::LobbySnapshot,
};

/// Payload used to open a new bet lobby.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyRequest {
    #[serde(default)]
    pub bet_title: String,
}

/// Identifiers handed back to the host after creation.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LobbyCreated {
    pub lobby_id: String,
    /// Six-character code shared with other players.
    pub join_code: String,
}

impl From<&LobbyEntity> for LobbyCreated {
    fn from(lobby: &LobbyEntity) -> Self {
        Self {
            lobby_id: lobby.id.clone(),
            join_code: lobby.join_code.clone(),
        }
    }
}

/// One roster entry, in join order.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct PlayerSummary {
    pub uid: String,
    pub username: String,
}

fn summarize_players(players: &Players) -> Vec<PlayerSummary> {
    players
        .iter()
        .map(|(uid, username)| PlayerSummary {
            uid: uid.clone(),
            username: username.clone(),
        })
        .collect()
}

/// Rendered lobby state pushed on every observed change.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LobbyState {
    pub lobby_id: String,
    pub bet_title: String,
    pub join_code: String,
    pub host_uid: Option<String>,
    pub host_username: Option<String>,
    pub players: Vec<PlayerSummary>,
    /// RFC 3339 creation time, when the lobby carries one.
    pub created_at: Option<String>,
}

impl From<&LobbySnapshot> for LobbyState {
    fn from(snapshot: &LobbySnapshot) -> Self {
        Self {
            lobby_id: snapshot.id.clone(),
            bet_title: snapshot.bet_title.clone(),
            join_code: snapshot.join_code.clone(),
            host_uid: snapshot.host_uid.clone(),
            host_username: snapshot.host_username.clone(),
            players: summarize_players(&snapshot.players),
            created_at: snapshot.created_at.map(format_epoch_millis),
        }
    }
}

/// First event of every lobby stream.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandshake {
    /// Handle used to leave the lobby from this view.
    pub session_id: Uuid,
    pub lobby_id: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

/// User-visible message attached to `notice`, `lobby_ended`, `error` and `left` events.
#[derive(Debug, Serialize, ToSchema)]
pub struct NoticeEvent {
    pub message: String,
}

impl NoticeEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of a successful leave.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub lobby_id: String,
    /// Roster written back to the lobby.
    pub players: Vec<PlayerSummary>,
    pub message: String,
}

impl LeaveResponse {
    pub fn new(lobby_id: &str, players: &Players, message: &str) -> Self {
        Self {
            lobby_id: lobby_id.to_string(),
            players: summarize_players(players),
            message: message.to_string(),
        }
    }
}
