use serde_json::Value;

use crate::dao::{document_store::Document, models::Players};

/// Placeholder title shown when a snapshot lacks a usable `betTitle`.
pub const UNKNOWN_BET: &str = "Unknown Bet";
/// Placeholder join code shown when a snapshot lacks a usable `joinCode`.
pub const UNKNOWN_JOIN_CODE: &str = "N/A";
/// Username recorded for a host whose profile has no username.
pub const UNKNOWN_HOST: &str = "Unknown Host";
/// Username recorded for a joining player whose profile has no username.
pub const UNKNOWN_PLAYER: &str = "Unknown Player";

/// Authenticated caller as asserted by the upstream identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub uid: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// One observed state of a lobby, decoded leniently.
///
/// Absent or wrongly typed fields fall back to placeholder values instead of
/// failing: a malformed lobby still renders and can still be joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySnapshot {
    pub id: String,
    pub bet_title: String,
    pub join_code: String,
    pub host_uid: Option<String>,
    pub host_username: Option<String>,
    pub players: Players,
    pub created_at: Option<i64>,
}

impl LobbySnapshot {
    pub fn decode(id: &str, document: &Document) -> Self {
        Self {
            id: id.to_string(),
            bet_title: string_field(document, "betTitle").unwrap_or_else(|| UNKNOWN_BET.into()),
            join_code: string_field(document, "joinCode")
                .unwrap_or_else(|| UNKNOWN_JOIN_CODE.into()),
            host_uid: string_field(document, "hostUid"),
            host_username: string_field(document, "hostUsername"),
            players: decode_players(document.get("players")),
            created_at: document.get("createdAt").and_then(Value::as_i64),
        }
    }

    pub fn has_player(&self, uid: &str) -> bool {
        self.players.contains_key(uid)
    }
}

fn string_field(document: &Document, key: &str) -> Option<String> {
    document
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Entries whose username is not a string are dropped.
fn decode_players(value: Option<&Value>) -> Players {
    let Some(Value::Object(entries)) = value else {
        return Players::new();
    };

    entries
        .iter()
        .filter_map(|(uid, username)| {
            username
                .as_str()
                .map(|username| (uid.clone(), username.to_string()))
        })
        .collect()
}

/// Roster equal to `players` plus `uid`, computed from a possibly stale read.
pub fn with_player(players: &Players, uid: &str, username: &str) -> Players {
    let mut next = players.clone();
    next.insert(uid.to_string(), username.to_string());
    next
}

/// Roster equal to `players` minus `uid`, preserving the order of the rest.
pub fn without_player(players: &Players, uid: &str) -> Players {
    let mut next = players.clone();
    next.shift_remove(uid);
    next
}
