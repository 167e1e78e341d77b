use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;
use time::OffsetDateTime;

use crate::dao::document_store::Document;

/// Lobby roster: identity (uid) to display username, in join order.
pub type Players = IndexMap<String, String>;

/// Lobby document as written at creation time.
///
/// The identifier is the document key and is not repeated in the body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LobbyEntity {
    #[serde(skip_serializing)]
    pub id: String,
    pub bet_title: String,
    pub host_uid: String,
    /// Host username copied at creation; never refreshed.
    pub host_username: String,
    pub join_code: String,
    pub players: Players,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
}

/// Per-identity profile record.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEntity {
    pub username: String,
    pub email: Option<String>,
    /// Epoch milliseconds of the first save.
    pub created_at: i64,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Encode an entity into a raw document body.
pub fn to_document<T: Serialize>(entity: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(entity)? {
        Value::Object(document) => Ok(document),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        ))),
    }
}
