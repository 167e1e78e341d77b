use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::document_store::{Document, DocumentChange, DocumentPath};

use super::error::{CouchDaoError, CouchResult};

/// Separator between the collection path and the document key inside a CouchDB `_id`.
pub const ID_SEPARATOR: &str = "::";
const ID_FIELD: &str = "_id";
const REV_FIELD: &str = "_rev";

/// Flatten a collection/key pair into a single CouchDB document id.
pub fn doc_id(path: &DocumentPath) -> String {
    format!("{}{}{}", path.collection, ID_SEPARATOR, path.id)
}

/// Inverse of [`doc_id`]; ids without a separator belong to an unnamed collection.
pub fn split_doc_id(doc_id: &str) -> (String, String) {
    match doc_id.rsplit_once(ID_SEPARATOR) {
        Some((collection, id)) => (collection.to_string(), id.to_string()),
        None => (String::new(), doc_id.to_string()),
    }
}

/// Document body as stored in CouchDB: user fields plus the `_rev` metadata.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub rev: Option<String>,
    pub body: Document,
}

impl StoredDocument {
    /// Split CouchDB metadata away from the user fields.
    pub fn from_value(doc_id: &str, value: Value) -> CouchResult<Self> {
        let Value::Object(mut body) = value else {
            return Err(CouchDaoError::NotAnObject {
                doc_id: doc_id.to_string(),
            });
        };

        body.remove(ID_FIELD);
        let rev = match body.remove(REV_FIELD) {
            Some(Value::String(rev)) => Some(rev),
            _ => None,
        };

        Ok(Self { rev, body })
    }

    /// Body sent on PUT, carrying the revision we are replacing if any.
    pub fn into_payload(self) -> Document {
        let mut payload = self.body;
        if let Some(rev) = self.rev {
            payload.insert(REV_FIELD.to_string(), Value::String(rev));
        }
        payload
    }
}

/// Request body restricting a `_changes` feed to a set of documents.
#[derive(Debug, Serialize)]
pub struct DocIdsFilter<'a> {
    pub doc_ids: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

impl ChangeRow {
    /// Convert a feed row into a document state; rows without a body are skipped.
    pub fn into_change(self) -> CouchResult<Option<DocumentChange>> {
        if self.deleted {
            return Ok(Some(DocumentChange::Absent));
        }

        match self.doc {
            Some(doc) => {
                let stored = StoredDocument::from_value(&self.id, doc)?;
                Ok(Some(DocumentChange::Snapshot(stored.body)))
            }
            None => Ok(None),
        }
    }
}

/// Sequence tokens are opaque strings on CouchDB 2+ and integers on 1.x.
pub fn sequence_token(value: &Value) -> String {
    match value {
        Value::String(token) => token.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn doc_id_round_trips_nested_collection_paths() {
        let path = DocumentPath::new("artifacts/app/users/u1/profile", "userInfo");
        let id = doc_id(&path);
        assert_eq!(id, "artifacts/app/users/u1/profile::userInfo");
        assert_eq!(
            split_doc_id(&id),
            ("artifacts/app/users/u1/profile".to_string(), "userInfo".to_string())
        );
    }

    #[test]
    fn stored_document_strips_metadata() {
        let stored = StoredDocument::from_value(
            "betLobbies::l1",
            json!({"_id": "betLobbies::l1", "_rev": "3-abc", "betTitle": "t"}),
        )
        .unwrap();

        assert_eq!(stored.rev.as_deref(), Some("3-abc"));
        assert_eq!(Value::Object(stored.body.clone()), json!({"betTitle": "t"}));
        assert_eq!(
            Value::Object(stored.into_payload()),
            json!({"betTitle": "t", "_rev": "3-abc"})
        );
    }

    #[test]
    fn deleted_row_becomes_absent() {
        let row: ChangeRow = serde_json::from_value(json!({
            "seq": "5-g1",
            "id": "betLobbies::l1",
            "changes": [{"rev": "2-x"}],
            "deleted": true,
            "doc": {"_id": "betLobbies::l1", "_rev": "2-x", "_deleted": true}
        }))
        .unwrap();

        assert_eq!(row.into_change().unwrap(), Some(DocumentChange::Absent));
    }

    #[test]
    fn sequence_token_accepts_both_formats() {
        assert_eq!(sequence_token(&json!("12-g1AAAA")), "12-g1AAAA");
        assert_eq!(sequence_token(&json!(42)), "42");
    }
}
