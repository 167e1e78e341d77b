use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::document_store::Document;
use crate::dto::validation::validate_not_blank;

/// Payload used to create or update the caller's profile.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SaveProfileRequest {
    #[validate(length(min = 1, max = 64), custom(function = validate_not_blank))]
    pub username: String,
    /// Kept from the stored profile when omitted.
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
}

/// Profile as stored for one identity.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub uid: String,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl ProfileResponse {
    /// Read the known fields, ignoring anything wrongly typed.
    pub fn from_document(uid: &str, document: &Document) -> Self {
        let text = |key: &str| document.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            uid: uid.to_string(),
            username: text("username"),
            email: text("email"),
        }
    }
}
