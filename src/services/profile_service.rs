use serde_json::Value;
use tracing::warn;

use crate::{
    dao::{
        models::{ProfileEntity, now_millis},
        profile::ProfileRepository,
    },
    dto::profile::{ProfileResponse, SaveProfileRequest},
    error::ServiceError,
    state::{Identity, SharedState},
};

/// Username stored in `uid`'s profile, or `fallback` when there is none.
///
/// Read failures are logged and degrade to `fallback` as well: a missing
/// display name never blocks creating or joining a lobby.
pub async fn resolve_username(profiles: &ProfileRepository, uid: &str, fallback: &str) -> String {
    match profiles.find(uid).await {
        Ok(profile) => profile
            .as_ref()
            .and_then(|document| document.get("username"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string()),
        Err(err) => {
            warn!(uid = %uid, error = %err, "failed to fetch user profile");
            fallback.to_string()
        }
    }
}

async fn repository(state: &SharedState) -> Result<ProfileRepository, ServiceError> {
    let store = state.require_document_store().await?;
    Ok(ProfileRepository::new(store, state.config().app_id()))
}

/// Read the caller's own profile.
pub async fn get_profile(
    state: &SharedState,
    identity: &Identity,
) -> Result<ProfileResponse, ServiceError> {
    let profiles = repository(state).await?;
    let Some(document) = profiles.find(&identity.uid).await? else {
        return Err(ServiceError::NotFound(format!(
            "profile for `{}` not found",
            identity.uid
        )));
    };

    Ok(ProfileResponse::from_document(&identity.uid, &document))
}

/// Create or replace the caller's profile, keeping the original creation time.
pub async fn save_profile(
    state: &SharedState,
    identity: &Identity,
    request: SaveProfileRequest,
) -> Result<ProfileResponse, ServiceError> {
    let profiles = repository(state).await?;
    let existing = profiles.find(&identity.uid).await?;

    let created_at = existing
        .as_ref()
        .and_then(|document| document.get("createdAt"))
        .and_then(Value::as_i64)
        .unwrap_or_else(now_millis);
    let email = request.email.or_else(|| {
        existing
            .as_ref()
            .and_then(|document| document.get("email"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    let profile = ProfileEntity {
        username: request.username.trim().to_string(),
        email,
        created_at,
    };
    profiles.save(&identity.uid, &profile).await?;

    Ok(ProfileResponse {
        uid: identity.uid.clone(),
        username: Some(profile.username),
        email: profile.email,
    })
}
