use axum::{Json, Router, extract::State, routing::get};
use axum_valid::Valid;

use crate::{
    dto::profile::{ProfileResponse, SaveProfileRequest},
    error::AppError,
    services::profile_service,
    state::{Identity, SharedState},
};

/// Routes reading and writing the caller's profile.
pub fn router() -> Router<SharedState> {
    Router::new().route("/profiles/me", get(get_profile).put(save_profile))
}

/// Fetch the caller's profile.
#[utoipa::path(
    get,
    path = "/profiles/me",
    tag = "profile",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Stored profile", body = ProfileResponse),
        (status = 404, description = "No profile saved yet")
    )
)]
pub async fn get_profile(
    State(state): State<SharedState>,
    identity: Identity,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = profile_service::get_profile(&state, &identity).await?;
    Ok(Json(profile))
}

/// Create or update the caller's profile.
#[utoipa::path(
    put,
    path = "/profiles/me",
    tag = "profile",
    request_body = SaveProfileRequest,
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Profile saved", body = ProfileResponse),
        (status = 400, description = "Invalid username or email")
    )
)]
pub async fn save_profile(
    State(state): State<SharedState>,
    identity: Identity,
    Valid(Json(payload)): Valid<Json<SaveProfileRequest>>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = profile_service::save_profile(&state, &identity, payload).await?;
    Ok(Json(profile))
}
