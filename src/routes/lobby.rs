use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures::Stream;
use uuid::Uuid;

use crate::{
    dto::lobby::{CreateLobbyRequest, LeaveResponse, LobbyCreated},
    error::AppError,
    services::{lobby_service, sse_service},
    state::{Identity, SharedState},
};

/// Routes handling lobby creation, live views and leaving.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/lobbies", post(create_lobby))
        .route("/lobbies/{id}/stream", get(lobby_stream))
        .route("/sessions/{session_id}/leave", post(leave_lobby))
}

/// Create a lobby hosted by the caller, who becomes its first player.
#[utoipa::path(
    post,
    path = "/lobbies",
    tag = "lobby",
    request_body = CreateLobbyRequest,
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Lobby created", body = LobbyCreated),
        (status = 400, description = "Blank bet title"),
        (status = 401, description = "No caller identity"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_lobby(
    State(state): State<SharedState>,
    identity: Option<Identity>,
    Json(payload): Json<CreateLobbyRequest>,
) -> Result<Json<LobbyCreated>, AppError> {
    let created = lobby_service::create_lobby(&state, identity.as_ref(), payload).await?;
    Ok(Json(created))
}

/// Watch a lobby. Authenticated viewers missing from the roster are added.
#[utoipa::path(
    get,
    path = "/lobbies/{id}/stream",
    tag = "lobby",
    params(
        ("id" = String, Path, description = "Identifier of the lobby to watch"),
        ("X-User-Id" = Option<String>, Header, description = "Authenticated user id")
    ),
    responses(
        (status = 200, description = "Lobby SSE stream", content_type = "text/event-stream", body = String),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn lobby_stream(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    identity: Option<Identity>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    Ok(sse_service::open_lobby_stream(state, id, identity).await?)
}

/// Leave the lobby watched by a stream session and close that stream.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/leave",
    tag = "lobby",
    params(
        ("session_id" = Uuid, Path, description = "Session id from the stream handshake"),
        ("X-User-Id" = String, Header, description = "Authenticated user id")
    ),
    responses(
        (status = 200, description = "Left the lobby", body = LeaveResponse),
        (status = 401, description = "Caller is not the session's viewer"),
        (status = 404, description = "Unknown session"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn leave_lobby(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    identity: Identity,
) -> Result<Json<LeaveResponse>, AppError> {
    let response = lobby_service::leave_session(&state, session_id, &identity).await?;
    Ok(Json(response))
}
