use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the lobby service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::lobby::create_lobby,
        crate::routes::lobby::lobby_stream,
        crate::routes::lobby::leave_lobby,
        crate::routes::profile::get_profile,
        crate::routes::profile::save_profile,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::lobby::CreateLobbyRequest,
            crate::dto::lobby::LobbyCreated,
            crate::dto::lobby::LobbyState,
            crate::dto::lobby::PlayerSummary,
            crate::dto::lobby::SessionHandshake,
            crate::dto::lobby::NoticeEvent,
            crate::dto::lobby::LeaveResponse,
            crate::dto::profile::SaveProfileRequest,
            crate::dto::profile::ProfileResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "lobby", description = "Bet lobby creation, live views and membership"),
        (name = "profile", description = "Caller profile used for display names"),
    )
)]
pub struct ApiDoc;
