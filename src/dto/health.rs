use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Lobby views currently streaming to clients.
    pub open_views: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(open_views: usize) -> Self {
        Self {
            status: "ok".to_string(),
            open_views,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(open_views: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            open_views,
        }
    }
}
