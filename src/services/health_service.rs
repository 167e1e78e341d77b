use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report degraded mode and the number of open lobby views, logging storage issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_document_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let open_views = state.open_view_count();
    if state.is_degraded() {
        HealthResponse::degraded(open_views)
    } else {
        HealthResponse::ok(open_views)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::document_store::memory::MemoryDocumentStore, state::AppState};

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");

        state
            .set_document_store(Arc::new(MemoryDocumentStore::new()))
            .await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.open_views, 0);
    }
}
