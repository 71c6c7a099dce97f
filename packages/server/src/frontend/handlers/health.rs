//! Health and probe endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::shutdown::HealthState;

/// `GET /health` — fixed service identification body.
///
/// The body shape is part of the external contract and never varies with
/// internal state; orchestrators use the probe endpoints below instead.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "server_scraping",
    }))
}

/// Liveness probe — always 200 while the process responds at all.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe — 200 when ready, 503 during startup and drain.
///
/// Returning 503 while draining takes the instance out of rotation so no
/// new traffic arrives during shutdown.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_state;
    use super::*;
    use crate::frontend::config::FrontendConfig;

    #[tokio::test]
    async fn health_body_is_the_fixed_contract() {
        let response = health_handler().await;
        assert_eq!(
            response.0,
            json!({"status": "ok", "service": "server_scraping"})
        );
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_tracks_shutdown_state() {
        let state = test_state(FrontendConfig::default());

        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
