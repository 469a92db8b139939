use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the cache is unreachable
    pub status: &'static str,
    pub cache_connected: bool,
}

/// `GET /health`. Always 200; a dead cache degrades the service, it does
/// not take it down.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache_connected = state.weather.cache_connected().await;
    if !cache_connected {
        tracing::warn!("health check: cache unreachable");
    }

    Json(HealthResponse {
        status: if cache_connected { "healthy" } else { "degraded" },
        cache_connected,
    })
}
