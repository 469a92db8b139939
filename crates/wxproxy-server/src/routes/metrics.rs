use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use wxproxy_core::AppError;

use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::AppState;

/// `GET /metrics` in Prometheus text format.
pub async fn render(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Response, ApiError> {
    state
        .metrics
        .observe_breakers(state.weather.client().breakers());

    match state.metrics.encode() {
        Ok(body) => Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response()),
        Err(e) => Err(ApiError::new(AppError::Internal(e.to_string()), request_id)),
    }
}
