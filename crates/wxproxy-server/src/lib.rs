//! HTTP surface of the weather proxy.
//!
//! Routes, correlation-ID propagation, request metrics and the mapping
//! from [`AppError`] to HTTP responses. The binary in `main.rs` wires settings into [`AppState`]
//! and serves [`build_router`].
//!
//! [`AppError`]: wxproxy_core::AppError

pub mod error;
pub mod metrics;
pub mod request_id;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::{middleware, Router};

pub use error::ApiError;
pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/weather", get(routes::weather::get_weather))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::metrics::render))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics::track_requests,
        ))
        .layer(middleware::from_fn(request_id::propagate_request_id))
        .with_state(state)
}
