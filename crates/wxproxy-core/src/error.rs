//! Centralized error taxonomy for the weather proxy.
//!
//! Component crates keep their own error enums and convert into [`AppError`]
//! at the orchestration boundary. The request boundary only ever sees
//! `AppError`, and maps it to an HTTP status via [`AppError::status_code`].

use thiserror::Error;

/// Top-level error type surfaced to the request boundary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing request input; never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Geocoding returned no match for the requested name.
    #[error("City not found: {0}")]
    CityNotFound(String),

    /// The upstream call exceeded its per-call deadline on the final attempt.
    #[error("Upstream {dependency} timed out")]
    UpstreamTimeout { dependency: String },

    /// Transient upstream failure (5xx, connection error) that outlived retries.
    #[error("Upstream {dependency} unavailable: {message}")]
    UpstreamUnavailable { dependency: String, message: String },

    /// Upstream answered with a non-transient error status.
    #[error("Upstream {dependency} rejected the request with status {status}")]
    UpstreamRejected { dependency: String, status: u16 },

    /// Upstream answered 2xx but the body did not have the expected shape.
    #[error("Invalid response from {dependency}: {message}")]
    InvalidUpstreamResponse { dependency: String, message: String },

    /// The circuit breaker for a dependency is open; no call was made.
    #[error("Circuit open for {dependency}")]
    CircuitOpen { dependency: String },

    /// Cache store failure. Absorbed by the orchestrator, logged only.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 422,
            AppError::CityNotFound(_) => 404,
            AppError::UpstreamTimeout { .. }
            | AppError::UpstreamUnavailable { .. }
            | AppError::CircuitOpen { .. } => 503,
            AppError::UpstreamRejected { .. } | AppError::InvalidUpstreamResponse { .. } => 502,
            AppError::CacheUnavailable(_) | AppError::Internal(_) => 500,
        }
    }

    /// Short error title used in the `error` field of response bodies.
    pub fn title(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Invalid request",
            AppError::CityNotFound(_) => "City not found",
            AppError::UpstreamTimeout { .. }
            | AppError::UpstreamUnavailable { .. }
            | AppError::CircuitOpen { .. } => "Weather service unavailable",
            AppError::UpstreamRejected { .. } | AppError::InvalidUpstreamResponse { .. } => {
                "Bad response from weather provider"
            }
            AppError::CacheUnavailable(_) | AppError::Internal(_) => "Internal server error",
        }
    }

    /// Caller-facing detail. Client errors echo the message; server-side
    /// errors get a fixed sentence so upstream internals are not leaked.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(_) | AppError::CityNotFound(_) => self.to_string(),
            AppError::UpstreamTimeout { .. } | AppError::UpstreamUnavailable { .. } => {
                "Unable to fetch weather data from external provider".to_string()
            }
            AppError::CircuitOpen { .. } => {
                "Weather provider is temporarily disabled after repeated failures".to_string()
            }
            AppError::UpstreamRejected { .. } | AppError::InvalidUpstreamResponse { .. } => {
                "The weather provider returned an unexpected response".to_string()
            }
            AppError::CacheUnavailable(_) | AppError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
        }
    }

    /// Whether this is the caller's fault (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
