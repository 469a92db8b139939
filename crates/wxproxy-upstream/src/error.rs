//! Upstream call errors and their mapping into the application taxonomy.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use wxproxy_core::AppError;

use crate::retry::{is_retryable_status, RetryDecision};

/// An external dependency guarded by its own circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Geocoding,
    Forecast,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dependency::Geocoding => "geocoding",
            Dependency::Forecast => "forecast",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{dependency} request timed out after {timeout:?}")]
    Timeout {
        dependency: Dependency,
        timeout: Duration,
    },

    #[error("{dependency} connection failed: {message}")]
    Connection {
        dependency: Dependency,
        message: String,
    },

    #[error("{dependency} returned status {status}")]
    Status {
        dependency: Dependency,
        status: StatusCode,
    },

    #[error("{dependency} returned an unreadable body: {message}")]
    Decode {
        dependency: Dependency,
        message: String,
    },

    #[error("{dependency} request could not be built: {message}")]
    InvalidRequest {
        dependency: Dependency,
        message: String,
    },

    #[error("circuit open for {dependency}")]
    CircuitOpen { dependency: Dependency },

    #[error("no geocoding match for {0:?}")]
    CityNotFound(String),
}

impl UpstreamError {
    /// Classify a reqwest error raised while talking to `dependency`.
    pub fn from_reqwest(dependency: Dependency, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // reqwest's own connect timeout; the per-call deadline is enforced by the client
            UpstreamError::Connection {
                dependency,
                message: "connect timed out".to_string(),
            }
        } else if error.is_builder() {
            UpstreamError::InvalidRequest {
                dependency,
                message: error.to_string(),
            }
        } else if error.is_decode() {
            UpstreamError::Decode {
                dependency,
                message: error.to_string(),
            }
        } else if let Some(status) = error.status() {
            UpstreamError::Status { dependency, status }
        } else {
            UpstreamError::Connection {
                dependency,
                message: error.to_string(),
            }
        }
    }

    /// Transient failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Timeout { .. } | UpstreamError::Connection { .. } => true,
            UpstreamError::Status { status, .. } => {
                is_retryable_status(*status) == RetryDecision::Retry
            }
            UpstreamError::Decode { .. }
            | UpstreamError::InvalidRequest { .. }
            | UpstreamError::CircuitOpen { .. }
            | UpstreamError::CityNotFound(_) => false,
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::Timeout { dependency, .. } => AppError::UpstreamTimeout {
                dependency: dependency.to_string(),
            },
            UpstreamError::Connection { dependency, message } => AppError::UpstreamUnavailable {
                dependency: dependency.to_string(),
                message,
            },
            UpstreamError::Status { dependency, status }
                if is_retryable_status(status) == RetryDecision::Retry =>
            {
                AppError::UpstreamUnavailable {
                    dependency: dependency.to_string(),
                    message: format!("status {}", status),
                }
            }
            UpstreamError::Status { dependency, status } => AppError::UpstreamRejected {
                dependency: dependency.to_string(),
                status: status.as_u16(),
            },
            UpstreamError::Decode { dependency, message } => AppError::InvalidUpstreamResponse {
                dependency: dependency.to_string(),
                message,
            },
            UpstreamError::InvalidRequest { dependency, message } => {
                AppError::Internal(format!("{} request could not be built: {}", dependency, message))
            }
            UpstreamError::CircuitOpen { dependency } => AppError::CircuitOpen {
                dependency: dependency.to_string(),
            },
            UpstreamError::CityNotFound(city) => AppError::CityNotFound(city),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: StatusCode) -> UpstreamError {
        UpstreamError::Status {
            dependency: Dependency::Forecast,
            status: code,
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(UpstreamError::Timeout {
            dependency: Dependency::Geocoding,
            timeout: Duration::from_secs(10),
        }
        .is_transient());
        assert!(status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(status(StatusCode::TOO_MANY_REQUESTS).is_transient());

        assert!(!status(StatusCode::BAD_REQUEST).is_transient());
        assert!(!status(StatusCode::NOT_FOUND).is_transient());
        assert!(!UpstreamError::CircuitOpen { dependency: Dependency::Forecast }.is_transient());
        assert!(!UpstreamError::CityNotFound("Atlantis".into()).is_transient());
    }

    #[test]
    fn test_app_error_mapping() {
        let app: AppError = status(StatusCode::SERVICE_UNAVAILABLE).into();
        assert!(matches!(app, AppError::UpstreamUnavailable { .. }));

        let app: AppError = status(StatusCode::BAD_REQUEST).into();
        assert!(matches!(app, AppError::UpstreamRejected { status: 400, .. }));

        let app: AppError = UpstreamError::CityNotFound("Atlantis".into()).into();
        assert!(matches!(app, AppError::CityNotFound(ref c) if c == "Atlantis"));

        let app: AppError = UpstreamError::CircuitOpen { dependency: Dependency::Geocoding }.into();
        assert_eq!(app.status_code(), 503);
    }

    #[test]
    fn test_dependency_display() {
        assert_eq!(Dependency::Geocoding.to_string(), "geocoding");
        assert_eq!(Dependency::Forecast.to_string(), "forecast");
    }
}
