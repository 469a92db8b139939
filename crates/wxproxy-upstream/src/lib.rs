//! Upstream client for the weather proxy.
//!
//! Talks to the Open-Meteo geocoding and forecast APIs, wrapping each call
//! in a timeout, retry with exponential backoff, and a per-dependency
//! circuit breaker.

pub mod circuit;
pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use circuit::{Breakers, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{OpenMeteoClient, OpenMeteoConfig};
pub use error::{Dependency, UpstreamError};
pub use retry::RetryConfig;
pub use types::{CurrentConditions, GeocodingResult};
