use std::sync::Arc;

use anyhow::{Context, Result};
use wxproxy_core::Settings;
use wxproxy_upstream::{Breakers, CircuitBreakerConfig, OpenMeteoClient, OpenMeteoConfig};
use wxproxy_weather::{CacheStore, WeatherService};

use crate::metrics::Metrics;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub weather: WeatherService,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(weather: WeatherService) -> Result<Self> {
        let metrics = Metrics::new().context("Failed to register metrics")?;
        Ok(Self {
            weather,
            metrics: Arc::new(metrics),
        })
    }

    /// Build the process-wide collaborators: one circuit breaker per upstream
    /// dependency, the HTTP client, and the cache store.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let breakers = Breakers::new(CircuitBreakerConfig {
            failure_threshold: settings.circuit_breaker_fail_max,
            reset_timeout: settings.circuit_reset_timeout(),
        });

        let client = OpenMeteoClient::new(OpenMeteoConfig::from_settings(settings), breakers)
            .context("Failed to build HTTP client")?;

        let cache = CacheStore::from_url(&settings.redis_url, settings.cache_timeout())
            .context("Invalid REDIS_URL")?;

        tracing::info!(
            cache_backend = cache.backend(),
            cache_ttl_secs = settings.cache_ttl_seconds,
            "weather service configured"
        );

        Self::new(WeatherService::new(client, cache, settings.cache_ttl()))
    }
}
