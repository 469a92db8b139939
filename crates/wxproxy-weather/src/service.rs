//! Weather Orchestrator: the cache-aside pipeline behind `GET /weather`.

use std::time::Duration;

use wxproxy_core::AppError;
use wxproxy_upstream::OpenMeteoClient;

use crate::cache::CacheStore;
use crate::types::{cache_key, normalize_city, WeatherSnapshot, MAX_CITY_LEN};

#[derive(Debug, Clone)]
pub struct WeatherService {
    client: OpenMeteoClient,
    cache: CacheStore,
    ttl: Duration,
}

impl WeatherService {
    pub fn new(client: OpenMeteoClient, cache: CacheStore, ttl: Duration) -> Self {
        Self { client, cache, ttl }
    }

    pub fn client(&self) -> &OpenMeteoClient {
        &self.client
    }

    /// Current weather for `city`, served from the cache when an unexpired
    /// entry exists.
    ///
    /// Cache failures never reach the caller: a failed read is a miss and a
    /// failed write is logged. Upstream failures abort the request, so a
    /// returned snapshot is always complete.
    pub async fn get_weather(&self, city: &str) -> Result<WeatherSnapshot, AppError> {
        let city = validate_city(city)?;
        let key = cache_key(&normalize_city(city));

        match self.cache.get(&key).await {
            Ok(Some(mut snapshot)) => {
                tracing::info!(city, key = %key, "cache hit");
                snapshot.cached = true;
                return Ok(snapshot);
            }
            Ok(None) => tracing::info!(city, key = %key, "cache miss"),
            Err(e) => {
                tracing::warn!(city, key = %key, error = %e, "cache read failed, treating as miss")
            }
        }

        let place = self.client.geocode(city).await?;
        let conditions = self
            .client
            .fetch_weather(place.latitude, place.longitude)
            .await?;
        let snapshot = WeatherSnapshot::assemble(place, conditions);

        // Best effort: the response does not depend on the write.
        match self.cache.set(&key, &snapshot, self.ttl).await {
            Ok(()) => tracing::debug!(key = %key, ttl_secs = self.ttl.as_secs(), "cache set"),
            Err(e) => tracing::warn!(key = %key, error = %e, "cache write failed, ignoring"),
        }

        Ok(snapshot)
    }

    /// Cache connectivity for `/health`.
    pub async fn cache_connected(&self) -> bool {
        self.cache.ping().await
    }
}

/// Trimmed city name, or a validation error when it is empty or too long.
pub fn validate_city(city: &str) -> Result<&str, AppError> {
    let trimmed = city.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("city must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_CITY_LEN {
        return Err(AppError::Validation(format!(
            "city must be at most {MAX_CITY_LEN} characters"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_city() {
        assert_eq!(validate_city("  London ").unwrap(), "London");
        assert!(matches!(validate_city(""), Err(AppError::Validation(_))));
        assert!(matches!(validate_city("   "), Err(AppError::Validation(_))));
        assert!(validate_city(&"a".repeat(100)).is_ok());
        assert!(matches!(
            validate_city(&"a".repeat(101)),
            Err(AppError::Validation(_))
        ));
    }
}
