//! Open-Meteo client: geocoding and current-weather lookups.
//!
//! Every call is composed as retry(circuit breaker(timeout(request))). Each
//! attempt passes through the breaker, so attempts exhausted by retry are
//! all counted, and an open circuit stops the retry loop at once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use wxproxy_core::Settings;

use crate::circuit::Breakers;
use crate::error::{Dependency, UpstreamError};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{CurrentConditions, ForecastResponse, GeocodingResponse, GeocodingResult};

const USER_AGENT: &str = concat!("weather-proxy/", env!("CARGO_PKG_VERSION"));
const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m";

#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    /// Base URL of the forecast API, e.g. `https://api.open-meteo.com/v1`
    pub forecast_base_url: String,
    /// Base URL of the geocoding API, e.g. `https://geocoding-api.open-meteo.com/v1`
    pub geocoding_base_url: String,
    /// Wall-clock bound on each attempt
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl OpenMeteoConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            forecast_base_url: settings.open_meteo_base_url.clone(),
            geocoding_base_url: settings.geocoding_base_url.clone(),
            timeout: settings.http_timeout(),
            retry: RetryConfig::new(
                settings.http_max_retries,
                settings.retry_initial_delay(),
                settings.retry_max_delay(),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Arc<Client>,
    forecast_base_url: String,
    geocoding_base_url: String,
    timeout: Duration,
    retry: RetryConfig,
    breakers: Breakers,
}

impl OpenMeteoClient {
    pub fn new(config: OpenMeteoConfig, breakers: Breakers) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            forecast_base_url: config.forecast_base_url.trim_end_matches('/').to_string(),
            geocoding_base_url: config.geocoding_base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            retry: config.retry,
            breakers,
        })
    }

    pub fn breakers(&self) -> &Breakers {
        &self.breakers
    }

    /// Resolve a city name to coordinates.
    ///
    /// Returns [`UpstreamError::CityNotFound`] when the geocoder has no match.
    pub async fn geocode(&self, city: &str) -> Result<GeocodingResult, UpstreamError> {
        let url = format!("{}/search", self.geocoding_base_url);
        let query = [
            ("name", city.to_string()),
            ("count", "1".to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];

        let body: GeocodingResponse = self
            .get_json(Dependency::Geocoding, &url, &query)
            .await?;

        let result = body
            .results
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::CityNotFound(city.to_string()))?;

        tracing::debug!(
            city,
            name = %result.name,
            latitude = result.latitude,
            longitude = result.longitude,
            "geocoded city"
        );
        Ok(result)
    }

    /// Current conditions at the given coordinates.
    pub async fn fetch_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentConditions, UpstreamError> {
        let url = format!("{}/forecast", self.forecast_base_url);
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
        ];

        let body: ForecastResponse = self
            .get_json(Dependency::Forecast, &url, &query)
            .await?;

        Ok(body.into())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        dependency: Dependency,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let breaker = self.breakers.for_dependency(dependency);
        with_retry(&self.retry, dependency, move || {
            breaker.call(move || self.send_once(dependency, url, query))
        })
        .await
    }

    /// A single attempt, bounded by the per-call timeout.
    async fn send_once<T: DeserializeOwned>(
        &self,
        dependency: Dependency,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        tracing::debug!(%dependency, url, "making external request");

        let attempt = async {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| UpstreamError::from_reqwest(dependency, e))?;

            let status = response.status();
            tracing::info!(%dependency, url, status_code = status.as_u16(), "external api response");

            if !status.is_success() {
                return Err(UpstreamError::Status { dependency, status });
            }

            response
                .json::<T>()
                .await
                .map_err(|e| UpstreamError::from_reqwest(dependency, e))
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%dependency, url, timeout_ms = self.timeout.as_millis() as u64, "external request timed out");
                Err(UpstreamError::Timeout {
                    dependency,
                    timeout: self.timeout,
                })
            }
        }
    }
}
