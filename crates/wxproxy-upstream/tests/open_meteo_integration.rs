//! Integration tests for OpenMeteoClient using wiremock.
//!
//! Geocoding and forecast endpoints are served by the same mock server.

use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxproxy_core::AppError;
use wxproxy_upstream::{
    Breakers, CircuitBreakerConfig, CircuitState, Dependency, OpenMeteoClient, OpenMeteoConfig,
    RetryConfig, UpstreamError,
};

fn london_geocoding() -> serde_json::Value {
    serde_json::json!({
        "results": [{
            "id": 2643743,
            "name": "London",
            "latitude": 51.5074,
            "longitude": -0.1278,
            "country": "United Kingdom",
            "timezone": "Europe/London"
        }],
        "generationtime_ms": 0.7
    })
}

fn london_forecast() -> serde_json::Value {
    serde_json::json!({
        "latitude": 51.5,
        "longitude": -0.12,
        "timezone": "Europe/London",
        "current": {
            "time": "2026-10-18T14:00",
            "interval": 900,
            "temperature_2m": 15.0,
            "relative_humidity_2m": 72,
            "weather_code": 3,
            "wind_speed_10m": 11.2
        }
    })
}

/// Client with millisecond backoff so retry tests stay fast
fn client(server: &MockServer, attempts: u32, threshold: u32, reset: Duration) -> OpenMeteoClient {
    let config = OpenMeteoConfig {
        forecast_base_url: server.uri(),
        geocoding_base_url: server.uri(),
        timeout: Duration::from_millis(500),
        retry: RetryConfig::new(attempts, Duration::from_millis(10), Duration::from_millis(50)),
    };
    let breakers = Breakers::new(CircuitBreakerConfig {
        failure_threshold: threshold,
        reset_timeout: reset,
    });
    OpenMeteoClient::new(config, breakers).unwrap()
}

fn default_client(server: &MockServer) -> OpenMeteoClient {
    client(server, 3, 5, Duration::from_secs(60))
}

#[tokio::test]
async fn test_geocode_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("name", "London"))
        .and(query_param("count", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_geocoding()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = default_client(&mock_server).geocode("London").await.unwrap();

    assert_eq!(result.name, "London");
    assert_eq!(result.latitude, 51.5074);
    assert_eq!(result.longitude, -0.1278);
    assert_eq!(result.country.as_deref(), Some("United Kingdom"));
    assert_eq!(result.timezone.as_deref(), Some("Europe/London"));
}

#[tokio::test]
async fn test_geocode_no_match_is_city_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"generationtime_ms": 0.3})),
        )
        .expect(1) // no retries for a definitive answer
        .mount(&mock_server)
        .await;

    let result = default_client(&mock_server).geocode("Atlantis").await;

    assert!(matches!(result, Err(UpstreamError::CityNotFound(ref c)) if c == "Atlantis"));
    let app: AppError = result.unwrap_err().into();
    assert_eq!(app.status_code(), 404);
}

#[tokio::test]
async fn test_fetch_weather_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("latitude", "51.5074"))
        .and(query_param("longitude", "-0.1278"))
        .and(query_param("timezone", "auto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_forecast()))
        .mount(&mock_server)
        .await;

    let conditions = default_client(&mock_server)
        .fetch_weather(51.5074, -0.1278)
        .await
        .unwrap();

    assert_eq!(conditions.temperature, 15.0);
    assert_eq!(conditions.humidity, 72);
    assert_eq!(conditions.weather_code, 3);
    assert_eq!(conditions.wind_speed, 11.2);
    assert_eq!(conditions.timestamp.as_deref(), Some("2026-10-18T14:00"));
}

#[tokio::test]
async fn test_retry_on_server_error() {
    let mock_server = MockServer::start().await;

    // First two calls fail, the third succeeds
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_geocoding()))
        .mount(&mock_server)
        .await;

    let result = default_client(&mock_server).geocode("London").await;

    assert!(result.is_ok());
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_gives_up_after_three_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let result = default_client(&mock_server).fetch_weather(51.5, -0.12).await;

    let app: AppError = result.unwrap_err().into();
    assert!(matches!(app, AppError::UpstreamUnavailable { ref dependency, .. } if dependency == "forecast"));
}

#[tokio::test]
async fn test_no_retry_on_client_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": true,
            "reason": "Latitude must be in range of -90 to 90°."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = default_client(&mock_server).fetch_weather(123.0, 0.0).await;

    let app: AppError = result.unwrap_err().into();
    assert!(matches!(app, AppError::UpstreamRejected { status: 400, .. }));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(london_forecast())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let result = client(&mock_server, 1, 5, Duration::from_secs(60))
        .fetch_weather(51.5, -0.12)
        .await;

    assert!(matches!(
        result,
        Err(UpstreamError::Timeout {
            dependency: Dependency::Forecast,
            ..
        })
    ));
}

#[tokio::test]
async fn test_malformed_body_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = default_client(&mock_server).fetch_weather(51.5, -0.12).await;

    assert!(matches!(result, Err(UpstreamError::Decode { .. })));
}

#[tokio::test]
async fn test_circuit_opens_after_five_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5) // the sixth call never reaches the server
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, 1, 5, Duration::from_secs(60));

    for _ in 0..5 {
        let result = client.geocode("London").await;
        assert!(matches!(result, Err(UpstreamError::Status { .. })));
    }
    assert_eq!(client.breakers().geocoding.state(), CircuitState::Open);

    let result = client.geocode("London").await;
    assert!(matches!(
        result,
        Err(UpstreamError::CircuitOpen {
            dependency: Dependency::Geocoding
        })
    ));

    // the forecast breaker is independent
    assert_eq!(client.breakers().forecast.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_circuit_allows_trial_after_reset_window() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_geocoding()))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, 1, 2, Duration::from_millis(200));

    assert!(client.geocode("London").await.is_err());
    assert!(client.geocode("London").await.is_err());
    assert!(matches!(
        client.geocode("London").await,
        Err(UpstreamError::CircuitOpen { .. })
    ));

    tokio::time::sleep(Duration::from_millis(250)).await;

    let result = client.geocode("London").await;
    assert!(result.is_ok());
    assert_eq!(client.breakers().geocoding.state(), CircuitState::Closed);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_rejected_requests_trip_the_circuit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(400))
        .expect(5)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, 1, 5, Duration::from_secs(60));

    for _ in 0..5 {
        let result = client.fetch_weather(51.5, -0.12).await;
        assert!(matches!(result, Err(UpstreamError::Status { .. })));
    }

    let result = client.fetch_weather(51.5, -0.12).await;
    assert!(matches!(
        result,
        Err(UpstreamError::CircuitOpen {
            dependency: Dependency::Forecast
        })
    ));
    assert_eq!(client.breakers().forecast.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_unknown_cities_do_not_trip_the_circuit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(7)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, 1, 5, Duration::from_secs(60));

    for _ in 0..7 {
        let result = client.geocode("Atlantis").await;
        assert!(matches!(result, Err(UpstreamError::CityNotFound(_))));
    }
    assert_eq!(client.breakers().geocoding.state(), CircuitState::Closed);
}
