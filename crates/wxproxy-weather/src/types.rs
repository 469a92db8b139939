use serde::{Deserialize, Serialize};
use wxproxy_upstream::{CurrentConditions, GeocodingResult};

pub const CACHE_KEY_PREFIX: &str = "weather-proxy:weather";

/// Longest accepted `city` value, in characters
pub const MAX_CITY_LEN: usize = 100;

/// Current weather for a city, as returned to clients and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Canonical name from the geocoder
    pub city: String,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: u8,
    /// WMO weather interpretation code
    pub weather_code: i32,
    /// km/h
    pub wind_speed: f64,
    pub timezone: Option<String>,
    pub timestamp: Option<String>,
    /// Set by the service on the way out. Never trusted from the store.
    #[serde(default)]
    pub cached: bool,
}

impl WeatherSnapshot {
    /// Combine a geocoding match with the conditions at its coordinates.
    pub fn assemble(place: GeocodingResult, conditions: CurrentConditions) -> Self {
        Self {
            city: place.name,
            country: place.country,
            latitude: place.latitude,
            longitude: place.longitude,
            temperature: conditions.temperature,
            humidity: conditions.humidity,
            weather_code: conditions.weather_code,
            wind_speed: conditions.wind_speed,
            timezone: conditions.timezone.or(place.timezone),
            timestamp: conditions.timestamp,
            cached: false,
        }
    }
}

/// Case-insensitive lookup form of a city name: trimmed, inner whitespace
/// collapsed to single spaces, lowercased.
pub fn normalize_city(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn cache_key(normalized_city: &str) -> String {
    format!("{CACHE_KEY_PREFIX}:{normalized_city}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_city() {
        assert_eq!(normalize_city("London"), "london");
        assert_eq!(normalize_city("  New   York "), "new york");
        assert_eq!(normalize_city("SÃO PAULO"), "são paulo");
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("london"), "weather-proxy:weather:london");
    }

    #[test]
    fn test_assemble_prefers_forecast_timezone() {
        let place = GeocodingResult {
            name: "London".into(),
            latitude: 51.5074,
            longitude: -0.1278,
            country: Some("United Kingdom".into()),
            timezone: Some("Europe/London".into()),
        };
        let mut conditions = CurrentConditions {
            temperature: 15.0,
            humidity: 72,
            weather_code: 3,
            wind_speed: 11.2,
            timezone: Some("GMT".into()),
            timestamp: Some("2026-10-18T14:00".into()),
        };

        let snapshot = WeatherSnapshot::assemble(place.clone(), conditions.clone());
        assert_eq!(snapshot.city, "London");
        assert_eq!(snapshot.timezone.as_deref(), Some("GMT"));
        assert!(!snapshot.cached);

        conditions.timezone = None;
        let snapshot = WeatherSnapshot::assemble(place, conditions);
        assert_eq!(snapshot.timezone.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn test_stored_form_without_flag_defaults_to_uncached() {
        let json = r#"{
            "city": "London", "country": "United Kingdom",
            "latitude": 51.5074, "longitude": -0.1278,
            "temperature": 15.0, "humidity": 72, "weather_code": 3,
            "wind_speed": 11.2, "timezone": "Europe/London",
            "timestamp": "2026-10-18T14:00"
        }"#;
        let snapshot: WeatherSnapshot = serde_json::from_str(json).unwrap();
        assert!(!snapshot.cached);
        assert_eq!(snapshot.humidity, 72);
    }
}
