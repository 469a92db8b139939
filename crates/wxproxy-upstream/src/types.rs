use serde::{Deserialize, Serialize};

/// Best geocoding match for a city name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResult {
    /// Canonical place name as spelled by the geocoder
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: Option<String>,
    pub timezone: Option<String>,
}

/// Current conditions at a coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: u8,
    /// WMO weather interpretation code
    pub weather_code: i32,
    /// km/h
    pub wind_speed: f64,
    pub timezone: Option<String>,
    /// Observation time, ISO-8601 local to `timezone`
    pub timestamp: Option<String>,
}

// Wire formats

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodingResponse {
    // absent entirely when nothing matches
    #[serde(default)]
    pub results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    pub timezone: Option<String>,
    pub current: ForecastCurrent,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastCurrent {
    pub time: Option<String>,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub weather_code: i32,
    pub wind_speed_10m: f64,
}

impl From<ForecastResponse> for CurrentConditions {
    fn from(response: ForecastResponse) -> Self {
        let current = response.current;
        Self {
            temperature: current.temperature_2m,
            humidity: current.relative_humidity_2m.round().clamp(0.0, 100.0) as u8,
            weather_code: current.weather_code,
            wind_speed: current.wind_speed_10m,
            timezone: response.timezone,
            timestamp: current.time,
        }
    }
}
