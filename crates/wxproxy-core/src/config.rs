use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Longest accepted cache TTL
pub const MAX_CACHE_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Summarize all errors on one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event (production)
    #[default]
    Json,
    /// Human-readable lines (development)
    Console,
}

/// Service settings, sourced from environment variables.
///
/// Variable names are the upper-cased field names (`REDIS_URL`,
/// `CACHE_TTL_SECONDS`, ...). Anything unset keeps its default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// `EnvFilter` directive, e.g. `info` or `wxproxy_upstream=debug,info`
    pub log_level: String,
    pub log_format: LogFormat,

    /// Cache connection URL; `memory://` selects the in-process store
    pub redis_url: String,
    pub cache_ttl_seconds: u64,
    /// Upper bound on a single cache read/write/ping
    pub cache_timeout_ms: u64,

    pub open_meteo_base_url: String,
    pub geocoding_base_url: String,

    /// Per-call wall-clock bound on upstream requests
    pub http_timeout_seconds: f64,
    /// Total attempts per upstream call, including the first
    pub http_max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    pub circuit_breaker_fail_max: u32,
    /// Seconds the circuit stays open before a trial call
    pub circuit_breaker_reset_timeout: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "weather-proxy".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            redis_url: "redis://localhost:6379/0".to_string(),
            cache_ttl_seconds: 300,
            cache_timeout_ms: 1000,
            open_meteo_base_url: "https://api.open-meteo.com/v1".to_string(),
            geocoding_base_url: "https://geocoding-api.open-meteo.com/v1".to_string(),
            http_timeout_seconds: 10.0,
            http_max_retries: 3,
            retry_initial_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
            circuit_breaker_fail_max: 5,
            circuit_breaker_reset_timeout: 60,
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::build(config::Environment::default().try_parsing(true))
    }

    /// Load settings from an explicit set of variables instead of the process
    /// environment. Keys use the same upper-case names as the environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::build(
            config::Environment::default()
                .try_parsing(true)
                .source(Some(source)),
        )
    }

    fn build(source: config::Environment) -> Result<Self> {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Load settings and validate them
    ///
    /// Returns an error if validation fails. Warnings are handed back so the
    /// caller can log them once the subscriber is installed.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let settings = Self::from_env()?;
        let validation = settings.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        Ok((settings, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.bind_addr.parse::<SocketAddr>().is_err() {
            result.add_error(
                "bind_addr",
                format!("Not a socket address: {}", self.bind_addr),
            );
        }

        if tracing_subscriber::EnvFilter::try_new(&self.log_level).is_err() {
            result.add_error(
                "log_level",
                format!("Invalid log filter: {}", self.log_level),
            );
        }

        self.validate_http_url(&self.open_meteo_base_url, "open_meteo_base_url", &mut result);
        self.validate_http_url(&self.geocoding_base_url, "geocoding_base_url", &mut result);

        match Url::parse(&self.redis_url) {
            Ok(url) if matches!(url.scheme(), "redis" | "rediss" | "redis+unix" | "memory") => {}
            Ok(url) => result.add_error(
                "redis_url",
                format!("Unsupported cache scheme: {}", url.scheme()),
            ),
            Err(e) => result.add_error("redis_url", format!("Invalid URL: {}", e)),
        }

        if self.cache_ttl_seconds == 0 {
            result.add_error("cache_ttl_seconds", "TTL must be greater than 0");
        } else if self.cache_ttl_seconds > MAX_CACHE_TTL_SECONDS {
            result.add_error(
                "cache_ttl_seconds",
                format!("TTL must be at most {} seconds (one year)", MAX_CACHE_TTL_SECONDS),
            );
        } else if self.cache_ttl_seconds > 86_400 {
            result.add_warning("cache_ttl_seconds", "TTL is longer than 24 hours");
        }

        if self.cache_timeout_ms == 0 {
            result.add_error("cache_timeout_ms", "Cache timeout must be greater than 0");
        }

        if !self.http_timeout_seconds.is_finite() || self.http_timeout_seconds <= 0.0 {
            result.add_error(
                "http_timeout_seconds",
                "Timeout must be a positive number of seconds",
            );
        } else if self.http_timeout_seconds > 60.0 {
            result.add_warning("http_timeout_seconds", "Timeout is unusually long (>60s)");
        }

        if self.http_max_retries == 0 {
            result.add_error("http_max_retries", "At least one attempt is required");
        } else if self.http_max_retries > 10 {
            result.add_warning("http_max_retries", "More than 10 attempts per call");
        }

        if self.retry_max_delay_ms < self.retry_initial_delay_ms {
            result.add_warning(
                "retry_max_delay_ms",
                "Max delay is below the initial delay; every retry waits the max",
            );
        }

        if self.circuit_breaker_fail_max == 0 {
            result.add_error("circuit_breaker_fail_max", "Threshold must be greater than 0");
        }

        if self.circuit_breaker_reset_timeout == 0 {
            result.add_error(
                "circuit_breaker_reset_timeout",
                "Reset timeout must be greater than 0",
            );
        }

        result
    }

    /// Validate an http(s) URL field
    fn validate_http_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.http_timeout_seconds)
            .unwrap_or_else(|_| Duration::from_secs(10))
    }

    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn circuit_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_vars() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn test_valid_default_config() {
        let settings = Settings::default();
        let result = settings.validate();
        assert!(result.is_valid(), "Default settings should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let settings = Settings::from_vars(no_vars()).unwrap();
        assert_eq!(settings.app_name, "weather-proxy");
        assert_eq!(settings.cache_ttl_seconds, 300);
        assert_eq!(settings.circuit_breaker_fail_max, 5);
        assert_eq!(settings.circuit_breaker_reset_timeout, 60);
        assert_eq!(settings.http_max_retries, 3);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_environment_overrides() {
        let settings = Settings::from_vars([
            ("REDIS_URL", "redis://cache:6379/1"),
            ("CACHE_TTL_SECONDS", "60"),
            ("HTTP_TIMEOUT_SECONDS", "2.5"),
            ("CIRCUIT_BREAKER_FAIL_MAX", "3"),
            ("LOG_FORMAT", "console"),
        ])
        .unwrap();

        assert_eq!(settings.redis_url, "redis://cache:6379/1");
        assert_eq!(settings.cache_ttl(), Duration::from_secs(60));
        assert_eq!(settings.http_timeout(), Duration::from_millis(2500));
        assert_eq!(settings.circuit_breaker_fail_max, 3);
        assert_eq!(settings.log_format, LogFormat::Console);
    }

    #[test]
    fn test_unparseable_number_is_an_error() {
        let result = Settings::from_vars([("CACHE_TTL_SECONDS", "five minutes")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_upstream_scheme() {
        let settings = Settings {
            open_meteo_base_url: "ftp://api.open-meteo.com/v1".to_string(),
            ..Settings::default()
        };
        let result = settings.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_memory_cache_url_is_accepted() {
        let settings = Settings {
            redis_url: "memory://".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_valid());
    }

    #[test]
    fn test_zero_ttl_and_threshold_are_errors() {
        let settings = Settings {
            cache_ttl_seconds: 0,
            circuit_breaker_fail_max: 0,
            ..Settings::default()
        };
        let result = settings.validate();
        assert!(result.errors.iter().any(|e| e.field == "cache_ttl_seconds"));
        assert!(result.errors.iter().any(|e| e.field == "circuit_breaker_fail_max"));
    }

    #[test]
    fn test_negative_timeout_is_error() {
        let settings = Settings {
            http_timeout_seconds: -1.0,
            ..Settings::default()
        };
        assert!(!settings.validate().is_valid());
    }

    #[test]
    fn test_long_ttl_is_warning() {
        let settings = Settings {
            cache_ttl_seconds: 7 * 86_400,
            ..Settings::default()
        };
        let result = settings.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "cache_ttl_seconds"));
    }

    #[test]
    fn test_ttl_above_one_year_is_error() {
        let settings = Settings {
            cache_ttl_seconds: u64::MAX,
            redis_url: "memory://".to_string(),
            ..Settings::default()
        };
        let result = settings.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "cache_ttl_seconds"));

        let settings = Settings {
            cache_ttl_seconds: MAX_CACHE_TTL_SECONDS,
            ..Settings::default()
        };
        assert!(settings.validate().is_valid());
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
