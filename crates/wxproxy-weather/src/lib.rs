//! Weather data for the proxy
//!
//! Snapshot model, the Cache Store and the cache-aside `WeatherService`.

pub mod cache;
pub mod service;
pub mod types;

pub use cache::{CacheError, CacheStore};
pub use service::WeatherService;
pub use types::{cache_key, normalize_city, WeatherSnapshot};
