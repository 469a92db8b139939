//! Prometheus metrics, scraped from `/metrics`.
//!
//! Each [`Metrics`] owns its registry, so routers built side by side (as in
//! tests) never share counters.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use wxproxy_upstream::{Breakers, CircuitState};

const CIRCUIT_STATES: [CircuitState; 3] =
    [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen];

pub struct Metrics {
    registry: Registry,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    cache_lookups: IntCounterVec,
    circuit_state: IntGaugeVec,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by route and status"),
            &["method", "path", "status"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency by route",
            ),
            &["method", "path"],
        )?;
        let cache_lookups = IntCounterVec::new(
            Opts::new("weather_cache_lookups_total", "Weather cache lookups by result"),
            &["result"],
        )?;
        let circuit_state = IntGaugeVec::new(
            Opts::new(
                "upstream_circuit_state",
                "1 for the current circuit breaker state of each upstream dependency",
            ),
            &["dependency", "state"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(circuit_state.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            http_duration,
            cache_lookups,
            circuit_state,
        })
    }

    pub fn record_request(&self, method: &str, path: &str, status: u16, seconds: f64) {
        let status = status.to_string();
        self.http_requests
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.http_duration
            .with_label_values(&[method, path])
            .observe(seconds);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    /// Copy the breakers' current states into the gauges.
    pub fn observe_breakers(&self, breakers: &Breakers) {
        for breaker in [&breakers.geocoding, &breakers.forecast] {
            let current = breaker.state();
            let dependency = breaker.dependency().as_str();
            for state in CIRCUIT_STATES {
                self.circuit_state
                    .with_label_values(&[dependency, state.as_str()])
                    .set(i64::from(state == current));
            }
        }
    }

    /// Text exposition format
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Count and time every request, labelled by matched route.
pub async fn track_requests(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    metrics.record_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
