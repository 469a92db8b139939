//! Circuit breaker guarding a single upstream dependency.
//!
//! # State transitions
//! ```text
//! Closed    -> Open:      consecutive failures reach the threshold
//! Open      -> Half-open: reset timeout elapsed; exactly one trial call is admitted
//! Half-open -> Closed:    the trial call succeeds
//! Half-open -> Open:      the trial call fails; the reset timeout starts over
//! ```
//!
//! One breaker exists per dependency for the life of the process. It is
//! created at startup and shared by reference with the client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{Dependency, UpstreamError};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT_SECS: u64 = 60;

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
    /// How long the breaker stays open before admitting a trial call
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: Duration::from_secs(DEFAULT_RESET_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
enum Phase {
    Closed,
    Open { since: Instant },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: Dependency,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(dependency: Dependency, config: CircuitBreakerConfig) -> Self {
        Self {
            dependency,
            config,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                consecutive_failures: 0,
            }),
        }
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    /// Current state. An open breaker whose reset timeout has elapsed
    /// reports `HalfOpen`, since the next call would be admitted as a trial.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        match inner.phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { since } if since.elapsed() >= self.config.reset_timeout => {
                CircuitState::HalfOpen
            }
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Ask permission to call the dependency.
    ///
    /// The returned permit must be settled with [`CircuitPermit::success`] or
    /// [`CircuitPermit::failure`]. A trial permit dropped unsettled frees the
    /// half-open slot for the next caller.
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_>, UpstreamError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let trial = match inner.phase {
            Phase::Closed => false,
            Phase::Open { since } if since.elapsed() >= self.config.reset_timeout => {
                tracing::info!(dependency = %self.dependency, "circuit half-open, admitting trial call");
                inner.phase = Phase::HalfOpen {
                    trial_in_flight: true,
                };
                true
            }
            Phase::HalfOpen {
                trial_in_flight: false,
            } => {
                inner.phase = Phase::HalfOpen {
                    trial_in_flight: true,
                };
                true
            }
            Phase::Open { .. } | Phase::HalfOpen { .. } => {
                tracing::debug!(dependency = %self.dependency, "circuit open, short-circuiting call");
                return Err(UpstreamError::CircuitOpen {
                    dependency: self.dependency,
                });
            }
        };

        Ok(CircuitPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Run `operation` through the breaker.
    ///
    /// Every error counts as a failure, including rejected statuses and
    /// unreadable bodies. "No match" is a valid answer and counts as success.
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let permit = self.try_acquire()?;
        let result = operation().await;

        match &result {
            Ok(_) | Err(UpstreamError::CityNotFound(_)) => permit.success(),
            Err(_) => permit.failure(),
        }

        result
    }

    fn on_success(&self, trial: bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.phase {
            Phase::HalfOpen { .. } if trial => {
                tracing::info!(dependency = %self.dependency, "trial call succeeded, circuit closed");
                inner.phase = Phase::Closed;
                inner.consecutive_failures = 0;
            }
            Phase::Closed => inner.consecutive_failures = 0,
            // late result from a call admitted before the circuit opened
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.phase {
            Phase::HalfOpen { .. } if trial => {
                tracing::warn!(dependency = %self.dependency, "trial call failed, circuit reopened");
                inner.phase = Phase::Open {
                    since: Instant::now(),
                };
            }
            Phase::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        dependency = %self.dependency,
                        failures = inner.consecutive_failures,
                        reset_timeout_secs = self.config.reset_timeout.as_secs(),
                        "circuit opened"
                    );
                    inner.phase = Phase::Open {
                        since: Instant::now(),
                    };
                }
            }
            _ => {}
        }
    }

    fn on_abandoned(&self, trial: bool) {
        if !trial {
            return;
        }
        let mut inner = self.inner.lock();
        if let Phase::HalfOpen { .. } = inner.phase {
            inner.phase = Phase::HalfOpen {
                trial_in_flight: false,
            };
        }
    }
}

/// Permission to make one call through a [`CircuitBreaker`].
#[must_use = "a permit must be settled with success() or failure()"]
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CircuitPermit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandoned(self.trial);
        }
    }
}

/// The per-dependency breakers, built once at startup.
#[derive(Debug, Clone)]
pub struct Breakers {
    pub geocoding: Arc<CircuitBreaker>,
    pub forecast: Arc<CircuitBreaker>,
}

impl Breakers {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            geocoding: Arc::new(CircuitBreaker::new(Dependency::Geocoding, config.clone())),
            forecast: Arc::new(CircuitBreaker::new(Dependency::Forecast, config)),
        }
    }

    pub fn for_dependency(&self, dependency: Dependency) -> &CircuitBreaker {
        match dependency {
            Dependency::Geocoding => &self.geocoding,
            Dependency::Forecast => &self.forecast,
        }
    }
}
