//! Failure-counting circuit breakers, one per resource category.

use crate::errors::CircuitBreakerTrippedError;
use crate::resources::ResourceCategory;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures before the breaker opens.
    pub failure_threshold: u32,
    /// Seconds the breaker stays open after tripping.
    pub recovery_timeout_secs: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_secs: 60.0,
        }
    }
}

impl BreakerConfig {
    /// Creates a new breaker config.
    #[must_use]
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout_secs: recovery_timeout.as_secs_f64(),
        }
    }

    /// Returns the recovery timeout as a duration.
    #[must_use]
    pub fn recovery_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.recovery_timeout_secs).unwrap_or(Duration::ZERO)
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - calls are allowed
    Closed,
    /// Threshold reached and recovery timeout not elapsed - calls are rejected
    Open,
    /// Recovery timeout elapsed - the next call is a probe
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open; the call was not attempted.
    #[error("{0}")]
    Tripped(CircuitBreakerTrippedError),
    /// The call was attempted and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected without being attempted.
    pub fn is_tripped(&self) -> bool {
        matches!(self, Self::Tripped(_))
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    tripped_at: Option<Instant>,
}

/// A failure-counting gate around async calls.
///
/// State only changes inside [`CircuitBreaker::call`] (or the explicit
/// `record_*` helpers it uses).
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a new closed breaker.
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Returns the breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Returns the current failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let state = self.state.lock();
        if state.failure_count < self.config.failure_threshold {
            return CircuitState::Closed;
        }
        match state.tripped_at {
            Some(at) if at.elapsed() < self.config.recovery_timeout() => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Returns true if the breaker is currently rejecting calls.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Checks whether a call may proceed.
    pub fn check(&self) -> Result<(), CircuitBreakerTrippedError> {
        let state = self.state.lock();
        if state.failure_count < self.config.failure_threshold {
            return Ok(());
        }
        if let Some(at) = state.tripped_at {
            let elapsed = at.elapsed();
            let timeout = self.config.recovery_timeout();
            if elapsed < timeout {
                return Err(CircuitBreakerTrippedError {
                    category: self.name.clone(),
                    failure_count: state.failure_count,
                    retry_after: timeout - elapsed,
                });
            }
        }
        Ok(())
    }

    /// Invokes `operation` unless the breaker is open.
    ///
    /// A failure increments the count and trips the breaker once the
    /// threshold is reached; a success resets it.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check().map_err(BreakerError::Tripped)?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.tripped_at.is_some() {
            info!(breaker = %self.name, "Circuit breaker recovered");
        }
        state.failure_count = 0;
        state.tripped_at = None;
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        if state.failure_count >= self.config.failure_threshold {
            state.tripped_at = Some(Instant::now());
            warn!(
                breaker = %self.name,
                failures = state.failure_count,
                "Circuit breaker tripped"
            );
        }
    }

    /// Resets the breaker to closed.
    pub fn reset(&self) {
        *self.state.lock() = BreakerState::default();
    }
}

/// Holds one breaker per resource category.
///
/// Failures in one category never block calls routed to another.
#[derive(Debug)]
pub struct BreakerManager {
    breakers: HashMap<ResourceCategory, Arc<CircuitBreaker>>,
}

impl BreakerManager {
    /// Creates a manager with the same config for every category.
    #[must_use]
    pub fn new(config: &BreakerConfig) -> Self {
        let breakers = ResourceCategory::ALL
            .iter()
            .map(|category| {
                (
                    *category,
                    Arc::new(CircuitBreaker::new(category.to_string(), config.clone())),
                )
            })
            .collect();
        Self { breakers }
    }

    /// Replaces the breaker for one category with a differently configured one.
    #[must_use]
    pub fn with_category_config(mut self, category: ResourceCategory, config: BreakerConfig) -> Self {
        self.breakers.insert(
            category,
            Arc::new(CircuitBreaker::new(category.to_string(), config)),
        );
        self
    }

    /// Returns the breaker for a category.
    #[must_use]
    pub fn get(&self, category: ResourceCategory) -> Arc<CircuitBreaker> {
        self.breakers
            .get(&category)
            .cloned()
            .unwrap_or_else(|| {
                Arc::new(CircuitBreaker::new(category.to_string(), BreakerConfig::default()))
            })
    }
}

impl Default for BreakerManager {
    fn default() -> Self {
        Self::new(&BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn failing(calls: &AtomicU32) -> Result<(), String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err("down".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_after_threshold_and_recovers() {
        let breaker = CircuitBreaker::new("api", BreakerConfig::new(2, Duration::from_secs(10)));
        let calls = AtomicU32::new(0);

        assert!(matches!(breaker.call(|| failing(&calls)).await, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(matches!(breaker.call(|| failing(&calls)).await, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state(), CircuitState::Open);

        // Third call before the timeout is rejected without invoking the function.
        let result = breaker.call(|| failing(&calls)).await;
        assert!(result.as_ref().is_err_and(BreakerError::is_tripped));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let result: Result<u32, BreakerError<String>> = breaker.call(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_retrips() {
        let breaker = CircuitBreaker::new("db", BreakerConfig::new(1, Duration::from_secs(5)));
        let calls = AtomicU32::new(0);

        let _ = breaker.call(|| failing(&calls)).await;
        assert!(breaker.is_open());

        tokio::time::advance(Duration::from_secs(6)).await;
        let result = breaker.call(|| failing(&calls)).await;
        assert!(matches!(result, Err(BreakerError::Inner(_))));
        assert!(breaker.is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tripped_error_carries_category() {
        let breaker = CircuitBreaker::new("filesystem", BreakerConfig::new(1, Duration::from_secs(60)));
        let calls = AtomicU32::new(0);
        let _ = breaker.call(|| failing(&calls)).await;

        let err = breaker.check().unwrap_err();
        assert_eq!(err.category, "filesystem");
        assert_eq!(err.failure_count, 1);
        assert!(err.retry_after <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_manager_isolates_categories() {
        let manager = BreakerManager::new(&BreakerConfig::new(1, Duration::from_secs(60)));
        let calls = AtomicU32::new(0);

        let database = manager.get(ResourceCategory::Database);
        let _ = database.call(|| failing(&calls)).await;
        assert!(database.is_open());

        let api = manager.get(ResourceCategory::Api);
        let result: Result<&str, BreakerError<String>> = api.call(|| async { Ok("ok") }).await;
        assert_eq!(result.unwrap(), "ok");
        assert!(Arc::ptr_eq(&database, &manager.get(ResourceCategory::Database)));
    }
}
