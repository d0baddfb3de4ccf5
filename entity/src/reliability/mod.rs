//! Reliability primitives.
//!
//! - Retry policies with exponential or constant backoff
//! - Circuit breakers isolated per resource category

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{
    BreakerConfig, BreakerError, BreakerManager, CircuitBreaker, CircuitState,
};
pub use retry::{BackoffStrategy, RetryPolicy};
