//! LIFO registry of async teardown callbacks.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Boxed async teardown callback.
pub type CleanupCallback =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Outcome of running every registered callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Names of callbacks that finished successfully, in execution order.
    pub completed: Vec<String>,
    /// Names and messages of callbacks that failed or timed out.
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    /// Returns true if every callback completed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of teardown callbacks.
///
/// Callbacks run last-registered first, so resources are released in the
/// reverse of their construction order. Each callback gets its own timeout
/// and a failing callback never prevents the rest from running.
pub struct CleanupRegistry {
    callbacks: Mutex<Vec<(String, CleanupCallback)>>,
    per_callback_timeout: Duration,
}

impl Default for CleanupRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl CleanupRegistry {
    /// Creates a registry with the given per-callback timeout.
    #[must_use]
    pub fn new(per_callback_timeout: Duration) -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
            per_callback_timeout,
        }
    }

    /// Registers a teardown callback.
    pub fn register<F, Fut>(&self, name: impl Into<String>, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: CleanupCallback = Box::new(move || Box::pin(callback()));
        self.callbacks.lock().push((name.into(), boxed));
    }

    /// Returns the number of callbacks not yet run.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Runs and drains every callback in LIFO order.
    pub async fn run_all(&self) -> CleanupReport {
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        let mut report = CleanupReport::default();

        for (name, callback) in callbacks.into_iter().rev() {
            match timeout(self.per_callback_timeout, callback()).await {
                Ok(Ok(())) => {
                    debug!(cleanup = %name, "Cleanup completed");
                    report.completed.push(name);
                }
                Ok(Err(e)) => {
                    warn!(cleanup = %name, error = %e, "Cleanup failed");
                    report.failed.push((name, e.to_string()));
                }
                Err(_) => {
                    warn!(cleanup = %name, timeout = ?self.per_callback_timeout, "Cleanup timed out");
                    report.failed.push((name, "Timeout".to_string()));
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending_count", &self.pending_count())
            .field("per_callback_timeout", &self.per_callback_timeout)
            .finish()
    }
}
