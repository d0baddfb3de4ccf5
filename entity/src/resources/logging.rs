//! Default `logging` resource.

use super::Resource;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info, warn, Level};

/// Logging resource that forwards to `tracing`.
///
/// Registered automatically when the configuration does not name one.
#[derive(Debug, Clone)]
pub struct LoggingResource {
    name: String,
}

impl Default for LoggingResource {
    fn default() -> Self {
        Self::new("logging")
    }
}

impl LoggingResource {
    /// Creates a logging resource.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Logs a message with structured fields.
    pub fn log(&self, level: Level, message: &str, fields: &HashMap<String, Value>) {
        let fields = serde_json::to_string(fields).unwrap_or_default();
        match level {
            Level::ERROR => error!(resource = %self.name, fields = %fields, "{message}"),
            Level::WARN => warn!(resource = %self.name, fields = %fields, "{message}"),
            Level::INFO => info!(resource = %self.name, fields = %fields, "{message}"),
            _ => debug!(resource = %self.name, fields = %fields, "{message}"),
        }
    }
}

#[async_trait]
impl Resource for LoggingResource {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_every_level() {
        let logger = LoggingResource::default();
        let fields = HashMap::from([("user".to_string(), Value::from("alice"))]);
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            logger.log(level, "hello", &fields);
        }
        assert_eq!(logger.name(), "logging");
    }
}
