//! Process-wide `tracing` subscriber setup.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging configuration, read from the `observability` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or `entity=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Whether to print event targets.
    pub with_target: bool,
    /// Whether to colorize text output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            with_target: true,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Builds the env filter, preferring `RUST_LOG` when it parses.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber.
///
/// Only the first call has any effect. Returns true if this process now has
/// the subscriber installed by this function; false if another subscriber was
/// already set elsewhere.
pub fn init_logging(config: &LogConfig) -> bool {
    *INSTALLED.get_or_init(|| {
        let layer = tracing_subscriber::fmt::layer().with_target(config.with_target);
        let layer = match config.format {
            LogFormat::Json => layer.json().flatten_event(true).boxed(),
            LogFormat::Text => layer.with_ansi(config.ansi).boxed(),
        };

        tracing_subscriber::registry()
            .with(config.env_filter())
            .with(layer)
            .try_init()
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_from_json() {
        let config: LogConfig = serde_json::from_str(r#"{"level": "debug", "format": "json"}"#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.with_target);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LogConfig::default();
        let first = init_logging(&config);
        assert_eq!(init_logging(&config), first);
    }
}
