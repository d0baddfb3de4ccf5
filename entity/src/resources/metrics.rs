//! Counters and duration samples shared by every run.

use super::Resource;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Metric names recorded by the tool subsystem.
pub mod names {
    /// Tool invocations that reached the tool body.
    pub const TOOL_EXECUTIONS: &str = "tool.executions";
    /// Tool calls served from cache.
    pub const TOOL_CACHE_HITS: &str = "tool.cache_hits";
    /// Tool calls that failed after retries.
    pub const TOOL_FAILURES: &str = "tool.failures";
    /// Wall time of tool invocations.
    pub const TOOL_DURATION: &str = "tool.duration";
}

/// The `metrics_collector` resource.
///
/// Every plugin implicitly depends on it.
#[derive(Debug)]
pub struct MetricsCollector {
    name: String,
    counters: DashMap<String, u64>,
    durations: DashMap<String, Vec<Duration>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new("metrics_collector")
    }
}

impl MetricsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counters: DashMap::new(),
            durations: DashMap::new(),
        }
    }

    /// Adds one to a counter.
    pub fn increment(&self, metric: &str) {
        self.increment_by(metric, 1);
    }

    /// Adds `n` to a counter.
    pub fn increment_by(&self, metric: &str, n: u64) {
        *self.counters.entry(metric.to_string()).or_insert(0) += n;
    }

    /// Records one duration sample.
    pub fn record_duration(&self, metric: &str, duration: Duration) {
        self.durations
            .entry(metric.to_string())
            .or_default()
            .push(duration);
    }

    /// Returns a counter value, zero if never incremented.
    #[must_use]
    pub fn counter(&self, metric: &str) -> u64 {
        self.counters.get(metric).map_or(0, |v| *v)
    }

    /// Returns the recorded samples for a duration metric.
    #[must_use]
    pub fn durations(&self, metric: &str) -> Vec<Duration> {
        self.durations
            .get(metric)
            .map(|v| v.value().clone())
            .unwrap_or_default()
    }

    /// Returns counters and duration summaries as JSON.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let counters: Map<String, Value> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), json!(*e.value())))
            .collect();
        let durations: Map<String, Value> = self
            .durations
            .iter()
            .map(|e| {
                let samples = e.value();
                let total: Duration = samples.iter().sum();
                let max = samples.iter().max().copied().unwrap_or_default();
                (
                    e.key().clone(),
                    json!({
                        "count": samples.len(),
                        "total_ms": total.as_secs_f64() * 1000.0,
                        "max_ms": max.as_secs_f64() * 1000.0,
                    }),
                )
            })
            .collect();
        json!({ "counters": counters, "durations": durations })
    }
}

#[async_trait]
impl Resource for MetricsCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_metrics(&self) -> Option<&MetricsCollector> {
        Some(self)
    }
}
