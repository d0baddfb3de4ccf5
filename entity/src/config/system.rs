//! The system configuration document.

use super::env::interpolate_env;
use crate::errors::ConfigError;
use crate::observability::LogConfig;
use crate::plugins::PluginKind;
use crate::reliability::BreakerConfig;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// One configured component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Factory id resolved through the plugin factory registry.
    #[serde(rename = "type")]
    pub type_id: String,
    /// A single stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Several stages. Combined with `stage` when both are set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
    /// Names of other configured components this one needs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Every other key, passed to the factory.
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl PluginEntry {
    /// Creates an entry with no stages or config.
    #[must_use]
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            stage: None,
            stages: Vec::new(),
            dependencies: Vec::new(),
            config: Map::new(),
        }
    }

    /// Sets a single stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Adds dependencies.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Sets a config value.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Returns the configured stage names, `stage` first.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stage
            .iter()
            .map(String::as_str)
            .chain(self.stages.iter().map(String::as_str))
            .collect()
    }
}

/// An ordered `name → entry` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginSection(Vec<(String, PluginEntry)>);

impl PluginSection {
    /// Creates an empty section.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, entry: PluginEntry) -> Self {
        self.insert(name, entry);
        self
    }

    /// Appends or replaces an entry, keeping its position on replace.
    pub fn insert(&mut self, name: impl Into<String>, entry: PluginEntry) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = entry,
            None => self.0.push((name, entry)),
        }
    }

    /// Returns true if the section names this entry.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    /// Iterates entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginEntry)> {
        self.0.iter().map(|(n, e)| (n.as_str(), e))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the section is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for PluginSection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SectionVisitor;

        impl<'de> Visitor<'de> for SectionVisitor {
            type Value = PluginSection;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of plugin name to plugin entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut section = PluginSection::new();
                while let Some((name, entry)) = map.next_entry::<String, PluginEntry>()? {
                    if section.contains(&name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate plugin '{name}'"
                        )));
                    }
                    section.0.push((name, entry));
                }
                Ok(section)
            }
        }

        deserializer.deserialize_map(SectionVisitor)
    }
}

impl Serialize for PluginSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, entry) in &self.0 {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the per-run stage result map.
    pub max_stage_results: usize,
    /// Bound on concurrently running queued tools. Unbounded when unset.
    pub tool_concurrency_limit: Option<usize>,
    /// Circuit breaker settings shared by every resource category.
    pub breaker: BreakerConfig,
    /// Per-call tool timeout.
    pub tool_timeout_secs: f64,
    /// Ceiling on a tool result's serialized size.
    pub tool_max_output_bytes: Option<usize>,
    /// Per-callback timeout when tearing down.
    pub cleanup_timeout_secs: f64,
    /// Whether `say` outside OUTPUT (and ERROR) is rejected.
    pub enforce_output_stage_for_say: bool,
    /// Pause between runtime validation attempts of one resource.
    pub validation_retry_delay_ms: u64,
    /// Resource names that must be configured.
    pub required_resources: Vec<String>,
    /// Bound on `continue_processing` follow-ups per message.
    pub max_iterations: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_stage_results: crate::context::DEFAULT_MAX_STAGE_RESULTS,
            tool_concurrency_limit: None,
            breaker: BreakerConfig::default(),
            tool_timeout_secs: 30.0,
            tool_max_output_bytes: None,
            cleanup_timeout_secs: 5.0,
            enforce_output_stage_for_say: true,
            validation_retry_delay_ms: 50,
            required_resources: vec!["memory".into(), "llm".into(), "storage".into()],
            max_iterations: 5,
        }
    }
}

impl RuntimeConfig {
    /// Returns the tool timeout.
    #[must_use]
    pub fn tool_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.tool_timeout_secs).unwrap_or(Duration::from_secs(30))
    }

    /// Returns the cleanup timeout.
    #[must_use]
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.cleanup_timeout_secs).unwrap_or(Duration::from_secs(5))
    }

    /// Returns the validation retry delay.
    #[must_use]
    pub fn validation_retry_delay(&self) -> Duration {
        Duration::from_millis(self.validation_retry_delay_ms)
    }
}

/// The whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Low-level resources such as connection pools.
    pub infrastructure: PluginSection,
    /// Canonical resources (`memory`, `llm`, `storage`).
    pub resources: PluginSection,
    /// Resources scoped to agents.
    pub agent_resources: PluginSection,
    /// Any other resources.
    pub custom_resources: PluginSection,
    /// Tools.
    pub tools: PluginSection,
    /// Input, output and failure adapters.
    pub adapters: PluginSection,
    /// Prompt plugins.
    pub prompts: PluginSection,
    /// Stage name → ordered plugin names. Overrides the named plugins' stages.
    pub workflow: BTreeMap<String, Vec<String>>,
    /// Engine tuning.
    pub runtime: RuntimeConfig,
    /// Logging setup.
    pub observability: LogConfig,
}

impl SystemConfig {
    /// Parses a JSON document, interpolating environment placeholders first.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid JSON, a schema mismatch, or a missing
    /// environment variable.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let mut value: Value = serde_json::from_str(input)?;
        interpolate_env(&mut value)?;
        Self::from_value(value)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json_str(&input)
    }

    /// Builds a config from an already interpolated value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not match the schema.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns every plugin section with its name, in registration order.
    #[must_use]
    pub fn sections(&self) -> [(&'static str, &PluginSection); 7] {
        [
            ("infrastructure", &self.infrastructure),
            ("resources", &self.resources),
            ("agent_resources", &self.agent_resources),
            ("custom_resources", &self.custom_resources),
            ("tools", &self.tools),
            ("adapters", &self.adapters),
            ("prompts", &self.prompts),
        ]
    }

    /// Returns true if any section names this entry.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sections().iter().any(|(_, section)| section.contains(name))
    }
}

/// Returns the kinds a section accepts.
#[must_use]
pub fn section_kinds(section: &str) -> &'static [PluginKind] {
    match section {
        "infrastructure" | "resources" | "agent_resources" | "custom_resources" => {
            &[PluginKind::Resource]
        }
        "tools" => &[PluginKind::Tool],
        "adapters" => &[PluginKind::Adapter, PluginKind::Failure],
        "prompts" => &[PluginKind::Prompt, PluginKind::Failure],
        _ => &[],
    }
}
