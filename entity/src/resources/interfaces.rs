//! Resource trait and the capability interfaces plugins consume.

use crate::core::ConversationEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use super::MetricsCollector;

/// Failure-isolation category of a resource.
///
/// Each category gets its own circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    /// Databases and vector stores.
    Database,
    /// Remote APIs such as LLM providers.
    Api,
    /// Local or object storage.
    Filesystem,
    /// Everything else.
    #[default]
    Default,
}

impl ResourceCategory {
    /// Every category.
    pub const ALL: [Self; 4] = [Self::Database, Self::Api, Self::Filesystem, Self::Default];

    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Api => "api",
            Self::Filesystem => "filesystem",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A long-lived dependency constructed once at startup and shared by every run.
///
/// Capability accessors return `Some` when the resource implements the
/// corresponding interface, which lets the context find the memory or cache
/// resource without downcasting.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Returns the registered name.
    fn name(&self) -> &str;

    /// Returns the breaker category used for runtime validation.
    fn category(&self) -> ResourceCategory {
        ResourceCategory::Default
    }

    /// Opens connections or loads state. Called once, in registration order.
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Checks that the resource is usable. Called concurrently after every
    /// resource has been initialized.
    async fn validate_runtime(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Releases connections or flushes state.
    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Returns the memory interface, if implemented.
    fn as_memory(&self) -> Option<&dyn Memory> {
        None
    }

    /// Returns the LLM interface, if implemented.
    fn as_llm(&self) -> Option<&dyn Llm> {
        None
    }

    /// Returns the cache interface, if implemented.
    fn as_cache(&self) -> Option<&dyn Cache> {
        None
    }

    /// Returns the storage interface, if implemented.
    fn as_storage(&self) -> Option<&dyn Storage> {
        None
    }

    /// Returns the metrics collector, if this is one.
    fn as_metrics(&self) -> Option<&MetricsCollector> {
        None
    }
}

/// Conversation persistence and key/value recall.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Stores a value under a key.
    async fn remember(&self, key: &str, value: Value) -> anyhow::Result<()>;

    /// Loads the value stored under a key.
    async fn recall(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Persists a conversation history, replacing any previous copy.
    async fn save_conversation(
        &self,
        conversation_id: &str,
        history: &[ConversationEntry],
    ) -> anyhow::Result<()>;

    /// Loads a conversation history; unknown ids yield an empty history.
    async fn load_conversation(&self, conversation_id: &str)
        -> anyhow::Result<Vec<ConversationEntry>>;

    /// Returns up to `k` stored texts most similar to `query`.
    async fn search_similar(&self, _query: &str, _k: usize) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// A generated completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub content: String,
    /// Provider-specific details such as model or token counts.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl LlmResponse {
    /// Creates a response with no metadata.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Error terminating an LLM stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("LLM stream failed: {0}")]
pub struct LlmError(pub String);

/// A finite stream of text chunks.
///
/// The producer side ends the stream by dropping its sender; an `Err` item
/// reports a failure and should be treated as the last item.
#[derive(Debug)]
pub struct LlmStream {
    rx: mpsc::Receiver<Result<String, LlmError>>,
}

/// Producer half of an [`LlmStream`].
pub type LlmStreamSender = mpsc::Sender<Result<String, LlmError>>;

impl LlmStream {
    /// Creates a bounded stream and its producer.
    #[must_use]
    pub fn channel(buffer: usize) -> (LlmStreamSender, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// Creates a stream that yields a single chunk.
    #[must_use]
    pub fn once(text: impl Into<String>) -> Self {
        let (tx, stream) = Self::channel(1);
        // Capacity 1 and nothing queued yet, so this cannot fail.
        let _ = tx.try_send(Ok(text.into()));
        stream
    }

    /// Receives the next chunk, or `None` once the producer is done.
    pub async fn next_chunk(&mut self) -> Option<Result<String, LlmError>> {
        self.rx.recv().await
    }

    /// Drains the stream into one string, stopping at the first error.
    pub async fn collect_text(mut self) -> Result<String, LlmError> {
        let mut text = String::new();
        while let Some(chunk) = self.next_chunk().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}

/// A language model.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Generates a completion, optionally offering function definitions.
    async fn generate(&self, prompt: &str, functions: Option<&[Value]>)
        -> anyhow::Result<LlmResponse>;

    /// Streams a completion. Each call starts a fresh stream.
    ///
    /// The default delivers the whole generated text as one chunk.
    async fn stream(&self, prompt: &str) -> anyhow::Result<LlmStream> {
        let response = self.generate(prompt, None).await?;
        Ok(LlmStream::once(response.content))
    }
}

/// A key/value cache with optional expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the live value for a key.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Removes a key.
    async fn delete(&self, key: &str);

    /// Removes every key.
    async fn clear(&self);
}

/// Simple blob storage keyed by path.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes a value.
    async fn put(&self, key: &str, value: Value) -> anyhow::Result<()>;

    /// Reads a value.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Deletes a value, returning whether it existed.
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;

    /// Lists keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
}
