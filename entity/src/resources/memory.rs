//! In-process memory resource.

use super::{Memory, Resource, ResourceCategory};
use crate::core::ConversationEntry;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;

/// Memory resource backed by concurrent maps.
///
/// Nothing survives the process. `search_similar` ranks stored conversation
/// entries by how many lowercase words they share with the query.
#[derive(Debug)]
pub struct InMemoryMemory {
    name: String,
    values: DashMap<String, Value>,
    conversations: DashMap<String, Vec<ConversationEntry>>,
}

impl InMemoryMemory {
    /// Creates an empty memory resource.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: DashMap::new(),
            conversations: DashMap::new(),
        }
    }

    /// Returns the number of stored key/value pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no key/value pairs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Memory for InMemoryMemory {
    async fn remember(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn recall(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn save_conversation(
        &self,
        conversation_id: &str,
        history: &[ConversationEntry],
    ) -> anyhow::Result<()> {
        self.conversations
            .insert(conversation_id.to_string(), history.to_vec());
        Ok(())
    }

    async fn load_conversation(
        &self,
        conversation_id: &str,
    ) -> anyhow::Result<Vec<ConversationEntry>> {
        Ok(self
            .conversations
            .get(conversation_id)
            .map(|h| h.value().clone())
            .unwrap_or_default())
    }

    async fn search_similar(&self, query: &str, k: usize) -> anyhow::Result<Vec<String>> {
        let query_words = words(query);
        if query_words.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, String)> = self
            .conversations
            .iter()
            .flat_map(|history| history.value().clone())
            .filter_map(|entry| {
                let score = words(&entry.content).intersection(&query_words).count();
                (score > 0).then_some((score, entry.content))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.dedup_by(|a, b| a.1 == b.1);
        Ok(scored.into_iter().take(k).map(|(_, text)| text).collect())
    }
}

#[async_trait]
impl Resource for InMemoryMemory {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ResourceCategory {
        ResourceCategory::Database
    }

    fn as_memory(&self) -> Option<&dyn Memory> {
        Some(self)
    }
}
