//! In-process key/value storage resource.

use super::{Resource, ResourceCategory, Storage};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Storage resource backed by an ordered map.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    name: String,
    objects: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
        anyhow::ensure!(!key.is_empty(), "storage key must not be empty");
        self.objects.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.objects.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.write().remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[async_trait]
impl Resource for InMemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ResourceCategory {
        ResourceCategory::Filesystem
    }

    fn as_storage(&self) -> Option<&dyn Storage> {
        Some(self)
    }
}
