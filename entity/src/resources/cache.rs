//! In-process cache resource with per-entry expiry.

use super::{Cache, Resource};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// Cache resource backed by a concurrent map.
///
/// Expired entries are dropped lazily on read.
#[derive(Debug)]
pub struct InMemoryCache {
    name: String,
    entries: DashMap<String, CacheEntry>,
    default_ttl: Option<Duration>,
}

impl InMemoryCache {
    /// Creates an empty cache with no default expiry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            default_ttl: None,
        }
    }

    /// Sets the expiry applied when `set` is called without a TTL.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Returns the number of stored entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?.value().clone();
        if entry.is_live() {
            Some(entry.value)
        } else {
            self.entries.remove(key);
            None
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let expires_at = ttl.or(self.default_ttl).map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    async fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl Resource for InMemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_cache(&self) -> Option<&dyn Cache> {
        Some(self)
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = InMemoryCache::new("cache");
        cache.set("k", json!({"v": 1}), None).await;
        assert_eq!(cache.get("k").await, Some(json!({"v": 1})));

        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = InMemoryCache::new("cache");
        cache.set("short", json!(1), Some(Duration::from_secs(5))).await;
        cache.set("forever", json!(2), None).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("forever").await, Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let cache = InMemoryCache::new("cache").with_default_ttl(Duration::from_secs(1));
        cache.set("k", json!("v"), None).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::new("cache");
        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;
        cache.clear().await;
        assert!(cache.is_empty());
    }
}
