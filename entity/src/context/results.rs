//! Bounded store for intermediate stage results.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// Default number of results kept per run.
pub const DEFAULT_MAX_STAGE_RESULTS: usize = 100;

/// Key/value results shared between plugins of one run.
///
/// Holds at most `capacity` entries. Inserting a new key at capacity evicts
/// the oldest insertion; rewriting an existing key moves it to the newest
/// position. Reads never change the order.
#[derive(Debug, Clone)]
pub struct StageResults {
    entries: HashMap<String, Value>,
    order: VecDeque<String>,
    capacity: usize,
}

impl Default for StageResults {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STAGE_RESULTS)
    }
}

impl StageResults {
    /// Creates an empty store. A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Stores a result, returning the entry evicted to make room, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<(String, Value)> {
        let key = key.into();
        if self.entries.insert(key.clone(), value).is_some() {
            if let Some(pos) = self.order.iter().position(|k| *k == key) {
                self.order.remove(pos);
            }
            self.order.push_back(key);
            return None;
        }

        self.order.push_back(key);
        if self.order.len() > self.capacity {
            let oldest = self.order.pop_front()?;
            let value = self.entries.remove(&oldest)?;
            return Some((oldest, value));
        }
        None
    }

    /// Returns a result.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns true if a result exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes a result.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let value = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(value)
    }

    /// Returns keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Returns the number of stored results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the maximum number of stored results.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
