//! Classification cache
//!
//! Memoizes suggestions by `name|content-type` for one run. No eviction and
//! no TTL. Backed by DashMap so it stays safe to share across tasks.

use dashmap::DashMap;

use super::Suggestion;

#[derive(Debug, Default)]
pub struct ClassificationCache {
    entries: DashMap<String, Suggestion>,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Suggestion> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Store `suggestion` under `key`, replacing any previous entry
    pub fn set(&self, key: &str, suggestion: Suggestion) {
        self.entries.insert(key.to_string(), suggestion);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
