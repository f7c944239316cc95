//! Cache Generation Module
//!
//! A generation is one named snapshot of cached entries plus its lifecycle state.

use std::collections::HashMap;

use serde::Serialize;

use crate::cache::{CacheEntry, RequestKey};

// == Generation State ==
/// Lifecycle of a generation: `Installing → Installed → Activating → Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Installing,
    Installed,
    Activating,
    Active,
}

impl GenerationState {
    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: GenerationState) -> bool {
        use GenerationState::*;
        matches!(
            (self, next),
            (Installing, Installed) | (Installed, Activating) | (Activating, Active)
        )
    }
}

// == Generation ==
#[derive(Debug)]
pub struct Generation {
    pub name: String,
    pub state: GenerationState,
    entries: HashMap<RequestKey, CacheEntry>,
    bytes: usize,
}

impl Generation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: GenerationState::Installing,
            entries: HashMap::new(),
            bytes: 0,
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Inserts or overwrites, returning the replaced entry.
    pub fn insert(&mut self, key: RequestKey, entry: CacheEntry) -> Option<CacheEntry> {
        self.bytes += entry.size_bytes();
        let previous = self.entries.insert(key, entry);
        if let Some(old) = &previous {
            self.bytes -= old.size_bytes();
        }
        previous
    }

    pub fn remove(&mut self, key: &RequestKey) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if let Some(old) = &removed {
            self.bytes -= old.size_bytes();
        }
        removed
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.bytes = 0;
        count
    }

    /// Footprint of an existing entry under `key`, 0 when absent.
    pub fn entry_size(&self, key: &RequestKey) -> usize {
        self.entries.get(key).map(CacheEntry::size_bytes).unwrap_or(0)
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        let mut keys: Vec<RequestKey> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}
