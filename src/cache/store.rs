//! Cache Store Module
//!
//! Named, versioned response cache. Lookups only ever see the current
//! generation; activation purges every other generation.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::cache::{
    CacheEntry, CacheStats, Generation, GenerationState, RequestKey, ResponseSnapshot,
};
use crate::error::{Result, WorkerError};

// == Generation Handle ==
/// Returned by [`CacheStore::open_generation`]; names the opened generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationHandle {
    name: String,
}

impl GenerationHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    /// Live generations by name
    generations: HashMap<String, Generation>,
    /// Generation answering lookups
    current: Option<String>,
    /// Performance statistics
    stats: CacheStats,
    /// Byte budget across all generations
    quota_bytes: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the given byte quota.
    pub fn new(quota_bytes: usize) -> Self {
        Self {
            generations: HashMap::new(),
            current: None,
            stats: CacheStats::new(),
            quota_bytes,
        }
    }

    // == Open Generation ==
    /// Creates or reopens a named generation. Idempotent.
    pub fn open_generation(&mut self, name: &str) -> GenerationHandle {
        self.generations
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Opened cache generation '{}'", name);
                Generation::new(name)
            });
        GenerationHandle {
            name: name.to_string(),
        }
    }

    // == Put ==
    /// Inserts or overwrites an entry in `generation`.
    ///
    /// The entry is stored whole or not at all. Quota and unknown-generation
    /// failures are returned to the caller.
    pub fn put(
        &mut self,
        generation: &str,
        key: RequestKey,
        snapshot: ResponseSnapshot,
    ) -> Result<()> {
        let entry = CacheEntry::new(snapshot, generation);

        let replaced = match self.generations.get(generation) {
            Some(gen) => gen.entry_size(&key),
            None => {
                self.stats.record_write_failure();
                return Err(WorkerError::GenerationNotFound(generation.to_string()));
            }
        };

        let available = self.available_bytes() + replaced;
        if entry.size_bytes() > available {
            self.stats.record_write_failure();
            return Err(WorkerError::QuotaExceeded {
                needed: entry.size_bytes(),
                available,
            });
        }

        if let Some(gen) = self.generations.get_mut(generation) {
            gen.insert(key, entry);
        }
        self.stats.record_write();
        Ok(())
    }

    // == Lookup ==
    /// Looks up `key` in the current generation only. Absence is not an error.
    pub fn lookup(&mut self, key: &RequestKey) -> Option<ResponseSnapshot> {
        let found = self
            .current
            .as_ref()
            .and_then(|name| self.generations.get(name))
            .and_then(|gen| gen.get(key))
            .map(|entry| entry.snapshot.clone());

        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    // == Install Generation ==
    /// Commits a fully staged manifest into `name` as one unit.
    ///
    /// Quota is checked for the whole batch before anything is written, so a
    /// failure leaves the store exactly as it was.
    pub fn install_generation(
        &mut self,
        name: &str,
        entries: Vec<(RequestKey, ResponseSnapshot)>,
    ) -> Result<()> {
        let mut staged: HashMap<RequestKey, CacheEntry> = HashMap::new();
        for (key, snapshot) in entries {
            staged.insert(key, CacheEntry::new(snapshot, name));
        }

        let incoming: usize = staged.values().map(CacheEntry::size_bytes).sum();
        let replaced: usize = self
            .generations
            .get(name)
            .map(|gen| staged.keys().map(|k| gen.entry_size(k)).sum())
            .unwrap_or(0);
        let available = self.available_bytes() + replaced;
        if incoming > available {
            self.stats.record_write_failure();
            return Err(WorkerError::QuotaExceeded {
                needed: incoming,
                available,
            });
        }

        self.open_generation(name);
        let count = staged.len();
        if let Some(gen) = self.generations.get_mut(name) {
            for (key, entry) in staged {
                gen.insert(key, entry);
            }
            if gen.state.can_transition_to(GenerationState::Installed) {
                gen.state = GenerationState::Installed;
            }
        }
        self.stats.writes += count as u64;

        info!("Installed cache generation '{}' with {} entries", name, count);
        Ok(())
    }

    // == Activate ==
    /// Makes `name` the current generation and purges every other one.
    ///
    /// Returns the number of purged generations. Re-activating the current
    /// generation only repeats the purge.
    pub fn activate(&mut self, name: &str) -> Result<usize> {
        let gen = self
            .generations
            .get_mut(name)
            .ok_or_else(|| WorkerError::GenerationNotFound(name.to_string()))?;

        if gen.state != GenerationState::Active {
            for next in [GenerationState::Activating, GenerationState::Active] {
                if !gen.state.can_transition_to(next) {
                    return Err(WorkerError::InvalidRequest(format!(
                        "Generation '{}' cannot be activated from state {:?}",
                        name, gen.state
                    )));
                }
                debug!("Cache generation '{}': {:?} -> {:?}", name, gen.state, next);
                gen.state = next;
            }
            self.current = Some(name.to_string());
        }

        Ok(self.purge_except(name))
    }

    // == Purge Except ==
    /// Deletes every generation not named `current`. Idempotent.
    pub fn purge_except(&mut self, current: &str) -> usize {
        let before = self.generations.len();
        self.generations.retain(|name, _| name == current);
        let purged = before - self.generations.len();

        if self.current.as_deref().is_some_and(|c| c != current) {
            self.current = None;
        }
        if purged > 0 {
            info!("Purged {} stale cache generation(s), kept '{}'", purged, current);
        }
        self.stats.record_purge(purged);
        purged
    }

    // == Delete ==
    /// Removes one entry. Returns whether it existed.
    pub fn delete(&mut self, generation: &str, key: &RequestKey) -> Result<bool> {
        let gen = self
            .generations
            .get_mut(generation)
            .ok_or_else(|| WorkerError::GenerationNotFound(generation.to_string()))?;
        Ok(gen.remove(key).is_some())
    }

    /// Drops every entry of `generation`, keeping the generation itself.
    pub fn clear_generation(&mut self, generation: &str) -> Result<usize> {
        let gen = self
            .generations
            .get_mut(generation)
            .ok_or_else(|| WorkerError::GenerationNotFound(generation.to_string()))?;
        Ok(gen.clear())
    }

    /// Keys stored in `generation`, sorted.
    pub fn keys(&self, generation: &str) -> Result<Vec<RequestKey>> {
        self.generations
            .get(generation)
            .map(Generation::keys)
            .ok_or_else(|| WorkerError::GenerationNotFound(generation.to_string()))
    }

    // == Accessors ==
    pub fn current_generation(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn generation_state(&self, name: &str) -> Option<GenerationState> {
        self.generations.get(name).map(|gen| gen.state)
    }

    pub fn generation_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.generations.keys().cloned().collect();
        names.sort();
        names
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.len();
        stats.total_bytes = self.used_bytes();
        stats
    }

    // == Reset ==
    /// Drops every generation and counter.
    pub fn reset(&mut self) {
        self.generations.clear();
        self.current = None;
        self.stats = CacheStats::new();
    }

    // == Length ==
    /// Returns the number of entries across all live generations.
    pub fn len(&self) -> usize {
        self.generations.values().map(Generation::len).sum()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn used_bytes(&self) -> usize {
        self.generations.values().map(Generation::bytes).sum()
    }

    fn available_bytes(&self) -> usize {
        self.quota_bytes.saturating_sub(self.used_bytes())
    }
}
