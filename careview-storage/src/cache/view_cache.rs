//! The view cache trait and its in-memory implementation.
//!
//! `get`/`put`/`invalidate_tag` may race freely: concurrent `put` calls for
//! the same key are last-write-wins, which is safe because racing
//! recomputations read the same committed layer-store state and converge
//! to the same value. A single exclusive lock guards the entry map and the
//! tag index together, so an invalidation is observed atomically.

use async_trait::async_trait;
use careview_core::{CacheError, EffectiveItem, Timestamp};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::tags::ViewKey;

// ============================================================================
// CONFIG & STATS
// ============================================================================

/// Configuration for the view cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached views across all tenants. Over the cap the
    /// oldest-generation entries are evicted first.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 4096 }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached views.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries removed by tag invalidation.
    pub invalidations: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// CACHED VIEW
// ============================================================================

/// One cached resolved view: the ordered effective-item list plus a
/// generation stamp for freshness comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedView {
    pub items: Vec<EffectiveItem>,
    /// Monotonically increasing per-cache stamp; higher is fresher.
    pub generation: u64,
    pub cached_at: Timestamp,
}

// ============================================================================
// VIEW CACHE TRAIT
// ============================================================================

/// Cache backend trait for resolved views.
///
/// Implementations must be safe for concurrent `get`/`put`/`invalidate_tag`
/// from many callers. Failures are [`CacheError`], which callers treat as
/// an optimization loss, never a correctness loss.
#[async_trait]
pub trait ViewCache: Send + Sync {
    /// Get a cached view, if present.
    async fn get(&self, key: ViewKey) -> Result<Option<CachedView>, CacheError>;

    /// Store a resolved view. The entry is tagged with exactly the two
    /// tags of its key (tenant-scoped + global).
    async fn put(&self, key: ViewKey, items: Vec<EffectiveItem>) -> Result<(), CacheError>;

    /// Evict every entry associated with the tag. Returns the number of
    /// entries removed.
    async fn invalidate_tag(&self, tag: &str) -> Result<u64, CacheError>;

    /// Get cache statistics.
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<ViewKey, CachedView>,
    tag_index: HashMap<String, HashSet<ViewKey>>,
    next_generation: u64,
    stats: CacheStats,
}

impl CacheState {
    /// Remove a set of keys from the entry map and every tag set.
    /// Returns how many live entries were removed.
    fn remove_keys(&mut self, keys: &HashSet<ViewKey>) -> u64 {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        for set in self.tag_index.values_mut() {
            for key in keys {
                set.remove(key);
            }
        }
        self.tag_index.retain(|_, set| !set.is_empty());
        removed
    }
}

/// In-process [`ViewCache`] guarding all state with one exclusive lock.
#[derive(Debug)]
pub struct InMemoryViewCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
}

impl Default for InMemoryViewCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl InMemoryViewCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

#[async_trait]
impl ViewCache for InMemoryViewCache {
    async fn get(&self, key: ViewKey) -> Result<Option<CachedView>, CacheError> {
        let mut state = self.state.write().await;
        let found = state.entries.get(&key).cloned();
        match found {
            Some(view) => {
                state.stats.hits += 1;
                Ok(Some(view))
            }
            None => {
                state.stats.misses += 1;
                Ok(None)
            }
        }
    }

    async fn put(&self, key: ViewKey, items: Vec<EffectiveItem>) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        let generation = state.next_generation;
        state.next_generation += 1;

        state.entries.insert(
            key,
            CachedView {
                items,
                generation,
                cached_at: Utc::now(),
            },
        );
        for tag in key.tags() {
            state.tag_index.entry(tag).or_default().insert(key);
        }

        // Capacity bound: evict oldest generations first.
        while state.entries.len() > self.config.max_entries {
            let victim = state
                .entries
                .iter()
                .min_by_key(|(_, view)| view.generation)
                .map(|(key, _)| *key);
            match victim {
                Some(victim) => {
                    let keys: HashSet<ViewKey> = [victim].into_iter().collect();
                    state.remove_keys(&keys);
                    state.stats.evictions += 1;
                }
                None => break,
            }
        }

        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, CacheError> {
        let mut state = self.state.write().await;
        let keys = state.tag_index.remove(tag).unwrap_or_default();
        let removed = state.remove_keys(&keys);
        state.stats.invalidations += removed;
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let state = self.state.read().await;
        let mut stats = state.stats.clone();
        stats.entry_count = state.entries.len() as u64;
        Ok(stats)
    }
}

// =============================================================================
// TESTS
// =============================================================================
