//! Memo cache for value-based slices
//!
//! Entries are keyed by the literal query text and tagged with the topology
//! generation they were computed for. Any structural mutation clears the
//! whole cache; the generation tag makes a stale hit impossible even if a
//! mutator forgets to. When the cache is full it is flushed wholesale
//! rather than evicting single entries.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Cache statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub flushes: u64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Clone, Debug)]
struct CachedSlice<V> {
    generation: u64,
    value: V,
}

/// Generation-tagged memo cache
#[derive(Clone, Debug)]
pub struct SliceCache<V> {
    entries: HashMap<String, CachedSlice<V>>,
    capacity: usize,
    stats: CacheStats,
}

impl<V> SliceCache<V> {
    /// Create a cache holding at most `capacity` entries (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Check for a live entry, recording a hit or a miss
    pub fn contains(&mut self, key: &str, generation: u64) -> bool {
        let live = self
            .entries
            .get(key)
            .is_some_and(|e| e.generation == generation);
        if live {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        live
    }

    /// Get a live entry
    #[must_use]
    pub fn get(&self, key: &str, generation: u64) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|e| e.generation == generation)
            .map(|e| &e.value)
    }

    /// Store an entry and hand back a reference to it
    pub fn insert(&mut self, key: String, generation: u64, value: V) -> &V {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.entries.clear();
            self.stats.flushes += 1;
        }
        let slice = CachedSlice { generation, value };
        let stored = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(slice);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(slice),
        };
        &stored.value
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get cache statistics
    #[must_use]
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_hit() {
        let mut cache = SliceCache::new(4);
        assert!(!cache.contains("[1.0]", 0));
        assert_eq!(cache.insert("[1.0]".into(), 0, "slice"), &"slice");
        assert!(cache.contains("[1.0]", 0));
        assert_eq!(cache.get("[1.0]", 0), Some(&"slice"));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
        assert!((cache.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stale_generation_misses() {
        let mut cache = SliceCache::new(4);
        cache.insert("k".into(), 3, 1);
        assert!(!cache.contains("k", 4));
        assert_eq!(cache.get("k", 4), None);
    }

    #[test]
    fn test_full_cache_flushes() {
        let mut cache = SliceCache::new(2);
        cache.insert("a".into(), 0, 1);
        cache.insert("b".into(), 0, 2);
        cache.insert("b".into(), 0, 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().flushes, 0);

        cache.insert("c".into(), 0, 4);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().flushes, 1);
        assert_eq!(cache.get("c", 0), Some(&4));
    }

    #[test]
    fn test_clear() {
        let mut cache = SliceCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("a".into(), 0, ());
        cache.clear();
        assert!(cache.is_empty());
    }
}
