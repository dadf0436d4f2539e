//! In-memory cache for storing key-value pairs.
//!
//! Uses moka's high-performance concurrent cache implementation.

use moka::sync::Cache;

/// Thread-safe in-memory cache with configurable capacity.
///
/// Used for storing:
/// - Active runs (`MemCache<RunId, Arc<Run>>`)
/// - Run-scoped node outputs (`MemCache<String, String>`)
///
/// The cache is backed by moka, which provides:
/// - Thread-safe concurrent access
/// - LRU eviction when capacity is exceeded
#[derive(Clone)]
pub struct MemCache<K, V> {
    variables: Cache<K, V>,
}

#[allow(unused)]
impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`].
    pub fn new(capacity: usize) -> Self {
        Self {
            variables: Cache::new(capacity as u64),
        }
    }

    /// Set a value.
    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.variables.insert(key, value);
    }

    /// Get a value through key `&K`.
    pub fn get(
        &self,
        key: &K,
    ) -> Option<V> {
        self.variables.get(key)
    }

    /// Remove a value through key `&K`.
    pub fn remove(
        &self,
        key: &K,
    ) {
        self.variables.remove(key);
    }

    /// Remove every entry from the cache.
    pub fn clear(&self) {
        self.variables.invalidate_all();
    }

    /// Return an iterator over the entries of the cache.
    pub fn iter(&self) -> moka::sync::Iter<'_, K, V> {
        self.variables.iter()
    }
}
