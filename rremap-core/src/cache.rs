//! Caller-owned LRU cache keyed by content hash
//!
//! Structures derived from large inputs (weight matrices, triangulations of
//! unstructured meshes) are expensive to rebuild and cheap to reuse. This
//! module provides a bounded cache that the caller owns and passes around
//! explicitly. Keys are xxHash64 digests of the input content, so two inputs
//! with equal content share an entry regardless of where they came from.
//!
//! - [`CacheKey`]: content hash
//! - [`ContentCache`]: bounded LRU map with hit/miss/eviction counters
//! - [`WeightCache`]: a [`ContentCache`] of loaded [`SparseWeightMatrix`] values

use crate::dataset::{Dataset, DatasetSource};
use crate::errors::{RemapError, RemapResult};
use crate::weights::SparseWeightMatrix;
use linked_hash_map::LinkedHashMap;
use std::sync::Arc;
use tracing::debug;
use xxhash_rust::xxh64::{xxh64, Xxh64};

/// Cache key derived from an xxHash64 content hash.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content_hash: u64,
}

impl CacheKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            content_hash: xxh64(bytes, 0),
        }
    }

    /// Hash a sequence of floating point values by their bit patterns.
    pub fn from_values(values: &[f64]) -> Self {
        let mut hasher = Xxh64::new(0);
        for v in values {
            hasher.update(&v.to_le_bytes());
        }
        Self {
            content_hash: hasher.digest(),
        }
    }

    /// Hash every variable of a dataset: names, dimensions, shapes and values.
    ///
    /// Attributes are ignored since they do not change derived structures.
    pub fn from_dataset(ds: &Dataset) -> Self {
        let mut hasher = Xxh64::new(0);
        for (name, var) in &ds.variables {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            for dim in &var.dims {
                hasher.update(dim.as_bytes());
                hasher.update(&[0]);
            }
            for len in var.shape() {
                hasher.update(&(*len as u64).to_le_bytes());
            }
            for v in var.data.iter() {
                hasher.update(&v.to_le_bytes());
            }
        }
        Self {
            content_hash: hasher.digest(),
        }
    }
}

impl From<u64> for CacheKey {
    fn from(hash: u64) -> Self {
        Self { content_hash: hash }
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetrics {
    /// Fraction of lookups that were hits, or 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded least-recently-used cache.
///
/// Lookups move the entry to the back of the eviction order; inserting into a
/// full cache evicts from the front.
#[derive(Debug)]
pub struct ContentCache<V> {
    entries: LinkedHashMap<CacheKey, V>,
    max_entries: usize,
    metrics: CacheMetrics,
}

impl<V: Clone> ContentCache<V> {
    /// Create a cache holding at most `max_entries` values.
    pub fn new(max_entries: usize) -> RemapResult<Self> {
        if max_entries == 0 {
            return Err(RemapError::Config(
                "cache capacity cannot be 0".to_string(),
            ));
        }
        Ok(Self {
            entries: LinkedHashMap::new(),
            max_entries,
            metrics: CacheMetrics::default(),
        })
    }

    /// Look up a value, refreshing its position in the LRU order.
    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        match self.entries.get_refresh(key) {
            Some(value) => {
                self.metrics.hits += 1;
                Some(value.clone())
            }
            None => {
                self.metrics.misses += 1;
                None
            }
        }
    }

    /// Insert a value, evicting the least recently used entries if full.
    pub fn put(&mut self, key: CacheKey, value: V) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }
        while self.entries.len() >= self.max_entries {
            if self.entries.pop_front().is_none() {
                break;
            }
            self.metrics.evictions += 1;
        }
        self.entries.insert(key, value);
    }

    /// Return the cached value or build, store and return it.
    ///
    /// Build errors are returned unchanged and nothing is stored.
    pub fn get_or_try_insert_with<F>(&mut self, key: CacheKey, build: F) -> RemapResult<V>
    where
        F: FnOnce() -> RemapResult<V>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = build()?;
        self.put(key, value.clone());
        Ok(value)
    }

    /// Check if a key is present without touching the LRU order.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics
    }
}

/// Cache of weight matrices keyed by the content of their weight dataset.
#[derive(Debug)]
pub struct WeightCache {
    inner: ContentCache<Arc<SparseWeightMatrix>>,
}

impl WeightCache {
    pub fn new(max_entries: usize) -> RemapResult<Self> {
        Ok(Self {
            inner: ContentCache::new(max_entries)?,
        })
    }

    /// Load a weight matrix, reusing a cached one built from identical content.
    pub fn load<'a>(
        &mut self,
        source: impl Into<DatasetSource<'a>>,
    ) -> RemapResult<Arc<SparseWeightMatrix>> {
        let ds = DatasetSource::resolve(source.into())?;
        let key = CacheKey::from_dataset(&ds);
        if self.inner.contains(&key) {
            debug!(key = key.content_hash, "Weight matrix cache hit");
        }
        self.inner.get_or_try_insert_with(key, || {
            Ok(Arc::new(SparseWeightMatrix::from_dataset(&ds)?))
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.inner.metrics()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
