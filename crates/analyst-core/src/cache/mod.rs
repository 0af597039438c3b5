//! Cache Layer
//!
//! Sessions, conversation entries and tool results each live in their own
//! cache, but all of them expose the same small interface so they can be
//! swept and tested the same way.

pub mod store;
pub mod tool_result;

pub use store::{Expiry, ShardedStore};
pub use tool_result::{CacheKey, MemoryResultStore, ResultStore, ToolResultCache};

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Uniform get/put/evict-by-ttl interface
pub trait TtlCache<K, V>: Send + Sync {
    /// Live value for `key`, if any
    fn get(&self, key: &K) -> Option<V>;

    /// Insert with the cache's default TTL
    fn put(&self, key: K, value: V);

    /// Remove an entry regardless of TTL
    fn remove(&self, key: &K) -> Option<V>;

    /// Drop expired entries, returning how many were removed
    fn evict_expired(&self) -> usize;

    /// Entries currently held (expired ones included until swept)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something the background sweeper can walk
pub trait Sweep: Send + Sync {
    /// Name for logs
    fn name(&self) -> &'static str;

    /// Evict expired entries, returning how many were removed
    fn sweep(&self) -> usize;
}

/// Hit/miss counters
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Point-in-time cache statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}
