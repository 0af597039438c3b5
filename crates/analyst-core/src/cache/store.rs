//! Sharded TTL store with least-recently-used eviction.
//!
//! Backs the session store, the conversation cache and the in-memory tool
//! result store. Every operation takes a single shard lock for the duration
//! of that operation only, so a sweep walking the map never blocks turn
//! processing on other shards.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::TtlCache;

/// When an entry's TTL clock starts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiry {
    /// TTL counts from the last write (tool results)
    SinceWrite,
    /// TTL counts from the last read or write (sessions: inactivity TTL)
    SinceAccess,
}

struct Slot<V> {
    value: V,
    stamped_at: Instant,
    ttl: Duration,
    last_used: u64,
}

impl<V> Slot<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stamped_at) >= self.ttl
    }
}

/// Concurrent map with per-entry TTL and a capacity bound.
pub struct ShardedStore<K, V> {
    entries: DashMap<K, Slot<V>>,
    capacity: usize,
    default_ttl: Duration,
    expiry: Expiry,
    tick: AtomicU64,
}

impl<K, V> ShardedStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, default_ttl: Duration, expiry: Expiry) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            default_ttl,
            expiry,
            tick: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert with an explicit TTL
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let slot = Slot {
            value,
            stamped_at: Instant::now(),
            ttl,
            last_used: self.next_tick(),
        };
        self.entries.insert(key, slot);

        if self.entries.len() > self.capacity {
            self.evict_lru();
        }
    }

    /// Whether a live entry exists, without touching its recency
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries.get(key).is_some_and(|slot| !slot.is_expired(now))
    }

    /// Live values, cloned out shard by shard
    pub fn values(&self) -> Vec<V> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.value().value.clone())
            .collect()
    }

    fn evict_lru(&self) {
        while self.entries.len() > self.capacity {
            // Collect the victim first: removing while an iterator guard is alive deadlocks.
            let victim = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().last_used)
                .map(|entry| entry.key().clone());

            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl<K, V> TtlCache<K, V> for ShardedStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut slot = self.entries.get_mut(key)?;

        if slot.is_expired(now) {
            drop(slot);
            self.entries.remove_if(key, |_, s| s.is_expired(now));
            return None;
        }

        slot.last_used = self.next_tick();
        if self.expiry == Expiry::SinceAccess {
            slot.stamped_at = now;
        }
        Some(slot.value.clone())
    }

    fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, slot)| slot.value)
    }

    fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, slot| {
            let keep = !slot.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
