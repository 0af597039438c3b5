//! Tool Result Cache
//!
//! Memoizes (tool, canonical arguments) → result. Only successful results are
//! stored, so a transient provider error is retried on the next identical
//! request. TTL depends on the tool's category: volatile chain data expires
//! in seconds, static metadata in hours.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::store::{Expiry, ShardedStore};
use super::{CacheCounters, CacheStats, Sweep, TtlCache};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tool::{ToolArguments, ToolCategory, ToolResult};

/// Stable hash of (tool name, canonical arguments)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_call(tool: &str, arguments: &ToolArguments) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tool.as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical_json(&serde_json::Value::Object(arguments.clone())).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for logs and conversation state
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// JSON with object keys sorted at every depth
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// TTL per tool category
#[derive(Clone, Debug)]
pub struct TtlPolicy {
    per_category: HashMap<ToolCategory, Duration>,
    default: Duration,
}

impl TtlPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            per_category: config
                .category_ttl_secs
                .iter()
                .map(|(category, secs)| (*category, Duration::from_secs(*secs)))
                .collect(),
            default: Duration::from_secs(config.default_ttl_secs),
        }
    }

    pub fn ttl_for(&self, category: ToolCategory) -> Duration {
        self.per_category.get(&category).copied().unwrap_or(self.default)
    }
}

/// Backing store for tool results
///
/// Errors signal an unavailable substrate; the cache then degrades to
/// uncached operation instead of failing turns.
pub trait ResultStore: Send + Sync {
    fn load(&self, key: &CacheKey) -> Result<Option<ToolResult>>;

    fn save(&self, key: CacheKey, result: ToolResult, ttl: Duration) -> Result<()>;

    fn evict_expired(&self) -> Result<usize>;

    fn len(&self) -> usize;
}

/// In-process result store
pub struct MemoryResultStore {
    inner: ShardedStore<CacheKey, ToolResult>,
}

impl MemoryResultStore {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: ShardedStore::new(capacity, default_ttl, Expiry::SinceWrite),
        }
    }
}

impl ResultStore for MemoryResultStore {
    fn load(&self, key: &CacheKey) -> Result<Option<ToolResult>> {
        Ok(self.inner.get(key))
    }

    fn save(&self, key: CacheKey, result: ToolResult, ttl: Duration) -> Result<()> {
        self.inner.put_with_ttl(key, result, ttl);
        Ok(())
    }

    fn evict_expired(&self) -> Result<usize> {
        Ok(self.inner.evict_expired())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Memoization of tool results
pub struct ToolResultCache {
    backend: Arc<dyn ResultStore>,
    policy: TtlPolicy,
    counters: CacheCounters,
    degraded: AtomicBool,
}

impl ToolResultCache {
    pub fn new(backend: Arc<dyn ResultStore>, policy: TtlPolicy) -> Self {
        Self {
            backend,
            policy,
            counters: CacheCounters::default(),
            degraded: AtomicBool::new(false),
        }
    }

    /// In-memory cache sized and timed from configuration
    pub fn in_memory(config: &CacheConfig) -> Self {
        let store = MemoryResultStore::new(
            config.tool_capacity,
            Duration::from_secs(config.default_ttl_secs),
        );
        Self::new(Arc::new(store), TtlPolicy::from_config(config))
    }

    /// Cached result for `key`; `None` on miss or when running uncached
    pub fn lookup(&self, key: &CacheKey) -> Option<ToolResult> {
        if self.is_degraded() {
            self.counters.miss();
            return None;
        }

        match self.backend.load(key) {
            Ok(Some(result)) => {
                self.counters.hit();
                tracing::debug!(key = %key.short(), tool = %result.name, "Tool result cache hit");
                Some(result)
            }
            Ok(None) => {
                self.counters.miss();
                None
            }
            Err(e) => {
                self.counters.miss();
                self.degrade(&e);
                None
            }
        }
    }

    /// Memoize a result. Failures are never stored; returns whether it was.
    pub fn store(&self, key: CacheKey, category: ToolCategory, result: &ToolResult) -> bool {
        if !result.success || self.is_degraded() {
            return false;
        }

        let ttl = self.policy.ttl_for(category);
        match self.backend.save(key, result.clone(), ttl) {
            Ok(()) => true,
            Err(e) => {
                self.degrade(&e);
                false
            }
        }
    }

    /// Whether the backing store failed and the cache is bypassed
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn degrade(&self, err: &crate::AnalystError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(error = %err, "Tool result store unavailable, continuing uncached");
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.backend.len())
    }
}

impl Sweep for ToolResultCache {
    fn name(&self) -> &'static str {
        "tool_results"
    }

    fn sweep(&self) -> usize {
        if self.is_degraded() {
            return 0;
        }
        self.backend.evict_expired().unwrap_or_else(|e| {
            self.degrade(&e);
            0
        })
    }
}
