//! Conversation Cache
//!
//! Compact carry-forward state for each session: the current intent, the
//! entities in play (by alias), the tools used recently and the alias table.
//! The orchestrator builds the compressed prompt from this instead of
//! replaying the full history.

pub mod diversity;
pub mod entity;
pub mod intent;

pub use diversity::DiversitySelector;
pub use entity::{AliasEntry, AliasTable, EntityKind, classify_value, extract_entities};
pub use intent::{Intent, IntentClassifier};

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, Expiry, ShardedStore, Sweep, TtlCache};
use crate::config::SessionConfig;
use crate::message::estimate_tokens;
use crate::session::SessionId;
use crate::tool::{ToolCall, ToolResult};

const RESULT_SUMMARY_CHARS: usize = 120;

/// Entity currently in play, referenced by alias
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEntity {
    pub alias: String,
    pub kind: EntityKind,
}

/// One executed tool call as remembered between turns
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool: String,
    /// Result cache key of the call
    pub args_hash: String,
    pub result_summary: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounds on the per-entry lists
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EntryLimits {
    pub max_recent_tools: usize,
    pub max_active_entities: usize,
}

impl From<&SessionConfig> for EntryLimits {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_recent_tools: config.max_recent_tools,
            max_active_entities: config.max_active_entities,
        }
    }
}

impl Default for EntryLimits {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Compressed per-session conversation state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub current_intent: Intent,

    /// Oldest first; re-mentioning an entity moves it to the back
    pub active_entities: VecDeque<ActiveEntity>,

    /// Most recent first
    pub last_tools_used: VecDeque<ToolUsage>,

    pub aliases: AliasTable,

    /// Rough token cost of [`ConversationEntry::summary`] plus the alias table
    pub estimated_tokens: u32,

    limits: EntryLimits,
}

impl ConversationEntry {
    pub fn new(limits: EntryLimits) -> Self {
        Self {
            current_intent: Intent::Generic,
            active_entities: VecDeque::new(),
            last_tools_used: VecDeque::new(),
            aliases: AliasTable::new(),
            estimated_tokens: 0,
            limits,
        }
    }

    /// Fresh entry seeded from the raw text of a turn
    pub fn bootstrap(text: &str, classifier: &IntentClassifier, limits: EntryLimits) -> Self {
        let mut entry = Self::new(limits);
        entry.current_intent = classifier.classify(text);
        entry.activate_entities_in(text);
        entry.refresh_estimate();

        tracing::debug!(
            intent = %entry.current_intent,
            entities = entry.active_entities.len(),
            "Bootstrapped conversation entry"
        );
        entry
    }

    /// Fold a later query into the entry.
    ///
    /// A `generic` classification keeps the previous intent so a follow-up
    /// like "and the other one?" doesn't reset tool selection.
    pub fn observe_query(&mut self, text: &str, classifier: &IntentClassifier) {
        let intent = classifier.classify(text);
        if intent != Intent::Generic {
            self.current_intent = intent;
        }
        self.activate_entities_in(text);
        self.refresh_estimate();
    }

    /// Record an executed call.
    ///
    /// Entities in the (already alias-expanded) arguments become active;
    /// entities found in the result only get aliases so a later turn can
    /// refer to them.
    pub fn record_tool_use(&mut self, call: &ToolCall, key: &CacheKey, result: &ToolResult) {
        self.last_tools_used.push_front(ToolUsage {
            tool: call.name.clone(),
            args_hash: key.short().to_string(),
            result_summary: result.summary(RESULT_SUMMARY_CHARS),
            timestamp: Utc::now(),
        });
        self.last_tools_used.truncate(self.limits.max_recent_tools);

        let mut argument_values = Vec::new();
        collect_strings(&serde_json::Value::Object(call.arguments.clone()), &mut argument_values);
        for value in argument_values {
            let kind = self
                .aliases
                .alias_of(&value)
                .and_then(|alias| self.aliases.entry(alias))
                .map(|entry| entry.kind)
                .or_else(|| classify_value(&value));
            if let Some(kind) = kind {
                self.activate(kind, &value);
            }
        }

        for (kind, value) in extract_entities(&result.output) {
            self.aliases.assign(kind, &value);
        }
        if let Some(data) = &result.data {
            let mut data_values = Vec::new();
            collect_strings(data, &mut data_values);
            for value in data_values {
                if let Some(kind) = classify_value(&value) {
                    self.aliases.assign(kind, &value);
                }
            }
        }

        self.refresh_estimate();
    }

    /// Assign (or reuse) an alias and mark the entity active
    pub fn activate(&mut self, kind: EntityKind, value: &str) -> String {
        let alias = self.aliases.assign(kind, value);
        let kind = self.aliases.entry(&alias).map_or(kind, |entry| entry.kind);

        self.active_entities.retain(|e| e.alias != alias);
        self.active_entities.push_back(ActiveEntity {
            alias: alias.clone(),
            kind,
        });
        while self.active_entities.len() > self.limits.max_active_entities {
            self.active_entities.pop_front();
        }
        alias
    }

    fn activate_entities_in(&mut self, text: &str) {
        for (kind, value) in extract_entities(text) {
            self.activate(kind, &value);
        }
    }

    /// Distinct kinds of the active entities, in first-seen order
    pub fn entity_kinds(&self) -> Vec<EntityKind> {
        let mut kinds = Vec::new();
        for entity in &self.active_entities {
            if !kinds.contains(&entity.kind) {
                kinds.push(entity.kind);
            }
        }
        kinds
    }

    /// Recently used tool names, most recent first, without repeats
    pub fn recent_tool_names(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::new();
        self.last_tools_used.iter().filter_map(move |usage| {
            let name = usage.tool.as_str();
            if seen.contains(&name) {
                None
            } else {
                seen.push(name);
                Some(name)
            }
        })
    }

    pub fn has_entities(&self) -> bool {
        !self.active_entities.is_empty()
    }

    /// Short textual summary used by the compressed prompt
    pub fn summary(&self) -> String {
        let entities = if self.active_entities.is_empty() {
            "none".to_string()
        } else {
            self.active_entities
                .iter()
                .map(|e| format!("{} ({})", e.alias, kind_label(e.kind)))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut out = format!(
            "Current intent: {}\nActive entities: {entities}\n",
            self.current_intent
        );
        if self.last_tools_used.is_empty() {
            out.push_str("Recent tools: none\n");
        } else {
            out.push_str("Recent tools:\n");
            for usage in &self.last_tools_used {
                out.push_str(&format!("- {}: {}\n", usage.tool, usage.result_summary));
            }
        }
        out
    }

    fn refresh_estimate(&mut self) {
        let alias_chars: usize = self
            .aliases
            .entries()
            .iter()
            .map(|e| e.alias.len() + e.value.len() + 4)
            .sum();
        self.estimated_tokens = estimate_tokens(&self.summary())
            .saturating_add(u32::try_from(alias_chars / 4).unwrap_or(u32::MAX));
    }
}

const fn kind_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Address => "address",
        EntityKind::TxHash => "transaction",
        EntityKind::TokenContract => "token contract",
    }
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

/// Conversation entries keyed by session, expiring with inactivity.
///
/// Lives independently of the session store: an entry may be evicted while
/// its session survives, and the orchestrator re-bootstraps it.
pub struct ConversationCache {
    entries: ShardedStore<SessionId, ConversationEntry>,
    limits: EntryLimits,
}

impl ConversationCache {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            entries: ShardedStore::new(
                config.capacity,
                Duration::from_secs(config.idle_ttl_secs),
                Expiry::SinceAccess,
            ),
            limits: EntryLimits::from(config),
        }
    }

    pub const fn limits(&self) -> EntryLimits {
        self.limits
    }
}

impl TtlCache<SessionId, ConversationEntry> for ConversationCache {
    fn get(&self, key: &SessionId) -> Option<ConversationEntry> {
        self.entries.get(key)
    }

    fn put(&self, key: SessionId, value: ConversationEntry) {
        self.entries.put(key, value);
    }

    fn remove(&self, key: &SessionId) -> Option<ConversationEntry> {
        self.entries.remove(key)
    }

    fn evict_expired(&self) -> usize {
        self.entries.evict_expired()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Sweep for ConversationCache {
    fn name(&self) -> &'static str {
        "conversations"
    }

    fn sweep(&self) -> usize {
        self.evict_expired()
    }
}
