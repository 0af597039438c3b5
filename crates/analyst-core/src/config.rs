//! Configuration
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! Load order: optional TOML file, then environment overrides, then
//! [`AnalystConfig::validate`].
//!
//! ```toml
//! [diversity]
//! min_tools = 5
//! max_tools = 7
//!
//! [intents.keywords]
//! gas_analysis = ["gas", "gwei", "fee"]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::conversation::Intent;
use crate::error::{AnalystError, Result};
use crate::provider::GenerationOptions;
use crate::tool::ToolCategory;

/// Top-level analyst configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalystConfig {
    pub model: ModelConfig,
    pub tools: ToolsConfig,
    pub session: SessionConfig,
    pub diversity: DiversityConfig,
    pub intents: IntentConfig,
    pub cache: CacheConfig,
    pub persona: PersonaConfig,
}

/// Model invocation settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier passed to the provider
    pub name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Token cap for the post-tool follow-up
    pub follow_up_max_tokens: u32,
    /// Request-level timeout for each model call
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "llama3.2".into(),
            temperature: 0.2,
            max_tokens: 1024,
            follow_up_max_tokens: 256,
            timeout_secs: 60,
        }
    }
}

impl ModelConfig {
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.name.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }

    pub fn follow_up_options(&self) -> GenerationOptions {
        GenerationOptions {
            max_tokens: self.follow_up_max_tokens,
            ..self.generation_options()
        }
    }
}

/// Tool execution settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Request-level timeout for each provider call
    pub timeout_secs: u64,
    /// Budget for each fire-and-forget invocation sink
    pub sink_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            sink_timeout_secs: 10,
        }
    }
}

/// Session lifecycle and conversation-state bounds
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// History entries kept per session
    pub history_limit: usize,
    /// History entries forwarded to the model in compressed mode
    pub compressed_history_window: usize,
    /// Inactivity TTL for sessions and their conversation entries
    pub idle_ttl_secs: u64,
    /// Maximum live sessions before LRU eviction
    pub capacity: usize,
    /// Bound on `last_tools_used`
    pub max_recent_tools: usize,
    /// Bound on `active_entities`
    pub max_active_entities: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            compressed_history_window: 4,
            idle_ttl_secs: 30 * 60,
            capacity: 10_000,
            max_recent_tools: 5,
            max_active_entities: 8,
        }
    }
}

/// Diversity set thresholds and fixed tool lists
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    /// Always offered
    pub core_tools: Vec<String>,
    /// Used to top up to `min_tools`
    pub fallback_tools: Vec<String>,
    pub min_tools: usize,
    pub max_tools: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            core_tools: vec![
                "get_balance".into(),
                "get_gas_price".into(),
                "get_transaction".into(),
                "get_transaction_history".into(),
            ],
            fallback_tools: vec![
                "get_token_info".into(),
                "get_token_transfers".into(),
                "get_block".into(),
                "get_token_balance".into(),
            ],
            min_tools: 5,
            max_tools: 7,
        }
    }
}

/// Intent keyword tables and tie-break order
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub keywords: HashMap<Intent, Vec<String>>,
    /// Earlier wins on equal score
    pub priority: Vec<Intent>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        let keywords = HashMap::from([
            (
                Intent::BalanceCheck,
                words(&["balance", "holdings", "holding", "funds", "worth", "wallet", "how much"]),
            ),
            (
                Intent::GasAnalysis,
                words(&["gas", "gwei", "fee", "fees", "congestion", "base fee"]),
            ),
            (
                Intent::TokenAnalysis,
                words(&[
                    "token", "erc20", "erc-20", "supply", "decimals", "symbol", "usdc", "usdt",
                    "dai",
                ]),
            ),
            (
                Intent::TransactionLookup,
                words(&[
                    "transaction",
                    "tx",
                    "txn",
                    "hash",
                    "transfers",
                    "history",
                    "sent",
                    "received",
                ]),
            ),
        ]);

        Self {
            keywords,
            priority: vec![
                Intent::TransactionLookup,
                Intent::BalanceCheck,
                Intent::TokenAnalysis,
                Intent::GasAnalysis,
            ],
        }
    }
}

/// Cache sizing, TTLs and sweep cadence
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum memoized tool results before LRU eviction
    pub tool_capacity: usize,
    /// TTL for categories without an explicit entry
    pub default_ttl_secs: u64,
    pub category_ttl_secs: HashMap<ToolCategory, u64>,
    /// Background sweep period
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tool_capacity: 1024,
            default_ttl_secs: 300,
            category_ttl_secs: HashMap::from([
                (ToolCategory::Gas, 15),
                (ToolCategory::Block, 12),
                (ToolCategory::Balance, 30),
                (ToolCategory::Transfer, 60),
                (ToolCategory::TransactionHistory, 60),
                (ToolCategory::Price, 30),
                (ToolCategory::Transaction, 60 * 60),
                (ToolCategory::Token, 24 * 60 * 60),
                (ToolCategory::Contract, 24 * 60 * 60),
            ]),
            sweep_interval_secs: 30,
        }
    }
}

/// Persona selection
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Persona used when a request names none
    pub default_id: String,
    /// Used verbatim when the persona source fails
    pub fallback_text: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            default_id: "analyst".into(),
            fallback_text: "You are a careful blockchain analytics assistant. \
                Answer only from data returned by tools, and say plainly when data is unavailable."
                .into(),
        }
    }
}

impl AnalystConfig {
    /// Parse a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AnalystError::Config(e.to_string()))
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Defaults or `ANALYST_CONFIG`, then env overrides, then validation
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("ANALYST_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `ANALYST_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("ANALYST_MODEL") {
            self.model.name = model;
        }
        if let Some(secs) = env_u64("ANALYST_MODEL_TIMEOUT_SECS") {
            self.model.timeout_secs = secs;
        }
        if let Some(secs) = env_u64("ANALYST_TOOL_TIMEOUT_SECS") {
            self.tools.timeout_secs = secs;
        }
    }

    /// Reject configurations that would break the diversity invariant
    pub fn validate(&self) -> Result<()> {
        let d = &self.diversity;
        if d.min_tools > d.max_tools {
            return Err(AnalystError::Config(format!(
                "diversity.min_tools ({}) exceeds diversity.max_tools ({})",
                d.min_tools, d.max_tools
            )));
        }
        if d.core_tools.len() > d.max_tools {
            return Err(AnalystError::Config(format!(
                "{} core tools cannot fit in diversity.max_tools ({})",
                d.core_tools.len(),
                d.max_tools
            )));
        }
        if self.session.history_limit == 0 {
            return Err(AnalystError::Config("session.history_limit must be positive".into()));
        }
        if self.model.timeout_secs == 0 || self.tools.timeout_secs == 0 {
            return Err(AnalystError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
