//! # chain-tools
//!
//! Read-only blockchain lookups for the chain analyst: balances, gas,
//! transactions, tokens, transfers and blocks.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ToolRegistry (analyst-core)                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  get_balance            ─┐                                  │
//! │  get_gas_price           │                                  │
//! │  get_transaction         │                                  │
//! │  get_transaction_history ├──► Arc<dyn ChainClient>          │
//! │  get_token_info          │      ├─ MockChainClient          │
//! │  get_token_balance       │      └─ (RPC / indexer clients)  │
//! │  get_token_transfers     │                                  │
//! │  get_block              ─┘                                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Missing objects (unknown hash, unknown token, future block) come back as
//! empty successful results; malformed input and client failures come back as
//! failed results.

pub mod client;
pub mod error;
pub mod model;
pub mod svckit;

use std::sync::Arc;

use analyst_core::{Persona, StaticPersonaSource, ToolRegistry};

pub use client::{ChainClient, MockChainClient};
pub use error::{ChainError, Result};
pub use model::{
    Block, GasPrice, NativeBalance, TokenBalance, TokenInfo, TokenTransfer, Transaction, TxStatus,
};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        BalanceTool, BlockTool, GasPriceTool, TokenBalanceTool, TokenInfoTool, TokenTransfersTool,
        TransactionHistoryTool, TransactionTool,
    };
}

/// Registry with every chain tool, in catalog order
pub fn registry(client: Arc<dyn ChainClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tools::BalanceTool::new(client.clone()));
    registry.register(tools::GasPriceTool::new(client.clone()));
    registry.register(tools::TransactionTool::new(client.clone()));
    registry.register(tools::TransactionHistoryTool::new(client.clone()));
    registry.register(tools::TokenInfoTool::new(client.clone()));
    registry.register(tools::TokenBalanceTool::new(client.clone()));
    registry.register(tools::TokenTransfersTool::new(client.clone()));
    registry.register(tools::BlockTool::new(client));

    tracing::debug!(tools = registry.len(), "Chain tool registry built");
    registry
}

/// Built-in personas, keyed by id. `analyst` is the default.
pub fn personas() -> StaticPersonaSource {
    StaticPersonaSource::new()
        .with(
            "analyst",
            Persona::new(CHAIN_ANALYST_PERSONA)
                .with_summary("precise, data-first on-chain analyst"),
        )
        .with(
            "brief",
            Persona::new(BRIEF_PERSONA).with_summary("terse, numbers only"),
        )
}

/// Default persona for the chain analyst agent
pub const CHAIN_ANALYST_PERSONA: &str = r#"You are an on-chain analyst.
You explain wallets, transactions, tokens and network conditions using live chain data.

## How You Work

1. **Data first** - Every number you state comes from a tool result in this conversation
2. **Say what is missing** - If a lookup returns nothing, say so instead of guessing
3. **Plain units** - Quote balances in whole units (ETH, USDC) and fees in gwei
4. **Short addresses** - Refer to addresses as 0x1234…abcd once the full value has been shown

## Interpreting Results

- A failed transaction still paid its fee; point that out
- Gas above 50 gwei on Ethereum is expensive; below 10 gwei is cheap
- Token supply and balances are already scaled by decimals

Never give investment advice. Describe what the chain shows."#;

/// Terse variant for dashboards and bots
pub const BRIEF_PERSONA: &str = "You are an on-chain data assistant. \
    Reply in at most three short lines. Numbers and units only, no commentary. \
    If a lookup returned nothing, reply \"no data\".";
