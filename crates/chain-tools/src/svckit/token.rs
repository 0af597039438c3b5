//! Token Tools
//!
//! ERC-20 metadata, holder balances and transfer activity.

use std::fmt::Write;
use std::sync::Arc;

use analyst_core::{
    Result as CoreResult, Tool, ToolCall, ToolCategory, ToolResult, ToolSchema,
    tool::ParameterSchema,
};
use async_trait::async_trait;

use super::{chain_arg, chain_param, limit_arg, limit_param, required_str, respond};
use crate::client::ChainClient;
use crate::model::short_hex;

fn token_param() -> ParameterSchema {
    ParameterSchema::required("token_address", "string", "Token contract address")
}

fn address_param() -> ParameterSchema {
    ParameterSchema::required("address", "string", "Wallet address (0x + 40 hex)")
}

/// Name, symbol, decimals and supply of a token
pub struct TokenInfoTool {
    client: Arc<dyn ChainClient>,
}

impl TokenInfoTool {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for TokenInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_token_info".into(),
            description: "ERC-20 token metadata: name, symbol, decimals and total supply.".into(),
            parameters: vec![token_param(), chain_param()],
            category: ToolCategory::Token,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let token = required_str(call, "token_address")?;
        let lookup = self.client.token_info(chain_arg(call), token).await;

        respond(call, lookup, |t| {
            format!(
                "{} ({}) on {}\nContract: {}\nDecimals: {}\nTotal supply: {}",
                t.name, t.symbol, t.chain, t.address, t.decimals, t.total_supply
            )
        })
    }
}

/// Balance of one token held by a wallet
pub struct TokenBalanceTool {
    client: Arc<dyn ChainClient>,
}

impl TokenBalanceTool {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for TokenBalanceTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_token_balance".into(),
            description: "ERC-20 balance of a wallet for one token contract.".into(),
            parameters: vec![address_param(), token_param(), chain_param()],
            category: ToolCategory::Token,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let holder = required_str(call, "address")?;
        let token = required_str(call, "token_address")?;
        let lookup = self.client.token_balance(chain_arg(call), holder, token).await;

        respond(call, lookup, |b| {
            format!("{} holds {} {} ({})", b.holder, b.amount, b.symbol, short_hex(&b.token))
        })
    }
}

/// Recent ERC-20 transfers in and out of a wallet
pub struct TokenTransfersTool {
    client: Arc<dyn ChainClient>,
}

impl TokenTransfersTool {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for TokenTransfersTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_token_transfers".into(),
            description: "Recent ERC-20 transfers sent or received by an address, newest first."
                .into(),
            parameters: vec![address_param(), limit_param(), chain_param()],
            category: ToolCategory::Transfer,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let address = required_str(call, "address")?;
        let lookup = self
            .client
            .token_transfers(chain_arg(call), address, limit_arg(call))
            .await;

        respond(call, lookup, |transfers| {
            if transfers.is_empty() {
                return String::new();
            }
            let mut out = format!("Token transfers for {}:\n", short_hex(address));
            for t in transfers {
                let (direction, counterparty) = if t.from.eq_ignore_ascii_case(address) {
                    ("OUT", &t.to)
                } else {
                    ("IN ", &t.from)
                };
                let _ = writeln!(
                    out,
                    "  {direction} {} {} {} {} (block {})",
                    t.amount,
                    t.symbol,
                    if direction == "OUT" { "to" } else { "from" },
                    short_hex(counterparty),
                    t.block_number
                );
            }
            out.trim_end().to_string()
        })
    }
}
