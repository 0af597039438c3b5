//! Native Balance Tool

use std::sync::Arc;

use analyst_core::{
    Result as CoreResult, Tool, ToolCall, ToolCategory, ToolResult, ToolSchema,
    tool::ParameterSchema,
};
use async_trait::async_trait;

use super::{chain_arg, chain_param, required_str, respond};
use crate::client::ChainClient;

/// Native-currency balance of a wallet
pub struct BalanceTool {
    client: Arc<dyn ChainClient>,
}

impl BalanceTool {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for BalanceTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_balance".into(),
            description: "Native balance (ETH, POL) of a wallet address at the latest block."
                .into(),
            parameters: vec![
                ParameterSchema::required("address", "string", "Wallet address (0x + 40 hex)"),
                chain_param(),
            ],
            category: ToolCategory::Balance,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let address = required_str(call, "address")?;
        let lookup = self.client.native_balance(chain_arg(call), address).await;

        respond(call, lookup, |b| {
            format!(
                "Balance of {} on {}: {} {} (block {})",
                b.address, b.chain, b.balance, b.symbol, b.block_number
            )
        })
    }
}
