//! Gas Price Tool

use std::sync::Arc;

use analyst_core::{Result as CoreResult, Tool, ToolCall, ToolCategory, ToolResult, ToolSchema};
use async_trait::async_trait;

use super::{chain_arg, chain_param, respond};
use crate::client::ChainClient;

/// Current fee market with a suggested max fee
pub struct GasPriceTool {
    client: Arc<dyn ChainClient>,
}

impl GasPriceTool {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GasPriceTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_gas_price".into(),
            description: "Current base fee and priority fee in gwei, with a suggested max fee."
                .into(),
            parameters: vec![chain_param()],
            category: ToolCategory::Gas,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let lookup = self.client.gas_price(chain_arg(call)).await;

        respond(call, lookup, |g| {
            format!(
                "Gas on {} (block {}): base fee {} gwei, priority fee {} gwei, \
                 suggested max fee {} gwei",
                g.chain,
                g.block_number,
                g.base_fee_gwei,
                g.priority_fee_gwei,
                g.suggested_max_fee_gwei()
            )
        })
    }
}
