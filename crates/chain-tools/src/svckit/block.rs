//! Block Tool

use std::sync::Arc;

use analyst_core::{
    Result as CoreResult, Tool, ToolCall, ToolCategory, ToolResult, ToolSchema,
    tool::ParameterSchema,
};
use async_trait::async_trait;

use super::{chain_arg, chain_param, respond};
use crate::client::ChainClient;

/// Block header summary; latest block when no number is given
pub struct BlockTool {
    client: Arc<dyn ChainClient>,
}

impl BlockTool {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for BlockTool {
    fn schema(&self) -> ToolSchema {
        let number = ParameterSchema {
            name: "number".into(),
            param_type: "integer".into(),
            description: "Block number (latest if omitted)".into(),
            required: false,
            default: None,
            enum_values: None,
        };

        ToolSchema {
            name: "get_block".into(),
            description:
                "Block summary: timestamp, transaction count, gas utilization and base fee.".into(),
            parameters: vec![number, chain_param()],
            category: ToolCategory::Block,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let lookup = self.client.block(chain_arg(call), call.u64_arg("number")).await;

        respond(call, lookup, |b| {
            format!(
                "Block {} on {} ({})\nHash: {}\nTransactions: {}\n\
                 Gas used: {} / {} ({}%)\nBase fee: {} gwei",
                b.number,
                b.chain,
                b.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                b.hash,
                b.transaction_count,
                b.gas_used,
                b.gas_limit,
                b.utilization_percent(),
                b.base_fee_gwei
            )
        })
    }
}
