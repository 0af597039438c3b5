//! Service Kit - Chain Tools
//!
//! Read-only lookups that implement `analyst_core::Tool`. Every tool holds a
//! shared [`ChainClient`](crate::client::ChainClient) and renders a short
//! plain-text answer plus the raw record as structured data.

mod balance;
mod block;
mod gas;
mod token;
mod transaction;

pub use balance::BalanceTool;
pub use block::BlockTool;
pub use gas::GasPriceTool;
pub use token::{TokenBalanceTool, TokenInfoTool, TokenTransfersTool};
pub use transaction::{TransactionHistoryTool, TransactionTool};

use analyst_core::{
    AnalystError, Result as CoreResult, ToolCall, ToolResult,
    tool::ParameterSchema,
};
use serde::Serialize;
use serde_json::json;

use crate::model::{DEFAULT_CHAIN, SUPPORTED_CHAINS};

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 50;

/// Optional `chain` parameter shared by every tool
fn chain_param() -> ParameterSchema {
    let mut param =
        ParameterSchema::optional("chain", "string", "Network to query", json!(DEFAULT_CHAIN));
    param.enum_values = Some(SUPPORTED_CHAINS.iter().map(|c| json!(c)).collect());
    param
}

fn limit_param() -> ParameterSchema {
    ParameterSchema::optional(
        "limit",
        "integer",
        "Maximum rows, newest first",
        json!(DEFAULT_LIMIT),
    )
}

fn chain_arg(call: &ToolCall) -> &str {
    call.str_arg("chain").unwrap_or(DEFAULT_CHAIN)
}

fn limit_arg(call: &ToolCall) -> usize {
    let limit = call.u64_arg("limit").unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    usize::try_from(limit).unwrap_or(1)
}

fn required_str<'a>(call: &'a ToolCall, field: &str) -> CoreResult<&'a str> {
    call.str_arg(field).ok_or_else(|| AnalystError::MissingArgument {
        tool: call.name.clone(),
        field: field.into(),
    })
}

/// Turn a client lookup into a tool result.
///
/// A missing object is an empty success, not a failure: the lookup worked and
/// the chain simply holds nothing. Other client errors become structured tool
/// failures so the caller can show them without caching.
fn respond<T: Serialize>(
    call: &ToolCall,
    lookup: crate::Result<T>,
    render: impl FnOnce(&T) -> String,
) -> CoreResult<ToolResult> {
    match lookup {
        Ok(value) => {
            let output = render(&value);
            let data = serde_json::to_value(&value)?;
            Ok(ToolResult::success(call.name.clone(), output).with_data(data))
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(tool = %call.name, error = %e, "Lookup returned nothing");
            Ok(ToolResult::success(call.name.clone(), ""))
        }
        Err(e) => {
            tracing::warn!(tool = %call.name, error = %e, "Chain lookup failed");
            Ok(ToolResult::failure(call.name.clone(), e.to_string()))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use analyst_core::tool::ToolArguments;

    use super::*;

    pub const ADDR: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
    pub const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

    /// Build a call the way the registry would after schema validation
    pub fn call(tool: &dyn analyst_core::Tool, args: serde_json::Value) -> ToolCall {
        let schema = tool.schema();
        let raw: ToolArguments = args.as_object().cloned().unwrap_or_default();
        ToolCall::new(schema.name.clone(), schema.validate(&raw).unwrap())
    }
}
