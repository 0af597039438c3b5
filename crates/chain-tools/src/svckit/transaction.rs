//! Transaction Tools
//!
//! Single-transaction lookup by hash and recent history of an address.

use std::fmt::Write;
use std::sync::Arc;

use analyst_core::{
    Result as CoreResult, Tool, ToolCall, ToolCategory, ToolResult, ToolSchema,
    tool::ParameterSchema,
};
use async_trait::async_trait;

use super::{chain_arg, chain_param, limit_arg, limit_param, required_str, respond};
use crate::client::ChainClient;
use crate::model::{Transaction, short_hex};

/// Details of one transaction
pub struct TransactionTool {
    client: Arc<dyn ChainClient>,
}

impl TransactionTool {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for TransactionTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_transaction".into(),
            description: "Status, parties, value and fee of a transaction.".into(),
            parameters: vec![
                ParameterSchema::required("hash", "string", "Transaction hash (0x + 64 hex)"),
                chain_param(),
            ],
            category: ToolCategory::Transaction,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let hash = required_str(call, "hash")?;
        let lookup = self.client.transaction(chain_arg(call), hash).await;

        respond(call, lookup, |tx| {
            format!(
                "Transaction {} on {}\nStatus: {}\nFrom: {}\nTo: {}\n\
                 Value: {}\nFee: {}\nBlock: {} ({})",
                tx.hash,
                tx.chain,
                tx.status,
                tx.from,
                tx.to.as_deref().unwrap_or("contract creation"),
                tx.value,
                tx.fee(),
                tx.block_number,
                tx.timestamp.format("%Y-%m-%d %H:%M UTC")
            )
        })
    }
}

/// Recent transactions sent by an address
pub struct TransactionHistoryTool {
    client: Arc<dyn ChainClient>,
}

impl TransactionHistoryTool {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

fn history_line(out: &mut String, tx: &Transaction) {
    let _ = writeln!(
        out,
        "  {} block {} -> {} value {} [{}]",
        short_hex(&tx.hash),
        tx.block_number,
        tx.to.as_deref().map_or_else(|| "contract creation".to_string(), short_hex),
        tx.value,
        tx.status
    );
}

#[async_trait]
impl Tool for TransactionHistoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_transaction_history".into(),
            description: "Most recent transactions sent by an address, newest first.".into(),
            parameters: vec![
                ParameterSchema::required("address", "string", "Wallet address (0x + 40 hex)"),
                limit_param(),
                chain_param(),
            ],
            category: ToolCategory::TransactionHistory,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let address = required_str(call, "address")?;
        let lookup = self
            .client
            .transactions(chain_arg(call), address, limit_arg(call))
            .await;

        respond(call, lookup, |txs| {
            if txs.is_empty() {
                return String::new();
            }
            let mut out = format!("Last {} transactions from {}:\n", txs.len(), short_hex(address));
            for tx in txs {
                history_line(&mut out, tx);
            }
            out.trim_end().to_string()
        })
    }
}
