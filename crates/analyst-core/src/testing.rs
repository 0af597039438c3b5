//! Scripted doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{AnalystError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::tool::{ParameterSchema, ToolCall, ToolCategory, ToolProvider, ToolResult, ToolSchema};

pub const ADDR: &str = "0xAbC0000000000000000000000000000000000123";

/// One scripted model reply
pub enum Reply {
    Text(String),
    Fail,
    Hang,
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// Model that replays a queue of replies and records every request
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    /// System instructions of the n-th request
    pub fn instructions(&self, n: usize) -> String {
        self.requests()[n][0].content.clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(Completion::text(text, &options.model)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Completion::text("", &options.model))
            }
            Some(Reply::Fail) | None => {
                Err(AnalystError::ModelUnavailable("script exhausted".into()))
            }
        }
    }
}

/// Canned behaviour of one tool
#[derive(Clone)]
pub enum Behavior {
    Ok { output: String, data: serde_json::Value },
    Empty,
    Fail(String),
    Error,
    Hang,
}

/// Tool provider over the standard chain catalog that counts invocations
pub struct CountingTools {
    catalog: Vec<ToolSchema>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<ToolCall>>,
}

impl CountingTools {
    pub fn new() -> Self {
        let behaviors = HashMap::from([
            (
                "get_balance".to_string(),
                Behavior::Ok {
                    output: "Balance: 1.5 ETH".into(),
                    data: json!({"balance_eth": "1.5"}),
                },
            ),
            (
                "get_gas_price".to_string(),
                Behavior::Ok {
                    output: "Base fee: 12 gwei".into(),
                    data: json!({"base_fee_gwei": "12"}),
                },
            ),
        ]);
        Self {
            catalog: chain_catalog(),
            behaviors: Mutex::new(behaviors),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, tool: &str, behavior: Behavior) {
        self.behaviors.lock().unwrap().insert(tool.to_string(), behavior);
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, tool: &str) -> usize {
        self.calls().iter().filter(|c| c.name == tool).count()
    }
}

#[async_trait]
impl ToolProvider for CountingTools {
    fn catalog(&self) -> Vec<ToolSchema> {
        self.catalog.clone()
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        self.calls.lock().unwrap().push(call.clone());
        let behavior = self.behaviors.lock().unwrap().get(&call.name).cloned();
        match behavior {
            Some(Behavior::Ok { output, data }) => {
                Ok(ToolResult::success(&call.name, output).with_data(data))
            }
            Some(Behavior::Empty) => Ok(ToolResult::success(&call.name, "")),
            Some(Behavior::Fail(message)) => Ok(ToolResult::failure(&call.name, message)),
            Some(Behavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ToolResult::success(&call.name, "late"))
            }
            Some(Behavior::Error) | None => {
                Err(AnalystError::Other(format!("{} unavailable", call.name)))
            }
        }
    }
}

fn schema(name: &str, category: ToolCategory, parameters: Vec<ParameterSchema>) -> ToolSchema {
    ToolSchema {
        name: name.into(),
        description: format!("{name} lookup"),
        parameters,
        category,
    }
}

/// Nine tools across the categories the default config knows about
pub fn chain_catalog() -> Vec<ToolSchema> {
    let address = || ParameterSchema::required("address", "string", "Wallet address");
    vec![
        schema("get_balance", ToolCategory::Balance, vec![address()]),
        schema("get_gas_price", ToolCategory::Gas, vec![]),
        schema(
            "get_transaction",
            ToolCategory::Transaction,
            vec![ParameterSchema::required("hash", "string", "Transaction hash")],
        ),
        schema(
            "get_transaction_history",
            ToolCategory::TransactionHistory,
            vec![address(), ParameterSchema::optional("limit", "integer", "Rows", json!(10))],
        ),
        schema(
            "get_token_info",
            ToolCategory::Token,
            vec![ParameterSchema::required("token_address", "string", "Token contract")],
        ),
        schema(
            "get_token_balance",
            ToolCategory::Token,
            vec![address(), ParameterSchema::required("token_address", "string", "Token contract")],
        ),
        schema("get_token_transfers", ToolCategory::Transfer, vec![address()]),
        schema(
            "get_block",
            ToolCategory::Block,
            vec![ParameterSchema::required("number", "integer", "Block number")],
        ),
        schema(
            "get_contract_abi",
            ToolCategory::Contract,
            vec![ParameterSchema::required("contract_address", "string", "Contract")],
        ),
    ]
}
