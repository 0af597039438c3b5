//! Tool System
//!
//! Catalog schemas, schema-checked argument maps and the provider seam the
//! orchestrator executes against. Tools are registered at startup and
//! exposed to the model through [`ToolProvider::catalog`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::directive::DirectiveError;
use crate::error::{AnalystError, Result};

/// Argument object of a tool call. Keys are sorted (`serde_json` default map).
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// Category tag used for intent-based selection and TTL policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Balance,
    Gas,
    Transaction,
    TransactionHistory,
    Transfer,
    Token,
    Block,
    Contract,
    Price,
    General,
}

impl ToolCategory {
    pub const ALL: [Self; 10] = [
        Self::Balance,
        Self::Gas,
        Self::Transaction,
        Self::TransactionHistory,
        Self::Transfer,
        Self::Token,
        Self::Block,
        Self::Contract,
        Self::Price,
        Self::General,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Gas => "gas",
            Self::Transaction => "transaction",
            Self::TransactionHistory => "transaction_history",
            Self::Transfer => "transfer",
            Self::Token => "token",
            Self::Block => "block",
            Self::Contract => "contract",
            Self::Price => "price",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool call with arguments already checked against the tool's schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// String argument accessor
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    /// Unsigned integer argument accessor
    pub fn u64_arg(&self, key: &str) -> Option<u64> {
        self.arguments.get(key).and_then(serde_json::Value::as_u64)
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (formatted result or error)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            output: error.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// A successful result that carries nothing to report
    pub fn is_empty(&self) -> bool {
        let no_data = match &self.data {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::Array(items)) => items.is_empty(),
            Some(serde_json::Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        };
        no_data && self.output.trim().is_empty()
    }

    /// One-line summary for conversation state
    pub fn summary(&self, max_chars: usize) -> String {
        let flat: String = self.output.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() > max_chars {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{cut}...")
        } else {
            flat
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
}

impl ParameterSchema {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(
        name: &str,
        param_type: &str,
        description: &str,
        default: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            default: Some(default),
            enum_values: None,
        }
    }

    fn accepts(&self, value: &serde_json::Value) -> bool {
        let type_ok = match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        type_ok
            && self
                .enum_values
                .as_ref()
                .is_none_or(|allowed| allowed.contains(value))
    }
}

/// Catalog entry: tool definition schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for intent-based selection
    pub category: ToolCategory,
}

impl ToolSchema {
    /// Check an argument map against the declared parameters.
    ///
    /// Undeclared keys are dropped; declared optional keys with defaults are
    /// filled in so the provider always sees a complete, typed map.
    pub fn validate(
        &self,
        arguments: &ToolArguments,
    ) -> std::result::Result<ToolArguments, DirectiveError> {
        let mut checked = ToolArguments::new();

        for param in &self.parameters {
            match arguments.get(&param.name) {
                Some(serde_json::Value::Null) | None if param.required => {
                    return Err(DirectiveError::MissingArgument {
                        tool: self.name.clone(),
                        field: param.name.clone(),
                    });
                }
                Some(serde_json::Value::Null) | None => {
                    if let Some(default) = &param.default {
                        checked.insert(param.name.clone(), default.clone());
                    }
                }
                Some(value) if !param.accepts(value) => {
                    return Err(DirectiveError::InvalidArgument {
                        tool: self.name.clone(),
                        field: param.name.clone(),
                        expected: param.param_type.clone(),
                    });
                }
                Some(value) => {
                    checked.insert(param.name.clone(), value.clone());
                }
            }
        }

        Ok(checked)
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
}

/// External tool provider: read-only catalog plus execution
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Catalog in a stable order
    fn catalog(&self) -> Vec<ToolSchema>;

    /// Execute a call. `Ok` with `success == false` is a structured tool error.
    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult>;
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a new tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Arc::new(tool));
    }

    /// Register a boxed tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if let Some(&idx) = self.index.get(&name) {
            self.tools[idx] = tool;
        } else {
            self.index.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&idx| self.tools[idx].clone())
    }

    /// Get tool names in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.schema().name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    fn catalog(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AnalystError::UnknownTool(call.name.clone()))?;

        let arguments = tool.schema().validate(&call.arguments)?;
        tool.execute(&ToolCall::new(call.name.clone(), arguments)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echo the address back".into(),
                parameters: vec![
                    ParameterSchema::required("address", "string", "Address"),
                    ParameterSchema::optional("limit", "integer", "Max rows", json!(5)),
                ],
                category: ToolCategory::General,
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let address = call.str_arg("address").unwrap_or("");
            let limit = call.u64_arg("limit").unwrap_or(0);
            Ok(ToolResult::success("echo", format!("{address} {limit}")))
        }
    }

    fn args(value: serde_json::Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_validate_fills_defaults_and_drops_unknown() {
        let checked = EchoTool
            .schema()
            .validate(&args(json!({"address": "0xabc", "junk": true})))
            .unwrap();
        assert_eq!(checked.get("limit"), Some(&json!(5)));
        assert!(!checked.contains_key("junk"));
    }

    #[test]
    fn test_validate_reports_missing_field() {
        let err = EchoTool.schema().validate(&args(json!({"limit": 3}))).unwrap_err();
        assert_eq!(
            err,
            DirectiveError::MissingArgument {
                tool: "echo".into(),
                field: "address".into()
            }
        );
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let err = EchoTool
            .schema()
            .validate(&args(json!({"address": 12})))
            .unwrap_err();
        assert!(matches!(
            err,
            DirectiveError::InvalidArgument { ref field, .. } if field == "address"
        ));
    }

    #[tokio::test]
    async fn test_registry_invoke() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.catalog()[0].category, ToolCategory::General);

        let call = ToolCall::new("echo", args(json!({"address": "0xabc"})));
        let result = registry.invoke(&call).await.unwrap();
        assert_eq!(result.output, "0xabc 5");

        let missing = ToolCall::new("nope", ToolArguments::new());
        assert!(matches!(registry.invoke(&missing).await, Err(AnalystError::UnknownTool(_))));
    }

    #[test]
    fn test_result_emptiness_and_summary() {
        assert!(ToolResult::success("t", "  ").is_empty());
        assert!(ToolResult::success("t", "").with_data(json!([])).is_empty());
        assert!(!ToolResult::success("t", "").with_data(json!({"wei": 0})).is_empty());

        let long = ToolResult::success("t", "a\nb   c ".repeat(20));
        assert!(long.summary(10).ends_with("..."));
        assert!(!long.summary(10).contains('\n'));
    }
}
