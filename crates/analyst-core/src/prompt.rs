//! Prompt Assembly
//!
//! Two modes. The first turn of a session gets the full catalog with worked
//! examples; later turns get only the diversity subset, one example per
//! category and the compressed conversation state. The persona text is
//! always carried verbatim.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Value, json};

use crate::conversation::{AliasTable, ConversationEntry, EntityKind};
use crate::directive::DIRECTIVE_MARKER;
use crate::message::{History, Message, estimate_tokens};
use crate::tool::{ParameterSchema, ToolCall, ToolCategory, ToolResult, ToolSchema};

const SAMPLE_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
const SAMPLE_TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const SAMPLE_TX_HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";
const FULL_EXAMPLES_PER_CATEGORY: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    Full,
    Compressed,
}

impl std::fmt::Display for PromptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Compressed => f.write_str("compressed"),
        }
    }
}

/// System instructions for one turn plus the tools they offer
#[derive(Clone, Debug, Serialize)]
pub struct AssembledPrompt {
    pub mode: PromptMode,
    pub instructions: String,
    pub offered_tools: Vec<String>,
    pub estimated_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct PromptAssembler {
    history_window: usize,
}

impl PromptAssembler {
    pub const fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    /// First-turn prompt: the entire catalog
    pub fn full(&self, persona: &str, catalog: &[ToolSchema]) -> AssembledPrompt {
        let mut out = String::new();
        push_rules(&mut out);
        push_persona(&mut out, persona);

        out.push_str("## Available tools\n");
        for tool in catalog {
            push_tool(&mut out, tool);
        }

        out.push_str("\n## Examples\n");
        for category in categories_in(catalog.iter()) {
            let in_category = catalog.iter().filter(|t| t.category == category);
            for tool in in_category.take(FULL_EXAMPLES_PER_CATEGORY) {
                push_example(&mut out, tool, &AliasTable::new(), false);
                if tool.parameters.iter().any(|p| !p.required) {
                    push_example(&mut out, tool, &AliasTable::new(), true);
                }
            }
        }

        finish(PromptMode::Full, out, catalog.iter().map(|t| t.name.clone()).collect())
    }

    /// Later-turn prompt: the offered subset and the conversation state.
    ///
    /// `offered` keeps its order; names missing from `catalog` are skipped.
    pub fn compressed(
        &self,
        persona: &str,
        catalog: &[ToolSchema],
        offered: &[String],
        entry: &ConversationEntry,
    ) -> AssembledPrompt {
        let tools: Vec<&ToolSchema> = offered
            .iter()
            .filter_map(|name| catalog.iter().find(|t| &t.name == name))
            .collect();

        let mut out = String::new();
        push_rules(&mut out);
        push_persona(&mut out, persona);

        out.push_str("## Conversation so far\n");
        out.push_str(&entry.summary());

        if !entry.aliases.is_empty() {
            out.push_str(
                "\n## Aliases\n\
                 Use these short names in tool arguments; they are expanded for you.\n",
            );
            for alias in entry.aliases.entries() {
                let _ = writeln!(out, "{} = {}", alias.alias, alias.value);
            }
        }

        out.push_str("\n## Available tools\n");
        for tool in &tools {
            push_tool(&mut out, tool);
        }

        out.push_str("\n## Examples\n");
        for category in categories_in(tools.iter().copied()) {
            if let Some(tool) = tools.iter().find(|t| t.category == category) {
                push_example(&mut out, tool, &entry.aliases, false);
            }
        }

        finish(
            PromptMode::Compressed,
            out,
            tools.iter().map(|t| t.name.clone()).collect(),
        )
    }

    /// History forwarded on a compressed turn: the most recent window with
    /// known values replaced by their aliases
    pub fn compressed_history(&self, history: &History, aliases: &AliasTable) -> Vec<Message> {
        history
            .recent(self.history_window)
            .into_iter()
            .map(|m| m.with_content(aliases.compress(&m.content)))
            .collect()
    }

    /// Messages for the post-tool follow-up. Carries the result only, never the catalog.
    pub fn follow_up(
        &self,
        persona: &str,
        query: &str,
        call: &ToolCall,
        result: &ToolResult,
    ) -> Vec<Message> {
        let mut system = String::new();
        push_persona(&mut system, persona);
        system.push_str(
            "## Task\nAnswer the user's question using only the tool result below. \
             Be brief. Do not request another tool \
             and do not invent values that are not in the result.\n",
        );

        let mut payload = format!("Result of {}:\n{}", call.name, result.output);
        if let Some(data) = &result.data {
            let _ = write!(payload, "\n\nData:\n{data}");
        }

        vec![Message::system(system), Message::user(query), Message::tool(payload)]
    }
}

fn finish(mode: PromptMode, instructions: String, offered_tools: Vec<String>) -> AssembledPrompt {
    let estimated_tokens = estimate_tokens(&instructions);
    tracing::debug!(%mode, tools = offered_tools.len(), estimated_tokens, "Assembled prompt");
    AssembledPrompt {
        mode,
        instructions,
        offered_tools,
        estimated_tokens,
    }
}

fn push_rules(out: &mut String) {
    let _ = write!(
        out,
        "## Rules\n\
         To look up on-chain data, reply with exactly one line:\n\
         {DIRECTIVE_MARKER} <tool_name> {{\"parameter\": \"value\"}}\n\
         Reply with either one {DIRECTIVE_MARKER} line or plain prose, never both.\n\
         Only use the tools listed below, with a JSON object of arguments.\n\
         If a tool returns empty or null data, say that no data was returned. \
         Never invent data.\n\n"
    );
}

fn push_persona(out: &mut String, persona: &str) {
    out.push_str("## Persona\n");
    out.push_str(persona);
    out.push_str("\n\n");
}

fn push_tool(out: &mut String, tool: &ToolSchema) {
    let params = tool
        .parameters
        .iter()
        .map(|p| {
            let marker = if p.required { "" } else { "?" };
            let mut s = format!("{}{marker}: {}", p.name, p.param_type);
            if let Some(default) = &p.default {
                let _ = write!(s, " = {default}");
            }
            s
        })
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "- {}({params}): {}", tool.name, tool.description);
}

fn push_example(out: &mut String, tool: &ToolSchema, aliases: &AliasTable, with_optional: bool) {
    let mut args = serde_json::Map::new();
    for param in &tool.parameters {
        if param.required {
            args.insert(param.name.clone(), sample_value(param, aliases));
        } else if with_optional {
            let value = param
                .default
                .clone()
                .unwrap_or_else(|| sample_value(param, aliases));
            args.insert(param.name.clone(), value);
        }
    }
    let _ = writeln!(out, "{DIRECTIVE_MARKER} {} {}", tool.name, Value::Object(args));
}

/// Example value for a parameter; prefers a session alias of the right kind
fn sample_value(param: &ParameterSchema, aliases: &AliasTable) -> Value {
    if let Some(first) = param.enum_values.as_ref().and_then(|values| values.first()) {
        return first.clone();
    }

    let name = param.name.to_lowercase();
    let kind = if name.contains("hash") || name == "tx" {
        Some(EntityKind::TxHash)
    } else if name.contains("token") || name.contains("contract") {
        Some(EntityKind::TokenContract)
    } else if name.contains("address") || name.contains("wallet") {
        Some(EntityKind::Address)
    } else {
        None
    };

    if let Some(kind) = kind {
        if let Some(alias) = aliases.entries().iter().find(|e| e.kind == kind) {
            return Value::String(alias.alias.clone());
        }
        return Value::String(
            match kind {
                EntityKind::Address => SAMPLE_ADDRESS,
                EntityKind::TokenContract => SAMPLE_TOKEN,
                EntityKind::TxHash => SAMPLE_TX_HASH,
            }
            .into(),
        );
    }

    match param.param_type.as_str() {
        "integer" if name.contains("block") || name == "number" => json!(19_000_000),
        "integer" | "number" => json!(5),
        "boolean" => json!(true),
        "array" => json!([]),
        "object" => json!({}),
        _ => param.default.clone().unwrap_or_else(|| json!("ethereum")),
    }
}

/// Distinct categories in first-seen order
fn categories_in<'a>(tools: impl Iterator<Item = &'a ToolSchema>) -> Vec<ToolCategory> {
    let mut seen = Vec::new();
    for tool in tools {
        if !seen.contains(&tool.category) {
            seen.push(tool.category);
        }
    }
    seen
}
