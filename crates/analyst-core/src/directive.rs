//! Tool-call directive parsing.
//!
//! The model requests a tool with one line of free text:
//!
//! ```text
//! TOOL_CALL: get_balance {"address": "addr1"}
//! ```
//!
//! [`ToolCallParser`] finds the directive, parses its JSON arguments and
//! validates them against the tools offered this turn. Parsing is an explicit
//! state machine: `Scanning → DirectiveFound → ArgsParsed → Valid | Invalid`.

use serde::Serialize;
use thiserror::Error;

use crate::conversation::AliasTable;
use crate::tool::{ToolArguments, ToolCall, ToolSchema};

/// Marker that opens a directive
pub const DIRECTIVE_MARKER: &str = "TOOL_CALL:";

const MAX_FRAGMENT_CHARS: usize = 200;

/// Why a directive was rejected
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectiveError {
    #[error("malformed directive: {reason}")]
    Parse { reason: String, fragment: String },

    #[error("tool '{name}' was not offered this turn")]
    UnknownTool {
        name: String,
        /// The tool exists in the full catalog but wasn't in the offered subset
        in_catalog: bool,
    },

    #[error("missing argument '{field}' for {tool}")]
    MissingArgument { tool: String, field: String },

    #[error("argument '{field}' for {tool} must be {expected}")]
    InvalidArgument {
        tool: String,
        field: String,
        expected: String,
    },

    #[error("alias '{alias}' is not known in this session")]
    AliasResolution { alias: String },
}

/// Parser state. Terminal states are `Valid`, `Invalid` and `Scanning` with
/// no marker left in the text.
#[derive(Clone, Debug, PartialEq)]
pub enum ParserState {
    Scanning,
    DirectiveFound { tool: String, json_start: usize },
    ArgsParsed { tool: String, arguments: ToolArguments },
    Valid(ToolCall),
    Invalid(DirectiveError),
}

/// What the parser made of a model reply
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    /// Plain prose reply
    NoDirective { prose: String },

    /// A validated call; `arguments` are alias-expanded and schema-checked
    Valid { call: ToolCall, prose: String },

    /// A directive was present but rejected
    Invalid { error: DirectiveError, prose: String },
}

impl ParseOutcome {
    /// Reply text with the directive span removed
    pub fn prose(&self) -> &str {
        match self {
            Self::NoDirective { prose }
            | Self::Valid { prose, .. }
            | Self::Invalid { prose, .. } => prose,
        }
    }

    pub const fn call(&self) -> Option<&ToolCall> {
        match self {
            Self::Valid { call, .. } => Some(call),
            _ => None,
        }
    }
}

/// Stateless parser bound to one turn's offered tools and alias table
pub struct ToolCallParser<'a> {
    offered: &'a [String],
    catalog: &'a [ToolSchema],
    aliases: &'a AliasTable,
}

impl<'a> ToolCallParser<'a> {
    pub const fn new(
        offered: &'a [String],
        catalog: &'a [ToolSchema],
        aliases: &'a AliasTable,
    ) -> Self {
        Self {
            offered,
            catalog,
            aliases,
        }
    }

    /// Parse the first directive in `text`
    pub fn parse(&self, text: &str) -> ParseOutcome {
        let mut state = ParserState::Scanning;
        let mut span: Option<(usize, usize)> = None;

        loop {
            state = match state {
                ParserState::Scanning => {
                    let Some(start) = text.find(DIRECTIVE_MARKER) else {
                        return ParseOutcome::NoDirective {
                            prose: clean_prose(text),
                        };
                    };
                    span = Some((start, text.len()));
                    scan_header(text, start)
                }
                ParserState::DirectiveFound { tool, json_start } => {
                    match extract_object(text, json_start) {
                        Ok((arguments, end)) => {
                            span = span.map(|(start, _)| (start, end));
                            ParserState::ArgsParsed { tool, arguments }
                        }
                        Err(err) => ParserState::Invalid(err),
                    }
                }
                ParserState::ArgsParsed { tool, arguments } => {
                    match self.validate(&tool, &arguments) {
                        Ok(call) => ParserState::Valid(call),
                        Err(err) => ParserState::Invalid(err),
                    }
                }
                ParserState::Valid(call) => {
                    return ParseOutcome::Valid {
                        call,
                        prose: remove_span(text, span),
                    };
                }
                ParserState::Invalid(error) => {
                    tracing::debug!(error = %error, "Rejected tool directive");
                    return ParseOutcome::Invalid {
                        error,
                        prose: remove_span(text, span),
                    };
                }
            };
        }
    }

    /// Offered set, then alias expansion, then schema.
    fn validate(&self, tool: &str, arguments: &ToolArguments) -> Result<ToolCall, DirectiveError> {
        let schema = self
            .catalog
            .iter()
            .find(|schema| schema.name == tool)
            .filter(|_| self.offered.iter().any(|name| name == tool))
            .ok_or_else(|| DirectiveError::UnknownTool {
                name: tool.to_string(),
                in_catalog: self.catalog.iter().any(|schema| schema.name == tool),
            })?;

        let mut expanded = ToolArguments::new();
        for (key, value) in arguments {
            expanded.insert(key.clone(), self.expand(value)?);
        }

        let checked = schema.validate(&expanded)?;
        Ok(ToolCall::new(tool, checked))
    }

    fn expand(&self, value: &serde_json::Value) -> Result<serde_json::Value, DirectiveError> {
        use serde_json::Value;

        match value {
            Value::String(s) => match self.aliases.resolve(s.trim()) {
                Some(full) => Ok(Value::String(full.to_string())),
                None if AliasTable::is_alias_shaped(s.trim()) => {
                    Err(DirectiveError::AliasResolution {
                        alias: s.trim().to_string(),
                    })
                }
                None => Ok(value.clone()),
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, item) in map {
                    out.insert(key.clone(), self.expand(item)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Read the tool name after the marker and locate the opening brace.
fn scan_header(text: &str, marker_start: usize) -> ParserState {
    let after = marker_start + DIRECTIVE_MARKER.len();
    let rest = &text[after..];
    let name_offset = rest.len() - rest.trim_start().len();
    let name_len = rest[name_offset..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        .unwrap_or(rest.len() - name_offset);

    if name_len == 0 {
        return ParserState::Invalid(DirectiveError::Parse {
            reason: "missing tool name".into(),
            fragment: fragment(&text[marker_start..]),
        });
    }
    let tool = rest[name_offset..name_offset + name_len].to_string();

    let tail = &rest[name_offset + name_len..];
    let gap = tail.len() - tail.trim_start().len();
    if !tail[gap..].starts_with('{') {
        return ParserState::Invalid(DirectiveError::Parse {
            reason: format!("expected a JSON object after tool name '{tool}'"),
            fragment: fragment(&text[marker_start..]),
        });
    }

    ParserState::DirectiveFound {
        tool,
        json_start: after + name_offset + name_len + gap,
    }
}

/// Parse the balanced JSON object starting at `start`, returning it and the
/// byte offset just past its closing brace.
fn extract_object(text: &str, start: usize) -> Result<(ToolArguments, usize), DirectiveError> {
    let end = matching_brace(&text[start..])
        .map(|len| start + len)
        .ok_or_else(|| DirectiveError::Parse {
            reason: "unterminated JSON object".into(),
            fragment: fragment(&text[start..]),
        })?;

    let raw = &text[start..end];
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok((map, end)),
        Ok(_) => Err(DirectiveError::Parse {
            reason: "arguments must be a JSON object".into(),
            fragment: fragment(raw),
        }),
        Err(e) => Err(DirectiveError::Parse {
            reason: e.to_string(),
            fragment: fragment(raw),
        }),
    }
}

/// Length of the `{ ... }` prefix of `s`, ignoring braces inside strings
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn fragment(s: &str) -> String {
    let line = s.trim();
    if line.chars().count() > MAX_FRAGMENT_CHARS {
        line.chars().take(MAX_FRAGMENT_CHARS).collect()
    } else {
        line.to_string()
    }
}

fn remove_span(text: &str, span: Option<(usize, usize)>) -> String {
    match span {
        Some((start, end)) => clean_prose(&format!("{}{}", &text[..start], &text[end..])),
        None => clean_prose(text),
    }
}

/// Trim and drop code fences left empty once the directive is removed
fn clean_prose(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim_start().starts_with("```") {
            let mut j = i + 1;
            while j < lines.len() && lines[j].trim().is_empty() {
                j += 1;
            }
            if j < lines.len() && lines[j].trim() == "```" {
                i = j + 1;
                continue;
            }
        }
        kept.push(lines[i]);
        i += 1;
    }
    kept.join("\n").trim().to_string()
}
