//! Error Types

use thiserror::Error;

use crate::directive::DirectiveError;

/// Result type alias for analyst operations
pub type Result<T> = std::result::Result<T, AnalystError>;

/// Analyst error types
#[derive(Error, Debug)]
pub enum AnalystError {
    /// Directive text could not be parsed
    #[error("Parse error: {reason}")]
    Parse { reason: String, fragment: String },

    /// Directive named a tool that was not offered this turn
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Required parameter absent from a directive
    #[error("Missing argument '{field}' for tool {tool}")]
    MissingArgument { tool: String, field: String },

    /// Parameter present but of the wrong JSON type
    #[error("Invalid argument '{field}' for tool {tool}: expected {expected}")]
    InvalidArgument {
        tool: String,
        field: String,
        expected: String,
    },

    /// Alias was never introduced in this session
    #[error("Unknown alias: {0}")]
    AliasResolution(String),

    /// Tool provider failed or timed out
    #[error("Tool execution error: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    /// Model failed or timed out
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Model answered in prose when a tool call was expected
    #[error("No tool call detected")]
    NoToolCallDetected,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache backing store error
    #[error("Store error: {0}")]
    Store(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AnalystError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable(_) | Self::ToolExecution { .. } | Self::Store(_) | Self::Io(_)
        )
    }

    /// Short, explicit message safe to show to the user.
    ///
    /// Never contains a data value: a failed lookup must not read like an answer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Parse { .. }
            | Self::UnknownTool(_)
            | Self::MissingArgument { .. }
            | Self::InvalidArgument { .. }
            | Self::AliasResolution(_) => {
                "I couldn't turn that into a valid data lookup. \
                 Could you rephrase the request?"
                    .into()
            }
            Self::ToolExecution { tool, .. } => format!(
                "The {tool} lookup failed, so I don't have that data right now. \
                 Please try again shortly."
            ),
            Self::ModelUnavailable(_) => {
                "The analysis service is currently unavailable. \
                 Please try again in a moment."
                    .into()
            }
            Self::NoToolCallDetected => {
                "I wasn't able to look that up. \
                 Try naming the address, transaction or token explicitly."
                    .into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<DirectiveError> for AnalystError {
    fn from(err: DirectiveError) -> Self {
        match err {
            DirectiveError::Parse { reason, fragment } => Self::Parse { reason, fragment },
            DirectiveError::UnknownTool { name, .. } => Self::UnknownTool(name),
            DirectiveError::MissingArgument { tool, field } => {
                Self::MissingArgument { tool, field }
            }
            DirectiveError::InvalidArgument {
                tool,
                field,
                expected,
            } => Self::InvalidArgument {
                tool,
                field,
                expected,
            },
            DirectiveError::AliasResolution { alias } => Self::AliasResolution(alias),
        }
    }
}

impl From<anyhow::Error> for AnalystError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
