//! # analyst-core
//!
//! Request core of the chain analyst: per-turn orchestration, conversation
//! caching, prompt assembly, tool-call parsing and tool result memoization.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SessionOrchestrator                         │
//! │  ┌──────────────┐  ┌────────────────┐  ┌──────────────────────┐  │
//! │  │ SessionStore │  │ Conversation   │  │  PromptAssembler     │  │
//! │  │              │──│ Cache          │──│  (full / compressed) │  │
//! │  └──────────────┘  └────────────────┘  └──────────────────────┘  │
//! │  ┌──────────────┐  ┌────────────────┐  ┌──────────────────────┐  │
//! │  │ LlmProvider  │──│ ToolCallParser │──│  ToolResultCache     │  │
//! │  │  (Strategy)  │  │                │  │  → ToolProvider      │  │
//! │  └──────────────┘  └────────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All stores are constructed once and handed to the orchestrator; nothing
//! lives in global state.

pub mod cache;
pub mod config;
pub mod conversation;
pub mod directive;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod persona;
pub mod prompt;
pub mod provider;
pub mod session;
pub mod sink;
pub mod sweeper;
pub mod tool;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, Sweep, ToolResultCache, TtlCache};
pub use config::AnalystConfig;
pub use conversation::{ConversationCache, ConversationEntry, Intent};
pub use directive::{DirectiveError, ParseOutcome, ToolCallParser};
pub use error::{AnalystError, Result};
pub use message::{Message, Role};
pub use orchestrator::{Degradation, DegradationKind, SessionOrchestrator, TurnOutcome, TurnRequest};
pub use persona::{Persona, PersonaSource, StaticPersonaSource};
pub use prompt::{AssembledPrompt, PromptAssembler, PromptMode};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use session::{Session, SessionId, SessionStore};
pub use sink::{InvocationSink, LogSink, ToolInvocation};
pub use tool::{Tool, ToolCall, ToolCategory, ToolProvider, ToolRegistry, ToolResult, ToolSchema};
