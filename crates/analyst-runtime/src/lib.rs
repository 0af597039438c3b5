//! # analyst-runtime
//!
//! Model runtime providers for the chain analyst.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use analyst_runtime::ollama::OllamaProvider;
//!
//! let provider = OllamaProvider::from_env();
//! let orchestrator = SessionOrchestrator::builder(config)
//!     .model(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use analyst_core::{
    AnalystError, Completion, GenerationOptions, LlmProvider, Message, Result, Role,
};
