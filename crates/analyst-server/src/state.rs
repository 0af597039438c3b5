//! Application State

use std::sync::Arc;

use analyst_core::{LlmProvider, SessionOrchestrator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Turn processing and session lifecycle
    pub orchestrator: Arc<SessionOrchestrator>,

    /// Same provider the orchestrator uses; kept for health and model listing
    pub provider: Arc<dyn LlmProvider>,
}
