//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use analyst_core::{
    Session, SessionId, TurnOutcome, TurnRequest, orchestrator::OrchestratorStats,
    provider::ModelInfo,
};

use crate::state::AppState;

const DEFAULT_SESSION_PAGE: usize = 50;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub model_connected: bool,
    pub stats: OrchestratorStats,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
}

impl From<ChatRequest> for TurnRequest {
    fn from(req: ChatRequest) -> Self {
        Self {
            session_id: req.session_id.map(SessionId::from_string),
            user_id: req.user_id,
            persona_id: req.persona,
            text: req.message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.orchestrator.config().model.name.clone(),
        model_connected,
        stats: state.orchestrator.stats(),
    })
}

/// Models the provider can serve
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    state.provider.list_models().await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, "Model listing failed");
        api_error(StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE", e.user_message())
    })
}

/// Process one chat turn
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_MESSAGE",
            "message must not be empty",
        ));
    }

    let outcome = state
        .orchestrator
        .process_turn(payload.into())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Turn failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "TURN_ERROR", e.user_message())
        })?;

    Ok(Json(outcome))
}

/// Live sessions, most recent first
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<Vec<Session>> {
    let limit = query.limit.unwrap_or(DEFAULT_SESSION_PAGE);
    Json(state.orchestrator.sessions().list(query.user_id.as_deref(), limit))
}

/// End a session and drop its conversation state
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.orchestrator.end_session(&SessionId::from_string(id)) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", "no such session"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use analyst_core::{
        AnalystConfig, AnalystError, Completion, GenerationOptions, LlmProvider, Message,
        SessionOrchestrator,
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chain_tools::MockChainClient;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    /// Replies from a fixed queue, then a plain sentence
    struct QueuedModel(Mutex<VecDeque<String>>);

    impl QueuedModel {
        fn new(replies: &[&str]) -> Self {
            Self(Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()))
        }
    }

    #[async_trait]
    impl LlmProvider for QueuedModel {
        fn name(&self) -> &str {
            "queued"
        }

        async fn health_check(&self) -> analyst_core::Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _: &[Message],
            options: &GenerationOptions,
        ) -> analyst_core::Result<Completion> {
            let next = self.0.lock().unwrap().pop_front();
            next.map(|text| Completion::text(text, options.model.clone()))
                .ok_or_else(|| AnalystError::ModelUnavailable("queue drained".into()))
        }
    }

    fn state(replies: &[&str]) -> AppState {
        let provider: Arc<dyn LlmProvider> = Arc::new(QueuedModel::new(replies));
        let orchestrator = SessionOrchestrator::builder(AnalystConfig::default())
            .model(provider.clone())
            .tools(Arc::new(chain_tools::registry(Arc::new(MockChainClient::new()))))
            .personas(Arc::new(chain_tools::personas()))
            .build()
            .unwrap();

        AppState {
            orchestrator: Arc::new(orchestrator),
            provider,
        }
    }

    fn chat(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = crate::router(state(&[]));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["model_connected"], true);
        assert_eq!(json["stats"]["sessions"], 0);
    }

    #[tokio::test]
    async fn test_chat_runs_tool_and_follow_up() {
        let app = crate::router(state(&["TOOL_CALL: get_gas_price {}", "Gas is cheap right now."]));

        let response = app
            .oneshot(chat(
                serde_json::json!({"message": "What are gas fees like?", "user_id": "u1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["reply"], "Gas is cheap right now.");
        assert_eq!(json["mode"], "full");
        assert_eq!(json["tools_invoked"][0]["tool"], "get_gas_price");
        assert!(json.get("degraded").is_none());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let app = crate::router(state(&[]));
        let response = app.oneshot(chat(serde_json::json!({"message": "   "}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "EMPTY_MESSAGE");
    }

    #[tokio::test]
    async fn test_session_listing_and_ending() {
        let state = state(&["Hello! Ask me about any address."]);

        let response = crate::router(state.clone())
            .oneshot(chat(
                serde_json::json!({"message": "hi", "session_id": "s1", "user_id": "u1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder().uri("/api/sessions?user_id=u1").body(Body::empty()).unwrap();
        let listed = json_body(crate::router(state.clone()).oneshot(req).await.unwrap()).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        assert_eq!(listed[0]["id"], "s1");

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri("/api/sessions/s1")
                .body(Body::empty())
                .unwrap()
        };
        let first = crate::router(state.clone()).oneshot(delete()).await.unwrap();
        assert_eq!(first.status(), StatusCode::NO_CONTENT);
        let second = crate::router(state).oneshot(delete()).await.unwrap();
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
    }
}
