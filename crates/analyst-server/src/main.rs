//! Chain Analyst HTTP Server
//!
//! Axum-based server exposing the analyst turn pipeline over REST.
//! Everything is constructed once here and shared through [`AppState`].

mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analyst_core::{
    AnalystConfig, LlmProvider, LogSink, SessionOrchestrator, sweeper::spawn_sweeper,
};
use analyst_runtime::OllamaProvider;
use chain_tools::{ChainClient, MockChainClient};

use crate::handlers::{chat_handler, end_session, health_check, list_models, list_sessions};
use crate::state::AppState;

/// API routes
fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        // Analyst API
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", delete(end_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = AnalystConfig::load()?;
    tracing::info!(model = %config.model.name, "Configuration loaded");

    // Initialize LLM provider
    let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::from_env());

    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - turns will degrade to template replies");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    // Chain data source
    let latency = std::env::var("MOCK_CHAIN_LATENCY_MS")
        .ok()
        .and_then(|ms| ms.parse().ok())
        .map_or(Duration::ZERO, Duration::from_millis);
    let chain: Arc<dyn ChainClient> = Arc::new(MockChainClient::with_latency(latency));
    tracing::info!(client = chain.name(), "Chain client ready");

    let tools = chain_tools::registry(chain);
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let sweep_every = Duration::from_secs(config.cache.sweep_interval_secs);
    let orchestrator = SessionOrchestrator::builder(config)
        .model(provider.clone())
        .tools(Arc::new(tools))
        .personas(Arc::new(chain_tools::personas()))
        .sink(Arc::new(LogSink))
        .build()?;
    let orchestrator = Arc::new(orchestrator);

    let sweeper = spawn_sweeper(orchestrator.sweep_targets(), sweep_every);

    let state = AppState {
        orchestrator,
        provider,
    };

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("chain analyst running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health             - Health check and cache stats");
    tracing::info!("  GET    /api/models         - List available models");
    tracing::info!("  POST   /api/chat           - Send message");
    tracing::info!("  GET    /api/sessions       - List live sessions");
    tracing::info!("  DELETE /api/sessions/{{id}}  - End a session");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    Ok(())
}
