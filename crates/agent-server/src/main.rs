//! Agent HTTP Server
//!
//! Axum-based server exposing the tool-calling chat agent as a JSON
//! endpoint and an SSE stream. Each request runs its own agent with its
//! own tool-server connections.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::AgentConfig;
use agent_runtime::{MistralProvider, StdioConnector, resolve_specs};

use crate::handlers::{chat_handler, chat_stream_handler, health_check};
use crate::state::AppState;

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

    // Chat service client
    let provider = MistralProvider::from_env()?;
    let model = provider.model().to_string();
    tracing::info!("Chat provider configured for model {model}");

    // Tool server specs; connections are made per request
    let servers = resolve_specs(None)?;
    for spec in &servers {
        tracing::info!("  Tool server: {} ({} {})", spec.name, spec.command, spec.args.join(" "));
    }

    // Build application state
    let state = AppState {
        chat: Arc::new(provider),
        model,
        connector: StdioConnector::new(),
        servers: Arc::new(servers),
        agent_config: AgentConfig::default(),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 agent-server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  POST /api/chat         - Send message, single JSON reply");
    tracing::info!("  POST /api/chat/stream  - Send message, SSE output stream");

    axum::serve(listener, app).await?;

    Ok(())
}
