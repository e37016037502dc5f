//! HTTP Handlers
//!
//! Two shapes over the same conversation driver: a request/response JSON
//! endpoint and an SSE stream with one frame per output item. Both spawn
//! the driver on its own task so provider disconnection still runs when a
//! client aborts mid-stream.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use agent_core::{Agent, AgentError, DEFAULT_SYSTEM_PROMPT, Message, TurnInput};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub tool_servers: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub first_message: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// One SSE frame: an output item, the completion marker, or a failure
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StreamFrame {
    Content { content: String },
    Done { done: bool },
    Error { error: String },
}

/// Events forwarded from the conversation driver task
enum TurnEvent {
    Item(String),
    Failed(AgentError),
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.model.clone(),
        tool_servers: state.servers.len(),
    })
}

/// Chat endpoint: runs the whole conversation and answers with one reply
/// built from every output item
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.message.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Message is required",
            "MESSAGE_REQUIRED",
        ));
    }

    let (tx, mut rx) = mpsc::channel(32);
    tokio::spawn(run_conversation(
        state,
        payload.first_message,
        payload.message,
        tx,
    ));

    let mut outputs = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Item(text) => outputs.push(text),
            TurnEvent::Failed(e) => {
                tracing::error!("Agent error: {e}");
                let (status, code) = match e {
                    AgentError::Connect { .. } => (StatusCode::BAD_GATEWAY, "CONNECT_ERROR"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
                };
                return Err(error_response(status, &e.user_message(), code));
            }
        }
    }

    Ok(Json(ChatResponse {
        reply: outputs.join("\n"),
        conversation_id: payload
            .conversation_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        timestamp: Utc::now(),
    }))
}

/// Streaming chat endpoint: one SSE frame per output item, then `{done}`
pub async fn chat_stream_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<
    Sse<impl Stream<Item = Result<Event, Infallible>>>,
    (StatusCode, Json<ErrorResponse>),
> {
    if payload.message.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Message is required",
            "MESSAGE_REQUIRED",
        ));
    }

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(run_conversation(
        state,
        payload.first_message,
        payload.message,
        tx,
    ));

    let stream = async_stream::stream! {
        let mut rx = rx;
        let mut failed = false;
        while let Some(event) = rx.recv().await {
            let frame = match event {
                TurnEvent::Item(content) => StreamFrame::Content { content },
                TurnEvent::Failed(e) => {
                    failed = true;
                    StreamFrame::Error { error: e.to_string() }
                }
            };
            match Event::default().json_data(&frame) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::error!("Failed to serialize SSE frame: {e}"),
            }
            if failed {
                break;
            }
        }
        if !failed {
            if let Ok(event) = Event::default().json_data(&StreamFrame::Done { done: true }) {
                yield Ok(event);
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}

fn error_response(
    status: StatusCode,
    error: &str,
    code: &str,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Conversation driver
// ============================================================================

/// Connect, run the turn(s), disconnect. Runs on its own task so the
/// disconnect is reached even when the consumer goes away mid-stream:
/// a closed channel only stops forwarding, never the teardown.
async fn run_conversation(
    state: AppState,
    first_message: bool,
    message: String,
    tx: mpsc::Sender<TurnEvent>,
) {
    let mut agent = Agent::new(state.chat.clone(), state.agent_config.clone());

    if let Err(e) = agent.connect(&state.connector, &state.servers).await {
        tracing::error!("Provider connect failed: {e}");
        let _ = tx.send(TurnEvent::Failed(e)).await;
        return;
    }

    let result = drive_turns(&mut agent, first_message, &message, &tx).await;

    if let Err(e) = agent.disconnect().await {
        tracing::warn!("Provider disconnect failed: {e}");
    }

    if let Err(e) = result {
        let _ = tx.send(TurnEvent::Failed(e)).await;
    }
}

async fn drive_turns(
    agent: &mut Agent,
    first_message: bool,
    message: &str,
    tx: &mpsc::Sender<TurnEvent>,
) -> agent_core::Result<()> {
    if first_message {
        let input = TurnInput::Message(Message::system(DEFAULT_SYSTEM_PROMPT));
        if !forward_turn(agent, input, tx).await? {
            return Ok(());
        }
    }

    forward_turn(agent, TurnInput::Text(message.into()), tx).await?;
    Ok(())
}

/// Forward one turn's output items; returns false when the consumer is gone
async fn forward_turn(
    agent: &mut Agent,
    input: TurnInput,
    tx: &mpsc::Sender<TurnEvent>,
) -> agent_core::Result<bool> {
    let stream = agent.turn(input);
    futures::pin_mut!(stream);
    while let Some(item) = stream.next().await {
        match item {
            Ok(text) => {
                if tx.send(TurnEvent::Item(text)).await.is_err() {
                    return Ok(false);
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
