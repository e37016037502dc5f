//! Chat Service Contract
//!
//! The orchestration loop talks to the language model exclusively through
//! [`ChatProvider`]: given the full history and the tool definitions, the
//! service returns either a textual reply or a set of tool-call requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCallRequest, ToolDefinition};

/// Reason a completion finished
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ModelLength,
    ToolCalls,
    ContentFilter,
    Error,
    #[serde(other)]
    Other,
}

/// The first (only) completion choice of a chat response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Textual reply, absent when the model only requests tools
    pub content: Option<String>,

    /// Tool calls, in the order the model emitted them
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Why the completion ended
    pub finish_reason: FinishReason,

    /// Model that produced the completion
    pub model: String,
}

impl ChatCompletion {
    /// Whether the finish reason indicates tool calls to resolve
    pub fn wants_tools(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls
    }
}

/// Strategy trait for the chat completion service
///
/// Implementations own transport, authentication and model selection; the
/// agent only ever sends history plus tool definitions and inspects the
/// completion that comes back.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate a completion from the full message history and tool list
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletion>;
}
