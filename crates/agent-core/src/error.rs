//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// The chat service response violates the expected shape
    /// (missing choices, tool calls flagged but absent, missing call id)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The chat service rejected the request or failed at transport level
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool name not bound to any connected provider
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A tool provider failed while executing a call
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// A tool result carried neither content nor a raw tool result
    #[error("Invalid tool result: {0}")]
    ResultShape(String),

    /// Failure connecting to a tool provider during setup
    #[error("Failed to connect to provider '{server}': {reason}")]
    Connect { server: String, reason: String },

    /// Malformed tool-call arguments or similar parse failure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Maximum tool-call hops reached within a single turn
    #[error("Maximum tool-call hops ({0}) reached")]
    MaxHops(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

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

impl AgentError {
    /// Whether the turn can keep running after this error (call-local failures)
    pub fn is_call_local(&self) -> bool {
        matches!(
            self,
            AgentError::ToolNotFound(_) | AgentError::ToolExecution(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::Connect { server, .. } => {
                format!("Could not reach the tool server '{}'.", server)
            }
            AgentError::MaxHops(_) => {
                "The request took too many tool calls to process. Please try a simpler query."
                    .into()
            }
            AgentError::Config(msg) => msg.clone(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
