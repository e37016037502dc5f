//! # agent-runtime
//!
//! Runtime implementations of the `agent-core` trait seams.
//!
//! ## Providers
//!
//! - **Mistral** (default feature): chat completions over Mistral's HTTP API
//! - **MCP/stdio**: tool servers launched as child processes and spoken to
//!   over the Model Context Protocol
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{MistralProvider, StdioConnector, default_specs};
//!
//! let chat = Arc::new(MistralProvider::from_env()?);
//! let mut agent = Agent::with_defaults(chat);
//! agent.connect(&StdioConnector::new(), &default_specs()).await?;
//! ```

pub mod mcp;

#[cfg(feature = "mistral")]
pub mod mistral;

pub use mcp::{McpToolProvider, StdioConnector, default_specs, load_specs, resolve_specs};

#[cfg(feature = "mistral")]
pub use mistral::{MistralConfig, MistralProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentConfig, AgentError, ChatProvider, Conversation, Message, ProviderSpec, Result,
    Role, ToolProvider, ToolProviderRegistry, TurnInput,
};
