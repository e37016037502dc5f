//! # agent-core
//!
//! Orchestration core for a tool-calling chat agent: connection management
//! to external tool providers, tool-schema translation, and the chat/tool-call
//! resolution loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Agent                                │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐  │
//! │  │  Turn Loop   │──│ ToolProvider  │──│  ChatProvider    │  │
//! │  │ (+ history)  │  │   Registry    │  │  (chat service)  │  │
//! │  └──────────────┘  └───────────────┘  └──────────────────┘  │
//! │          │                  │                                │
//! │          └── convert ───────┘   (schemas, calls, results)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ChatProvider` and `ToolProvider` traits keep the loop independent of
//! any concrete model API or tool-server transport; implementations live in
//! the `agent-runtime` crate.

pub mod agent;
pub mod convert;
pub mod error;
pub mod message;
pub mod provider;
pub mod registry;
pub mod tool;

pub use agent::{Agent, AgentConfig, DEFAULT_SYSTEM_PROMPT, TurnInput};
pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{ChatCompletion, ChatProvider, FinishReason};
pub use registry::{ProviderConnector, ProviderSpec, ToolProvider, ToolProviderRegistry};
pub use tool::{
    ContentItem, ProviderCallRequest, ToolArguments, ToolCallRequest, ToolDefinition,
    ToolDescriptor, ToolOutput,
};
