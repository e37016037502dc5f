//! Application State

use std::sync::Arc;

use agent_core::{AgentConfig, ChatProvider, ProviderSpec};
use agent_runtime::StdioConnector;

/// Shared application state
///
/// Tool providers are deliberately not part of the shared state: each
/// request connects its own, so concurrent conversations never share a
/// subprocess, and disconnect is scoped to the request.
#[derive(Clone)]
pub struct AppState {
    /// Chat completion service
    pub chat: Arc<dyn ChatProvider>,

    /// Model the chat provider is configured for (health reporting)
    pub model: String,

    /// Connector used to launch tool servers per request
    pub connector: StdioConnector,

    /// Tool server specs, connected in order for every conversation
    pub servers: Arc<Vec<ProviderSpec>>,

    /// Agent loop configuration
    pub agent_config: AgentConfig,
}
