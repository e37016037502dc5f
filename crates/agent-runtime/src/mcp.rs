//! MCP Tool Providers
//!
//! `ToolProvider` implementation over the Model Context Protocol with a
//! child-process stdio transport: each provider spec launches a tool server
//! subprocess and speaks MCP to it through `rmcp`.

use std::path::Path;
use std::sync::Arc;

use agent_core::{
    error::{AgentError, Result},
    registry::{ProviderConnector, ProviderSpec, ToolProvider},
    tool::{ProviderCallRequest, ToolDescriptor, ToolOutput},
};
use async_trait::async_trait;
use rmcp::{
    RoleClient, model::CallToolRequestParam, service::RunningService,
    transport::TokioChildProcess,
};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};

/// An MCP client connection to one tool server
pub struct McpToolProvider {
    name: String,
    client: Mutex<Option<RunningService<RoleClient, ()>>>,
    call_timeout: Duration,
}

impl McpToolProvider {
    fn closed_error(&self) -> AgentError {
        AgentError::Other(format!("provider '{}' is closed", self.name))
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| self.closed_error())?;

        let result = timeout(self.call_timeout, client.list_tools(Default::default()))
            .await
            .map_err(|_| AgentError::ToolExecution("list tools timeout".into()))?
            .map_err(|e| AgentError::ToolExecution(format!("list tools failed: {e:?}")))?;

        Ok(result
            .tools
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: tool.input_schema.as_ref().clone(),
            })
            .collect())
    }

    async fn call_tool(&self, request: ProviderCallRequest) -> Result<ToolOutput> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| self.closed_error())?;

        tracing::debug!(server = %self.name, tool = %request.name, "Calling provider tool");

        let params = CallToolRequestParam {
            name: request.name.into(),
            arguments: Some(request.arguments),
        };

        let result = timeout(self.call_timeout, client.call_tool(params))
            .await
            .map_err(|_| AgentError::ToolExecution("tool call timeout".into()))?
            .map_err(|e| AgentError::ToolExecution(format!("tool call failed: {e:?}")))?;

        // The MCP result shape matches ToolOutput's wire form directly
        let value = serde_json::to_value(&result)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            tracing::debug!(server = %self.name, "Closing provider connection");
            client
                .cancel()
                .await
                .map_err(|e| AgentError::Other(format!("close failed: {e}")))?;
        }
        Ok(())
    }
}

/// Connector launching MCP tool servers as child processes over stdio
#[derive(Clone, Debug)]
pub struct StdioConnector {
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,

    /// Timeout applied to each list/call round-trip
    pub call_timeout: Duration,
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl StdioConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderConnector for StdioConnector {
    async fn connect(&self, spec: &ProviderSpec) -> Result<Arc<dyn ToolProvider>> {
        if spec.command.is_empty() {
            return Err(AgentError::Connect {
                server: spec.name.clone(),
                reason: "empty command".into(),
            });
        }

        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args);

        let transport = TokioChildProcess::new(cmd).map_err(|e| AgentError::Connect {
            server: spec.name.clone(),
            reason: e.to_string(),
        })?;

        let client = timeout(
            self.connect_timeout,
            rmcp::service::serve_client((), transport),
        )
        .await
        .map_err(|_| AgentError::Connect {
            server: spec.name.clone(),
            reason: "connection timeout".into(),
        })?
        .map_err(|e| AgentError::Connect {
            server: spec.name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Arc::new(McpToolProvider {
            name: spec.name.clone(),
            client: Mutex::new(Some(client)),
            call_timeout: self.call_timeout,
        }))
    }
}

/// The tool server used when no configuration is provided: the filesystem
/// MCP server scoped to the working directory
pub fn default_specs() -> Vec<ProviderSpec> {
    vec![ProviderSpec {
        name: "filesystem".into(),
        command: "npx".into(),
        args: vec![
            "-y".into(),
            "@modelcontextprotocol/server-filesystem".into(),
            "./".into(),
        ],
    }]
}

/// Load provider specs from a JSON file (`[{name, command, args}]`)
pub fn load_specs(path: &Path) -> Result<Vec<ProviderSpec>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AgentError::Config(format!("cannot read server config {}: {e}", path.display()))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        AgentError::Config(format!("invalid server config {}: {e}", path.display()))
    })
}

/// Resolve provider specs: an explicit path wins, then the `AGENT_SERVERS`
/// environment variable, then the built-in default
pub fn resolve_specs(path: Option<&Path>) -> Result<Vec<ProviderSpec>> {
    if let Some(path) = path {
        return load_specs(path);
    }
    if let Ok(path) = std::env::var("AGENT_SERVERS") {
        return load_specs(Path::new(&path));
    }
    Ok(default_specs())
}
