//! Tool Provider Registry
//!
//! Holds live connections to tool providers and the name→provider binding
//! built from each provider's advertised tools. The registry depends only
//! on the [`ToolProvider`] capability set; transports live behind
//! [`ProviderConnector`] implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::convert::tools_to_model_format;
use crate::error::{AgentError, Result};
use crate::tool::{ProviderCallRequest, ToolDefinition, ToolDescriptor, ToolOutput};

/// Parameters for launching a subprocess-style tool server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Provider name, used in logs and connect errors
    pub name: String,

    /// Executable to launch
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,
}

/// Capability set of a connected tool provider
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name (from its spec)
    fn name(&self) -> &str;

    /// List the tools this provider advertises
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool with normalized arguments
    async fn call_tool(&self, request: ProviderCallRequest) -> Result<ToolOutput>;

    /// Close the connection; further calls fail
    async fn close(&self) -> Result<()>;
}

/// Turns a [`ProviderSpec`] into a live provider connection
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn connect(&self, spec: &ProviderSpec) -> Result<Arc<dyn ToolProvider>>;
}

/// Registry of connected providers and their advertised tools
#[derive(Default)]
pub struct ToolProviderRegistry {
    providers: Vec<Arc<dyn ToolProvider>>,
    descriptors: Vec<ToolDescriptor>,
    definitions: Vec<ToolDefinition>,
    bindings: HashMap<String, Arc<dyn ToolProvider>>,
}

impl ToolProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to every spec, strictly in order. Each provider is connected,
    /// its tools listed, converted to model format, appended to the
    /// aggregate tool list and bound by name. A failure on any provider
    /// aborts the whole operation; connections established before the
    /// failure stay registered so [`Self::disconnect_all`] can release them.
    pub async fn connect(
        &mut self,
        connector: &dyn ProviderConnector,
        specs: &[ProviderSpec],
    ) -> Result<()> {
        for spec in specs {
            let provider = connector.connect(spec).await.map_err(|e| match e {
                err @ AgentError::Connect { .. } => err,
                other => AgentError::Connect {
                    server: spec.name.clone(),
                    reason: other.to_string(),
                },
            })?;
            self.providers.push(provider.clone());
            tracing::info!(server = %spec.name, "Connected to tool provider");

            let tools = provider.list_tools().await.map_err(|e| AgentError::Connect {
                server: spec.name.clone(),
                reason: format!("listing tools failed: {e}"),
            })?;

            let definitions = tools_to_model_format(&tools);
            for (descriptor, definition) in tools.into_iter().zip(definitions) {
                if let Some(previous) = self.bindings.get(&descriptor.name) {
                    tracing::warn!(
                        tool = %descriptor.name,
                        previous = %previous.name(),
                        current = %provider.name(),
                        "Tool name collision; last registration wins"
                    );
                    self.descriptors.retain(|d| d.name != descriptor.name);
                    self.definitions
                        .retain(|d| d.function.name != definition.function.name);
                }
                self.bindings
                    .insert(descriptor.name.clone(), provider.clone());
                self.descriptors.push(descriptor);
                self.definitions.push(definition);
            }
        }

        Ok(())
    }

    /// Exact-match lookup of the provider that advertised a tool
    pub fn resolve(&self, tool_name: &str) -> Option<Arc<dyn ToolProvider>> {
        self.bindings.get(tool_name).cloned()
    }

    /// Close every connection. Best-effort: each provider is closed
    /// independently and failures are gathered into a single error.
    pub async fn disconnect_all(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for provider in self.providers.drain(..) {
            if let Err(e) = provider.close().await {
                tracing::warn!(server = %provider.name(), error = %e, "Failed to close provider");
                failures.push(format!("{}: {e}", provider.name()));
            }
        }
        self.bindings.clear();
        self.descriptors.clear();
        self.definitions.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Other(format!(
                "failed to close providers: {}",
                failures.join("; ")
            )))
        }
    }

    /// Aggregate tool definitions in the model's format, in advertisement
    /// order; immutable between connects
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Aggregate advertised tool schemas
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Number of bound tool names
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no tools are bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Scripted in-memory provider for loop and registry tests
    pub struct MockToolProvider {
        pub provider_name: String,
        pub tools: Vec<ToolDescriptor>,
        pub outputs: Mutex<HashMap<String, ToolOutput>>,
        pub calls: Mutex<Vec<ProviderCallRequest>>,
        pub closed: Mutex<bool>,
        pub fail_close: bool,
    }

    impl MockToolProvider {
        pub fn new(name: &str, tools: Vec<ToolDescriptor>) -> Self {
            Self {
                provider_name: name.into(),
                tools,
                outputs: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                closed: Mutex::new(false),
                fail_close: false,
            }
        }

        pub fn with_output(self, tool: &str, output: ToolOutput) -> Self {
            self.outputs.lock().unwrap().insert(tool.into(), output);
            self
        }
    }

    #[async_trait]
    impl ToolProvider for MockToolProvider {
        fn name(&self) -> &str {
            &self.provider_name
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, request: ProviderCallRequest) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(request.clone());
            self.outputs
                .lock()
                .unwrap()
                .get(&request.name)
                .cloned()
                .ok_or_else(|| AgentError::ToolExecution(format!("no output scripted for {}", request.name)))
        }

        async fn close(&self) -> Result<()> {
            *self.closed.lock().unwrap() = true;
            if self.fail_close {
                Err(AgentError::Other("close failed".into()))
            } else {
                Ok(())
            }
        }
    }

    /// Connector backed by pre-built providers, keyed by spec name
    #[derive(Default)]
    pub struct MockConnector {
        pub providers: HashMap<String, Arc<dyn ToolProvider>>,
    }

    impl MockConnector {
        pub fn with(mut self, name: &str, provider: Arc<dyn ToolProvider>) -> Self {
            self.providers.insert(name.into(), provider);
            self
        }
    }

    #[async_trait]
    impl ProviderConnector for MockConnector {
        async fn connect(&self, spec: &ProviderSpec) -> Result<Arc<dyn ToolProvider>> {
            self.providers.get(&spec.name).cloned().ok_or_else(|| {
                AgentError::Connect {
                    server: spec.name.clone(),
                    reason: "connection refused".into(),
                }
            })
        }
    }

    pub fn spec(name: &str) -> ProviderSpec {
        ProviderSpec {
            name: name.into(),
            command: "mock".into(),
            args: Vec::new(),
        }
    }

    pub fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: None,
            input_schema: serde_json::Map::new(),
        }
    }
}
