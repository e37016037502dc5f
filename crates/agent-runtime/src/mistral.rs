//! Mistral Chat Provider
//!
//! Implementation of `ChatProvider` over Mistral's chat-completions HTTP
//! API (OpenAI-compatible function calling).

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{ChatCompletion, ChatProvider, FinishReason},
    tool::{ToolArguments, ToolCallRequest, ToolDefinition},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mistral provider configuration
#[derive(Clone, Debug)]
pub struct MistralConfig {
    /// API key (bearer token)
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl MistralConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("MISTRAL_API_KEY").map_err(|_| {
            AgentError::Config(
                "API key not found, please set it via the environment variable MISTRAL_API_KEY"
                    .into(),
            )
        })?;
        let base_url = std::env::var("MISTRAL_BASE_URL")
            .unwrap_or_else(|_| "https://api.mistral.ai".into());
        let model = std::env::var("MISTRAL_MODEL")
            .unwrap_or_else(|_| "mistral-small-latest".into());

        Ok(Self {
            api_key,
            base_url,
            model,
            timeout_secs: 120,
        })
    }
}

/// Mistral chat provider
pub struct MistralProvider {
    client: reqwest::Client,
    config: MistralConfig,
}

impl MistralProvider {
    /// Create from configuration
    pub fn from_config(config: MistralConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_config(MistralConfig::from_env()?))
    }

    /// Model this provider sends completions to
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Convert agent messages to the wire format
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                }
                .into(),
                content: m.content.clone(),
                tool_calls: m
                    .tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: Some(call.id.clone()),
                        kind: "function".into(),
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect(),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert the wire response into an agent completion
    fn parse_completion(response: WireResponse) -> Result<ChatCompletion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Protocol("no response choices found".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let id = call
                    .id
                    .ok_or_else(|| AgentError::Protocol("tool call id not found".into()))?;
                Ok(ToolCallRequest {
                    id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ChatCompletion {
            content: choice
                .message
                .content
                .as_ref()
                .and_then(Value::as_str)
                .map(str::to_owned),
            tool_calls,
            finish_reason: choice.finish_reason,
            model: response.model,
        })
    }
}

#[async_trait]
impl ChatProvider for MistralProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletion> {
        let request = WireRequest {
            model: &self.config.model,
            messages: Self::convert_messages(messages),
            tools,
        };

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Provider(format!(
                "chat request failed with status {status}: {body}"
            )));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("invalid chat response: {e}")))?;

        Self::parse_completion(wire)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDefinition],
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".into()
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded string or structured object, per the API
    arguments: ToolArguments,
}

#[derive(Deserialize)]
struct WireResponse {
    model: String,
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: FinishReason,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    /// String in practice; chunked content is not supported here
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}
