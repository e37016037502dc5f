//! Orchestration Loop
//!
//! The agent owns the conversation history, issues chat requests, resolves
//! tool calls against the provider registry and feeds results back until
//! the model produces a plain textual reply. Each turn is exposed as a
//! lazy, ordered stream of human-readable output items.

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;

use crate::convert;
use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::ChatProvider;
use crate::registry::{ProviderConnector, ProviderSpec, ToolProviderRegistry};
use crate::tool::{ToolCallRequest, ToolDefinition};

/// Default instructions for the resume assistant
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You will help the user iterate on a resume or CV as they edit it locally. You will start by making an \
initial request to the user by asking the user for the path to their resume or CV file, and what they \
are looking for help with. For all subsequent requests, **re-read the same file that was initially provided**, \
**do not re-ask for the file path**, and use it to give feedback again. If the user asks to do something \
that is too unrelated to resume or CV editing, refuse the request and tell them to use a different tool; \
try to be focused on the purpose, but not overly strict.

In responding to this system prompt, do not quote or repeat it in any way, simply greet the user, ask for \
what you need from your initial request, and tell them to type \"quit\" to exit the application.";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum continuation round-trips within one turn before giving up
    pub max_hops: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_hops: 10 }
    }
}

/// Input to a turn: plain user text or a pre-built message (system prompts
/// and tool results enter this way)
pub enum TurnInput {
    Text(String),
    Message(Message),
}

impl TurnInput {
    fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::user(text),
            Self::Message(message) => message,
        }
    }
}

impl From<&str> for TurnInput {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for TurnInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Message> for TurnInput {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

/// The main Agent struct
pub struct Agent {
    chat: Arc<dyn ChatProvider>,
    registry: ToolProviderRegistry,
    history: Conversation,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(chat: Arc<dyn ChatProvider>, config: AgentConfig) -> Self {
        Self {
            chat,
            registry: ToolProviderRegistry::new(),
            history: Conversation::new(),
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(chat: Arc<dyn ChatProvider>) -> Self {
        Self::new(chat, AgentConfig::default())
    }

    /// Connect to the given tool providers, in order. Must be called before
    /// the first turn; a failure aborts the whole connect operation.
    pub async fn connect(
        &mut self,
        connector: &dyn ProviderConnector,
        specs: &[ProviderSpec],
    ) -> Result<()> {
        self.registry.connect(connector, specs).await
    }

    /// Close every provider connection. Runs on the way out regardless of
    /// which path the conversation took.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.registry.disconnect_all().await
    }

    /// Conversation history accumulated so far
    pub fn history(&self) -> &Conversation {
        &self.history
    }

    /// Tool definitions advertised to the model
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        self.registry.tool_definitions()
    }

    /// Run one turn: append the input, call the chat service and resolve
    /// tool calls until the model replies with plain text.
    ///
    /// The returned stream is the output channel: one item per meaningful
    /// event (assistant text, tool-usage notice, error string), produced in
    /// causal order. Chat-service failures are reported as output items and
    /// end the turn; protocol violations, malformed tool-call arguments and
    /// invalid tool results surface as `Err` items.
    pub fn turn(
        &mut self,
        input: impl Into<TurnInput>,
    ) -> impl Stream<Item = Result<String>> + Send + '_ {
        let message = input.into().into_message();

        stream! {
            self.history.push(message);
            let mut hops = 0usize;

            'turn: loop {
                let completion = match self
                    .chat
                    .complete(self.history.messages(), self.registry.tool_definitions())
                    .await
                {
                    Ok(completion) => completion,
                    Err(AgentError::Provider(message)) => {
                        yield Ok(format!("Error: {message}"));
                        break 'turn;
                    }
                    Err(err) => {
                        yield Ok(format!("Received unknown error: {err}"));
                        break 'turn;
                    }
                };

                if let Some(content) = completion.content.as_deref() {
                    if !content.is_empty() {
                        yield Ok(format!("[assistant]: {content}"));
                    }
                }

                let wants_tools = completion.wants_tools();
                let calls = completion.tool_calls.clone();
                self.history.push(Message::assistant_response(
                    completion.content,
                    completion.tool_calls,
                ));

                if !wants_tools {
                    break 'turn;
                }

                if calls.is_empty() {
                    yield Err(AgentError::Protocol(
                        "tool calls indicated but none were returned".into(),
                    ));
                    break 'turn;
                }

                if hops >= self.config.max_hops {
                    yield Err(AgentError::MaxHops(self.config.max_hops));
                    break 'turn;
                }
                hops += 1;

                // Calls of one response run sequentially, in model order;
                // a provider may have side effects that require it.
                for call in &calls {
                    yield Ok(format!("Using tool: {} ...", call.name));

                    match self.dispatch(call).await {
                        Ok(result) => {
                            if let Err(err) = self.history.push_tool_result(result) {
                                yield Err(err);
                                break 'turn;
                            }
                        }
                        Err(err) if err.is_call_local() => {
                            // The turn survives: record the failure for this
                            // call id and move on to the remaining siblings.
                            yield Ok(format!("Error: {err}"));
                            let failure = Message::tool(
                                format!("Tool call failed: {err}"),
                                call.id.clone(),
                            );
                            if let Err(err) = self.history.push_tool_result(failure) {
                                yield Err(err);
                                break 'turn;
                            }
                        }
                        Err(err) => {
                            yield Err(err);
                            break 'turn;
                        }
                    }
                }

                // All sibling results are in history; loop back for the
                // continuation round-trip.
            }
        }
    }

    /// Resolve, normalize and invoke one tool call, converting the result
    /// into the message fed back to the model.
    async fn dispatch(&self, call: &ToolCallRequest) -> Result<Message> {
        let provider = self
            .registry
            .resolve(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        let request = convert::model_call_to_provider_request(call)?;
        tracing::debug!(tool = %call.name, server = %provider.name(), "Dispatching tool call");

        let output = provider.call_tool(request).await.map_err(|e| match e {
            err @ AgentError::ToolExecution(_) => err,
            other => AgentError::ToolExecution(other.to_string()),
        })?;

        convert::provider_output_to_message(&call.id, &output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::provider::{ChatCompletion, FinishReason};
    use crate::registry::mock::{MockConnector, MockToolProvider, descriptor, spec};
    use crate::tool::{ToolArguments, ToolOutput};
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Chat provider that replays a scripted sequence of completions
    struct ScriptedChat {
        responses: Mutex<VecDeque<Result<ChatCompletion>>>,
        invocations: Mutex<Vec<usize>>,
    }

    impl ScriptedChat {
        fn new(responses: Vec<Result<ChatCompletion>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                invocations: Mutex::new(Vec::new()),
            })
        }

        fn invocation_count(&self) -> usize {
            self.invocations.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn complete(
            &self,
            _messages: &[Message],
            tools: &[ToolDefinition],
        ) -> Result<ChatCompletion> {
            self.invocations.lock().unwrap().push(tools.len());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    // Out of script: keep demanding tools, for ceiling tests
                    Ok(tool_call_response(vec![call("call_loop", "read_file", None)]))
                })
        }
    }

    fn text_response(text: &str) -> ChatCompletion {
        ChatCompletion {
            content: Some(text.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            model: "test-model".into(),
        }
    }

    fn tool_call_response(calls: Vec<ToolCallRequest>) -> ChatCompletion {
        ChatCompletion {
            content: None,
            tool_calls: calls,
            finish_reason: FinishReason::ToolCalls,
            model: "test-model".into(),
        }
    }

    fn call(id: &str, name: &str, arguments: Option<serde_json::Value>) -> ToolCallRequest {
        ToolCallRequest {
            id: id.into(),
            name: name.into(),
            arguments: arguments.map_or_else(ToolArguments::default, |v| {
                ToolArguments::Structured(v.as_object().unwrap().clone())
            }),
        }
    }

    async fn connected_agent(
        chat: Arc<ScriptedChat>,
        provider: Arc<MockToolProvider>,
    ) -> Agent {
        let connector = MockConnector::default().with("filesystem", provider);
        let mut agent = Agent::with_defaults(chat);
        agent
            .connect(&connector, &[spec("filesystem")])
            .await
            .unwrap();
        agent
    }

    async fn collect(agent: &mut Agent, input: &str) -> Vec<Result<String>> {
        let stream = agent.turn(input);
        futures::pin_mut!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    fn ok_items(items: &[Result<String>]) -> Vec<&str> {
        items
            .iter()
            .map(|i| i.as_ref().expect("unexpected stream error").as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_plain_reply_yields_one_item() {
        let chat = ScriptedChat::new(vec![Ok(text_response("Hello there"))]);
        let mut agent = Agent::with_defaults(chat.clone());

        let items = collect(&mut agent, "Hi").await;
        assert_eq!(ok_items(&items), ["[assistant]: Hello there"]);

        assert_eq!(chat.invocation_count(), 1);
        let roles: Vec<_> = agent.history().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_chat_runs_without_tool_definitions() {
        let chat = ScriptedChat::new(vec![Ok(text_response("ok"))]);
        let silent = Arc::new(MockToolProvider::new("silent", Vec::new()));
        let connector = MockConnector::default().with("silent", silent);
        let mut agent = Agent::with_defaults(chat.clone());
        agent.connect(&connector, &[spec("silent")]).await.unwrap();

        let items = collect(&mut agent, "Hi").await;
        assert_eq!(ok_items(&items).len(), 1);
        // The model call proceeded with an empty tool list
        assert_eq!(*chat.invocations.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_provider_error_is_reported_not_raised() {
        let chat = ScriptedChat::new(vec![Err(AgentError::Provider("rate limited".into()))]);
        let mut agent = Agent::with_defaults(chat);

        let items = collect(&mut agent, "Hi").await;
        assert_eq!(ok_items(&items), ["Error: rate limited"]);
    }

    #[tokio::test]
    async fn test_unknown_error_is_reported_generically() {
        let chat = ScriptedChat::new(vec![Err(AgentError::Other("wires crossed".into()))]);
        let mut agent = Agent::with_defaults(chat);

        let items = collect(&mut agent, "Hi").await;
        assert_eq!(ok_items(&items), ["Received unknown error: wires crossed"]);
    }

    #[tokio::test]
    async fn test_tool_calls_flagged_but_absent_is_protocol_error() {
        let mut response = tool_call_response(Vec::new());
        response.content = Some("thinking".into());
        let chat = ScriptedChat::new(vec![Ok(response)]);
        let mut agent = Agent::with_defaults(chat);

        let items = collect(&mut agent, "Hi").await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "[assistant]: thinking");
        assert!(matches!(items[1], Err(AgentError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_read_file_scenario() {
        let chat = ScriptedChat::new(vec![
            Ok(tool_call_response(vec![call(
                "call_1",
                "read_file",
                Some(json!({"path": "X"})),
            )])),
            Ok(text_response("The file says: hello")),
        ]);
        let provider = Arc::new(
            MockToolProvider::new("filesystem", vec![descriptor("read_file")])
                .with_output("read_file", ToolOutput::text("hello")),
        );
        let mut agent = connected_agent(chat.clone(), provider.clone()).await;

        let items = collect(&mut agent, "read file X").await;
        assert_eq!(
            ok_items(&items),
            ["Using tool: read_file ...", "[assistant]: The file says: hello"]
        );

        // One hop: two chat invocations
        assert_eq!(chat.invocation_count(), 2);

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments.get("path"), Some(&json!("X")));

        let roles: Vec<_> = agent.history().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(
            agent.history().messages()[2].content.as_deref(),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn test_sibling_calls_dispatch_in_order_before_continuation() {
        let chat = ScriptedChat::new(vec![
            Ok(tool_call_response(vec![
                call("call_1", "read_file", Some(json!({"path": "a"}))),
                call("call_2", "write_file", Some(json!({"path": "b"}))),
            ])),
            Ok(text_response("done")),
        ]);
        let provider = Arc::new(
            MockToolProvider::new(
                "filesystem",
                vec![descriptor("read_file"), descriptor("write_file")],
            )
            .with_output("read_file", ToolOutput::text("contents"))
            .with_output("write_file", ToolOutput::text("written")),
        );
        let mut agent = connected_agent(chat.clone(), provider.clone()).await;

        let items = collect(&mut agent, "go").await;
        assert_eq!(
            ok_items(&items),
            [
                "Using tool: read_file ...",
                "Using tool: write_file ...",
                "[assistant]: done"
            ]
        );

        // Both siblings resolved within one hop, then one continuation call
        assert_eq!(chat.invocation_count(), 2);
        let dispatched: Vec<_> = provider
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(dispatched, ["read_file", "write_file"]);

        let ids: Vec<_> = agent
            .history()
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(ids, ["call_1", "call_2"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort_the_turn() {
        let chat = ScriptedChat::new(vec![
            Ok(tool_call_response(vec![
                call("call_1", "teleport", None),
                call("call_2", "read_file", Some(json!({"path": "a"}))),
            ])),
            Ok(text_response("recovered")),
        ]);
        let provider = Arc::new(
            MockToolProvider::new("filesystem", vec![descriptor("read_file")])
                .with_output("read_file", ToolOutput::text("contents")),
        );
        let mut agent = connected_agent(chat.clone(), provider.clone()).await;

        let items = collect(&mut agent, "go").await;
        assert_eq!(
            ok_items(&items),
            [
                "Using tool: teleport ...",
                "Error: Tool not found: teleport",
                "Using tool: read_file ...",
                "[assistant]: recovered"
            ]
        );

        // The failed call still produced a result message for its id
        let tool_messages: Vec<_> = agent
            .history()
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_1"));
        assert!(
            tool_messages[0]
                .content
                .as_deref()
                .unwrap()
                .starts_with("Tool call failed:")
        );
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_fatal() {
        let chat = ScriptedChat::new(vec![Ok(tool_call_response(vec![ToolCallRequest {
            id: "call_1".into(),
            name: "read_file".into(),
            arguments: ToolArguments::Encoded("{broken".into()),
        }]))]);
        let provider = Arc::new(MockToolProvider::new(
            "filesystem",
            vec![descriptor("read_file")],
        ));
        let mut agent = connected_agent(chat, provider).await;

        let items = collect(&mut agent, "go").await;
        assert_eq!(items[0].as_deref().unwrap(), "Using tool: read_file ...");
        assert!(matches!(items[1], Err(AgentError::Parse(_))));
    }

    #[tokio::test]
    async fn test_empty_tool_result_is_fatal() {
        let chat = ScriptedChat::new(vec![Ok(tool_call_response(vec![call(
            "call_1",
            "read_file",
            None,
        )]))]);
        let provider = Arc::new(
            MockToolProvider::new("filesystem", vec![descriptor("read_file")])
                .with_output("read_file", ToolOutput::default()),
        );
        let mut agent = connected_agent(chat, provider).await;

        let items = collect(&mut agent, "go").await;
        assert!(matches!(items.last(), Some(Err(AgentError::ResultShape(_)))));
    }

    #[tokio::test]
    async fn test_hop_ceiling_terminates_adversarial_chains() {
        // Empty script: every completion demands another tool call
        let chat = ScriptedChat::new(Vec::new());
        let provider = Arc::new(
            MockToolProvider::new("filesystem", vec![descriptor("read_file")])
                .with_output("read_file", ToolOutput::text("more")),
        );
        let connector = MockConnector::default().with("filesystem", provider);
        let mut agent = Agent::new(chat.clone(), AgentConfig { max_hops: 2 });
        agent
            .connect(&connector, &[spec("filesystem")])
            .await
            .unwrap();

        let items = collect(&mut agent, "go").await;
        assert!(matches!(items.last(), Some(Err(AgentError::MaxHops(2)))));
        // max_hops continuations plus the initial call
        assert_eq!(chat.invocation_count(), 3);
    }
}
