//! Tool Types
//!
//! The two tool vocabularies this system translates between: the schema a
//! tool provider advertises, and the function-calling format the chat
//! service consumes. Conversion lives in [`crate::convert`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool as advertised by a provider, built once per connection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier (last registration wins on collision)
    pub name: String,

    /// Human-readable description, shown to the model when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the tool's arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Map<String, Value>,
}

/// Function signature inside a model-facing tool definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolFunctionDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema object
    pub parameters: Map<String, Value>,
}

/// Tool definition in the chat service's function-calling format
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always "function"
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunctionDef,
}

/// Tool-call arguments as emitted by the model: either already structured
/// or a JSON-encoded string that still needs parsing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    Structured(Map<String, Value>),
    Encoded(String),
}

impl Default for ToolArguments {
    fn default() -> Self {
        Self::Structured(Map::new())
    }
}

/// A tool call requested by the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call id, echoed back on the matching result message
    pub id: String,

    /// Tool name to invoke
    pub name: String,

    /// Raw arguments, normalized to structured form before dispatch
    #[serde(default)]
    pub arguments: ToolArguments,
}

/// A normalized call ready for dispatch to a tool provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderCallRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// One item of typed tool-result content. Only text items are understood
/// structurally; every other kind keeps its fields in `extra` and is
/// serialized wholesale when fed back to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: Some(text.into()),
            extra: HashMap::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == "text" && self.text.is_some()
    }
}

/// Result of a provider tool call: either a list of typed content items or
/// a single opaque value under the legacy `toolResult` key
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentItem>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
}

impl ToolOutput {
    /// A result holding a single text content item
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(vec![ContentItem::text(text)]),
            tool_result: None,
        }
    }
}
