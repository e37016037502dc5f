//! Schema/Result Conversion
//!
//! Pure translation between the tool-provider protocol and the chat
//! service's function-calling protocol. No state, no I/O.

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::tool::{
    ProviderCallRequest, ToolCallRequest, ToolDefinition, ToolDescriptor, ToolFunctionDef,
    ToolArguments, ToolOutput,
};

/// Convert provider-advertised tool schemas into the model's tool format.
/// One-to-one and order preserving; absent descriptions stay absent.
pub fn tools_to_model_format(descriptors: &[ToolDescriptor]) -> Vec<ToolDefinition> {
    descriptors
        .iter()
        .map(|tool| ToolDefinition {
            kind: "function".into(),
            function: ToolFunctionDef {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
        .collect()
}

/// Normalize a model tool call into a provider call request. String-encoded
/// arguments are parsed as JSON; malformed JSON fails the call.
pub fn model_call_to_provider_request(call: &ToolCallRequest) -> Result<ProviderCallRequest> {
    let arguments = match &call.arguments {
        ToolArguments::Structured(map) => map.clone(),
        ToolArguments::Encoded(raw) => serde_json::from_str(raw).map_err(|e| {
            AgentError::Parse(format!(
                "malformed arguments for tool '{}': {e}",
                call.name
            ))
        })?,
    };

    Ok(ProviderCallRequest {
        name: call.name.clone(),
        arguments,
    })
}

/// Convert a provider tool result into the tool-result message fed back to
/// the model. Text content items contribute their text; any other item is
/// serialized as JSON and treated as text; items are joined with newlines
/// in order. A bare `toolResult` value is serialized wholesale. A result
/// with neither shape is a provider contract violation.
pub fn provider_output_to_message(tool_call_id: &str, output: &ToolOutput) -> Result<Message> {
    let content = if let Some(items) = &output.content {
        items
            .iter()
            .map(|item| match (&item.text, item.is_text()) {
                (Some(text), true) => Ok(text.clone()),
                _ => Ok(serde_json::to_string(item)?),
            })
            .collect::<Result<Vec<_>>>()?
            .join("\n")
    } else if let Some(value) = &output.tool_result {
        serde_json::to_string(value)?
    } else {
        return Err(AgentError::ResultShape("no tool result found".into()));
    };

    Ok(Message::tool(content, tool_call_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ContentItem;
    use serde_json::{Map, json};

    fn schema(properties: serde_json::Value) -> Map<String, serde_json::Value> {
        json!({"type": "object", "properties": properties})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_tools_to_model_format_preserves_order_and_absence() {
        let descriptors = vec![
            ToolDescriptor {
                name: "read_file".into(),
                description: Some("Read a file from the filesystem".into()),
                input_schema: schema(json!({"path": {"type": "string"}})),
            },
            ToolDescriptor {
                name: "write_file".into(),
                description: None,
                input_schema: schema(json!({
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                })),
            },
        ];

        let defs = tools_to_model_format(&descriptors);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].kind, "function");
        assert_eq!(defs[0].function.name, "read_file");
        assert_eq!(
            defs[0].function.description.as_deref(),
            Some("Read a file from the filesystem")
        );
        assert_eq!(defs[1].function.name, "write_file");
        assert!(defs[1].function.description.is_none());
        assert_eq!(
            defs[1].function.parameters,
            descriptors[1].input_schema
        );
    }

    #[test]
    fn test_empty_descriptor_list() {
        assert!(tools_to_model_format(&[]).is_empty());
    }

    #[test]
    fn test_encoded_and_structured_arguments_normalize_identically() {
        let encoded = ToolCallRequest {
            id: "call_123".into(),
            name: "read_file".into(),
            arguments: ToolArguments::Encoded("{\"path\": \"/a\"}".into()),
        };
        let structured = ToolCallRequest {
            id: "call_456".into(),
            name: "read_file".into(),
            arguments: ToolArguments::Structured(
                json!({"path": "/a"}).as_object().unwrap().clone(),
            ),
        };

        let a = model_call_to_provider_request(&encoded).unwrap();
        let b = model_call_to_provider_request(&structured).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, "read_file");
        assert_eq!(a.arguments.get("path"), Some(&json!("/a")));
    }

    #[test]
    fn test_malformed_encoded_arguments_fail() {
        let call = ToolCallRequest {
            id: "call_123".into(),
            name: "read_file".into(),
            arguments: ToolArguments::Encoded("{not json".into()),
        };

        let err = model_call_to_provider_request(&call).unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[test]
    fn test_text_items_concatenate_in_order() {
        let output = ToolOutput {
            content: Some(vec![
                ContentItem::text("first"),
                ContentItem::text("second"),
            ]),
            tool_result: None,
        };

        let message = provider_output_to_message("call_1", &output).unwrap();
        assert_eq!(message.content.as_deref(), Some("first\nsecond"));
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_non_text_items_are_serialized_as_json() {
        let image: ContentItem = serde_json::from_value(json!({
            "type": "image",
            "data": "aGVsbG8=",
            "mimeType": "image/png"
        }))
        .unwrap();
        let output = ToolOutput {
            content: Some(vec![ContentItem::text("caption"), image.clone()]),
            tool_result: None,
        };

        let message = provider_output_to_message("call_1", &output).unwrap();
        let content = message.content.unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("caption"));
        let serialized: ContentItem =
            serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(serialized, image);
    }

    #[test]
    fn test_tool_result_fallback() {
        let output = ToolOutput {
            content: None,
            tool_result: Some(json!({"temperature": 72})),
        };

        let message = provider_output_to_message("call_1", &output).unwrap();
        assert_eq!(
            message.content.as_deref(),
            Some("{\"temperature\":72}")
        );
    }

    #[test]
    fn test_empty_result_is_a_contract_violation() {
        let output = ToolOutput::default();
        let err = provider_output_to_message("call_1", &output).unwrap_err();
        assert!(matches!(err, AgentError::ResultShape(_)));
        assert!(err.to_string().contains("no tool result found"));
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let output = ToolOutput::text("hello");
        let a = provider_output_to_message("call_1", &output).unwrap();
        let b = provider_output_to_message("call_1", &output).unwrap();
        assert_eq!(a.content, b.content);
        assert_eq!(a.tool_call_id, b.tool_call_id);
    }
}
