use crate::traits::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        payload: serde_json::Value,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content,
            tool_calls,
        }
    }

    pub fn tool_result(call: &ToolCall, payload: serde_json::Value) -> Self {
        Self::ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            payload,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::ToolResult { .. } => "tool",
        }
    }

    /// Text carried by the message, if any. Tool results have none; their payload is JSON.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } => Some(content),
            Self::Assistant { content, .. } => content.as_deref(),
            Self::ToolResult { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments exactly as the model produced them.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// An empty argument string is treated as `{}`; some models send it for no-arg calls.
    pub fn parse_arguments(&self) -> serde_json::Result<serde_json::Value> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: Option<&'a [ToolSpec]>,
}

/// The LLM service. One call returns one complete assistant turn; any transport, auth or
/// decoding failure surfaces as an error.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse>;

    fn name(&self) -> &str {
        "provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_serialize_with_role_tag() {
        let call = ToolCall::new("call_1", "calculate", r#"{"expression":"1+1"}"#);
        let msg = ChatMessage::tool_result(&call, json!({"result": 2.0}));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool_result");
        assert_eq!(value["tool_call_id"], "call_1");
        assert_eq!(value["name"], "calculate");
        assert_eq!(msg.role(), "tool");
        assert!(msg.text().is_none());
    }

    #[test]
    fn empty_arguments_parse_as_object() {
        let call = ToolCall::new("c", "mark_task_complete", "  ");
        assert_eq!(call.parse_arguments().unwrap(), json!({}));
    }

    #[test]
    fn malformed_arguments_fail_to_parse() {
        let call = ToolCall::new("c", "calculate", "{not json");
        assert!(call.parse_arguments().is_err());
    }
}
