use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: Vec<OpenRouterMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenRouterTool<'a>>>,
    temperature: f64,
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenRouterMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenRouterToolCallRequest<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenRouterToolCallRequest<'a> {
    id: &'a str,
    r#type: &'a str,
    function: OpenRouterFunctionRequest<'a>,
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenRouterFunctionRequest<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenRouterTool<'a> {
    r#type: &'a str,
    function: OpenRouterToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OpenRouterToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    choices: Vec<OpenRouterChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponseMessage {
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<OpenRouterToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterToolCall {
    id: String,
    function: OpenRouterFunction,
}

#[derive(Debug, Deserialize)]
struct OpenRouterFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Client for OpenRouter and other OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f64,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: "google/gemini-2.5-flash".to_string(),
            temperature: 0.7,
            base_url: OPENROUTER_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn convert_messages<'a>(messages: &'a [ChatMessage]) -> Vec<OpenRouterMessage<'a>> {
        messages
            .iter()
            .map(|m| match m {
                ChatMessage::System { content } | ChatMessage::User { content } => {
                    OpenRouterMessage {
                        role: m.role(),
                        content: Some(content.clone()),
                        tool_calls: None,
                        tool_call_id: None,
                        name: None,
                    }
                }
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => OpenRouterMessage {
                    role: "assistant",
                    content: content.clone(),
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            tool_calls
                                .iter()
                                .map(|tc| OpenRouterToolCallRequest {
                                    id: &tc.id,
                                    r#type: "function",
                                    function: OpenRouterFunctionRequest {
                                        name: &tc.name,
                                        arguments: &tc.arguments,
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: None,
                    name: None,
                },
                ChatMessage::ToolResult {
                    tool_call_id,
                    name,
                    payload,
                } => OpenRouterMessage {
                    role: "tool",
                    content: Some(payload.to_string()),
                    tool_calls: None,
                    tool_call_id: Some(tool_call_id),
                    name: Some(name),
                },
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OpenRouterTool<'_>> {
        tools
            .iter()
            .map(|t| OpenRouterTool {
                r#type: "function",
                function: OpenRouterToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect()
    }

    fn parse_response(response: OpenRouterResponse) -> anyhow::Result<ChatResponse> {
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("No response from OpenRouter"))?;

        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .map(|tcs| {
                tcs.into_iter()
                    .map(|tc| ToolCall {
                        id: tc.id,
                        name: tc.function.name,
                        arguments: tc.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let text = match &message.content {
            Some(c) if !c.is_empty() => message.content,
            _ => message.reasoning_content,
        };

        Ok(ChatResponse { text, tool_calls })
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let openrouter_request = OpenRouterRequest {
            model: &self.model,
            messages: Self::convert_messages(request.messages),
            tools: request.tools.map(Self::convert_tools),
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "Convoy")
            .json(&openrouter_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "OpenRouter API error ({}): {}",
                status,
                error_text
            ));
        }

        let openrouter_response: OpenRouterResponse = response.json().await?;
        Self::parse_response(openrouter_response)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_conversation_to_wire_format() {
        let call = ToolCall::new("call_1", "calculate", r#"{"expression":"2+2"}"#);
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("what is 2+2?"),
            ChatMessage::assistant_with_tool_calls(None, vec![call.clone()]),
            ChatMessage::tool_result(&call, json!({"result": 4})),
        ];

        let wire = serde_json::to_value(OpenRouterProvider::convert_messages(&messages)).unwrap();

        assert_eq!(wire[0], json!({"role": "system", "content": "sys"}));
        assert_eq!(
            wire[2],
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "calculate", "arguments": "{\"expression\":\"2+2\"}"}
                }]
            })
        );
        assert_eq!(
            wire[3],
            json!({
                "role": "tool",
                "content": "{\"result\":4}",
                "tool_call_id": "call_1",
                "name": "calculate"
            })
        );
    }

    #[test]
    fn converts_tool_specs() {
        let specs = vec![ToolSpec {
            name: "calculate".into(),
            description: "math".into(),
            parameters_schema: json!({"type": "object"}),
        }];

        let wire = serde_json::to_value(OpenRouterProvider::convert_tools(&specs)).unwrap();
        assert_eq!(
            wire,
            json!([{
                "type": "function",
                "function": {"name": "calculate", "description": "math", "parameters": {"type": "object"}}
            }])
        );
    }

    #[test]
    fn parses_tool_calls_and_text() {
        let response: OpenRouterResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": "Let me check.",
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "search_web", "arguments": "{\"query\":\"rust\"}"}
                    }]
                }
            }]
        }))
        .unwrap();

        let parsed = OpenRouterProvider::parse_response(response).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("Let me check."));
        assert_eq!(
            parsed.tool_calls,
            vec![ToolCall::new("call_9", "search_web", "{\"query\":\"rust\"}")]
        );
    }

    #[test]
    fn falls_back_to_reasoning_content() {
        let response: OpenRouterResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "", "reasoning_content": "thinking aloud"}}]
        }))
        .unwrap();

        let parsed = OpenRouterProvider::parse_response(response).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("thinking aloud"));
        assert!(!parsed.has_tool_calls());
    }

    #[test]
    fn empty_choices_is_an_error() {
        let response: OpenRouterResponse =
            serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(OpenRouterProvider::parse_response(response).is_err());
    }
}
