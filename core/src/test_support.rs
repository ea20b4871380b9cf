use crate::agent::COMPLETION_TOOL;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) fn completion_call(id: &str) -> ToolCall {
    ToolCall::new(
        id,
        COMPLETION_TOOL,
        r#"{"task_summary":"done","completion_message":"done"}"#,
    )
}

/// Replays a fixed list of responses in order and records every request it sees.
pub(crate) struct ScriptedProvider {
    script: Mutex<VecDeque<anyhow::Result<ChatResponse>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    tool_names: Mutex<Vec<Vec<String>>>,
}

impl ScriptedProvider {
    pub(crate) fn new(script: Vec<anyhow::Result<ChatResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            tool_names: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn tool_names(&self) -> Vec<Vec<String>> {
        self.tool_names.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.messages.to_vec());
        self.tool_names.lock().unwrap().push(
            request
                .tools
                .unwrap_or_default()
                .iter()
                .map(|t| t.name.clone())
                .collect(),
        );

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
    }
}

pub(crate) struct Reply {
    pub delay: Duration,
    pub result: anyhow::Result<ChatResponse>,
}

impl Reply {
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(ChatResponse::text(text)),
        }
    }

    /// A text reply followed by the completion tool, the way a worker agent finishes.
    pub(crate) fn complete(text: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(ChatResponse {
                text: Some(text.into()),
                tool_calls: vec![completion_call("done")],
            }),
        }
    }

    pub(crate) fn fail(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(anyhow::anyhow!("{message}")),
        }
    }

    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Router = dyn Fn(&str) -> Reply + Send + Sync;

/// Answers based on the last user message of the request, after an optional delay.
pub(crate) struct RoutedProvider {
    route: Box<Router>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl RoutedProvider {
    pub(crate) fn new(route: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            route: Box::new(route),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for RoutedProvider {
    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .iter()
            .rev()
            .find_map(|m| match m {
                ChatMessage::User { content } => Some(content.clone()),
                _ => None,
            })
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt.clone());

        let reply = (self.route)(&prompt);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}
