use crate::agent::{ContextBuilder, Conversation, ToolRegistry};
use crate::error::AgentError;
use crate::traits::{ChatRequest, Provider};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Name of the tool whose call ends the run.
pub const COMPLETION_TOOL: &str = "mark_task_complete";

pub const MAX_ITERATIONS_MESSAGE: &str =
    "Maximum iterations reached. The agent may be stuck in a loop.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The completion tool was called.
    Completed,
    /// A plain text reply ended the run (only with `finish_on_text_reply`).
    Answered,
    /// The iteration budget ran out.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct AgentRun {
    pub outcome: AgentOutcome,
    pub response: String,
    pub iterations: usize,
    pub conversation: Conversation,
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    context_builder: ContextBuilder,
    tool_registry: ToolRegistry,
    max_iterations: usize,
    finish_on_text_reply: bool,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        context_builder: ContextBuilder,
        tool_registry: ToolRegistry,
    ) -> Self {
        Self {
            provider,
            context_builder,
            tool_registry,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            finish_on_text_reply: false,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// End the run on the first assistant reply that has text and no tool calls. Used for
    /// one-shot generation steps whose registry has no completion tool.
    pub fn finish_on_text_reply(mut self, enabled: bool) -> Self {
        self.finish_on_text_reply = enabled;
        self
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    pub async fn run(&self, task: &str) -> Result<String, AgentError> {
        self.run_detailed(task).await.map(|run| run.response)
    }

    pub async fn run_detailed(&self, task: &str) -> Result<AgentRun, AgentError> {
        let mut conversation = Conversation::new(self.context_builder.build_messages(task));
        let mut responses: Vec<String> = Vec::new();

        let tools = self.tool_registry.get_specs();
        let completion_enabled = self.tool_registry.contains(COMPLETION_TOOL);
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            debug!("Agent iteration {}/{}", iterations, self.max_iterations);

            let request = ChatRequest {
                messages: conversation.messages(),
                tools: if tools.is_empty() { None } else { Some(&tools) },
            };

            let response = self
                .provider
                .chat(request)
                .await
                .map_err(AgentError::LlmCall)?;

            let text = response.text.filter(|t| !t.is_empty());
            if let Some(text) = &text {
                responses.push(text.clone());
            }

            let tool_calls = response.tool_calls;
            conversation.push_assistant(text.clone(), tool_calls.clone());

            if tool_calls.is_empty() {
                if self.finish_on_text_reply
                    && let Some(text) = text
                {
                    return Ok(AgentRun {
                        outcome: AgentOutcome::Answered,
                        response: text,
                        iterations,
                        conversation,
                    });
                }
                debug!("Agent responded without tool calls, continuing");
                continue;
            }

            debug!("Agent making {} tool call(s)", tool_calls.len());

            for call in &tool_calls {
                debug!(tool = %call.name, id = %call.id, "Calling tool");
                let payload = self.tool_registry.execute(call).await;
                if let Some(error) = payload.get("error").and_then(|e| e.as_str()) {
                    warn!(tool = %call.name, "Tool returned error: {}", error);
                }
                conversation.push_tool_result(call, payload);

                // Later calls of the same batch are dropped on purpose.
                if completion_enabled && call.name == COMPLETION_TOOL {
                    debug!("Completion tool called, exiting loop");
                    return Ok(AgentRun {
                        outcome: AgentOutcome::Completed,
                        response: responses.join("\n\n"),
                        iterations,
                        conversation,
                    });
                }
            }
        }

        let response = if responses.is_empty() {
            MAX_ITERATIONS_MESSAGE.to_string()
        } else {
            responses.join("\n\n")
        };

        Ok(AgentRun {
            outcome: AgentOutcome::Exhausted,
            response,
            iterations,
            conversation,
        })
    }
}
