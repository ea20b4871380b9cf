use crate::agent::{AgentLoop, AgentOutcome, ContextBuilder, ToolRegistry, render_template};
use crate::traits::Provider;
use std::sync::Arc;
use tracing::{debug, warn};

/// `=== AGENT i RESPONSE ===` blocks, numbered from 1, as substituted into the synthesis prompt.
pub fn agent_responses_block(responses: &[String]) -> String {
    responses
        .iter()
        .enumerate()
        .map(|(i, r)| format!("=== AGENT {} RESPONSE ===\n{}\n\n", i + 1, r))
        .collect()
}

/// Labeled concatenation returned when the synthesis call cannot produce an answer.
pub fn fallback_synthesis(responses: &[String]) -> String {
    responses
        .iter()
        .enumerate()
        .map(|(i, r)| format!("=== Agent {} Response ===\n{}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Merges several agent answers into one with a single tool-less model call.
pub struct Synthesizer {
    provider: Arc<dyn Provider>,
    context: ContextBuilder,
    template: String,
    max_iterations: usize,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn Provider>, template: impl Into<String>) -> Self {
        Self {
            provider,
            context: ContextBuilder::new(crate::config::DEFAULT_SYSTEM_PROMPT),
            template: template.into(),
            max_iterations: crate::agent::DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn build_prompt(&self, responses: &[String]) -> String {
        render_template(
            &self.template,
            &[
                ("num_responses", &responses.len().to_string()),
                ("agent_responses", &agent_responses_block(responses)),
            ],
        )
    }

    pub async fn synthesize(&self, responses: &[String]) -> String {
        let prompt = self.build_prompt(responses);
        let agent = AgentLoop::new(
            self.provider.clone(),
            self.context.clone(),
            ToolRegistry::new(),
        )
        .with_max_iterations(self.max_iterations)
        .finish_on_text_reply(true);

        match agent.run_detailed(&prompt).await {
            Ok(run) if run.outcome == AgentOutcome::Answered && !run.response.trim().is_empty() => {
                debug!(iterations = run.iterations, "Synthesis finished");
                run.response
            }
            Ok(run) => {
                warn!(
                    outcome = ?run.outcome,
                    "Synthesis produced no answer, concatenating agent responses"
                );
                fallback_synthesis(responses)
            }
            Err(e) => {
                warn!("Synthesis failed, concatenating agent responses: {}", e);
                fallback_synthesis(responses)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;
    use crate::traits::ChatResponse;

    fn responses() -> Vec<String> {
        vec!["alpha".to_string(), "beta".to_string()]
    }

    #[test]
    fn prompt_lists_responses_in_order() {
        let synthesizer = Synthesizer::new(
            Arc::new(ScriptedProvider::new(vec![])),
            "{num_responses} answers:\n{agent_responses}",
        );

        assert_eq!(
            synthesizer.build_prompt(&responses()),
            "2 answers:\n=== AGENT 1 RESPONSE ===\nalpha\n\n=== AGENT 2 RESPONSE ===\nbeta\n\n"
        );
    }

    #[test]
    fn fallback_format() {
        assert_eq!(
            fallback_synthesis(&responses()),
            "=== Agent 1 Response ===\nalpha\n\n=== Agent 2 Response ===\nbeta"
        );
    }

    #[tokio::test]
    async fn returns_model_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ChatResponse::text("merged"))]));
        let synthesizer = Synthesizer::new(provider.clone(), "{agent_responses}");

        assert_eq!(synthesizer.synthesize(&responses()).await, "merged");
        assert_eq!(provider.call_count(), 1);
        assert!(provider.tool_names()[0].is_empty());
    }

    #[tokio::test]
    async fn provider_error_uses_fallback() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(anyhow::anyhow!("503"))]));
        let synthesizer = Synthesizer::new(provider, "{agent_responses}");

        assert_eq!(
            synthesizer.synthesize(&responses()).await,
            fallback_synthesis(&responses())
        );
    }

    #[tokio::test]
    async fn silent_model_uses_fallback() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ChatResponse::text("   ")),
            Ok(ChatResponse::default()),
        ]));
        let synthesizer = Synthesizer::new(provider, "{agent_responses}").with_max_iterations(2);

        assert_eq!(
            synthesizer.synthesize(&responses()).await,
            fallback_synthesis(&responses())
        );
    }
}
