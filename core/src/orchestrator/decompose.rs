use crate::agent::{AgentLoop, COMPLETION_TOOL, ContextBuilder, ToolRegistry, render_template};
use crate::error::AgentError;
use crate::traits::Provider;
use std::sync::Arc;
use thiserror::Error;

const FALLBACK_TEMPLATES: [&str; 4] = [
    "Research comprehensive information about: ",
    "Analyze and provide insights about: ",
    "Find alternative perspectives on: ",
    "Verify and cross-check facts about: ",
];

#[derive(Debug, Error)]
pub(crate) enum DecompositionError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("response is not a JSON array of strings: {0}")]
    NotJson(#[source] serde_json::Error),

    #[error("expected {expected} subtasks, got {actual}")]
    WrongCount { expected: usize, actual: usize },
}

/// Generic angles on the request, used whenever the model's split cannot be trusted.
pub fn fallback_subtasks(user_input: &str, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match FALLBACK_TEMPLATES.get(i) {
            Some(prefix) => format!("{prefix}{user_input}"),
            None => format!("Explore additional angle {} on: {user_input}", i + 1),
        })
        .collect()
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) along with the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub(crate) fn parse_subtasks(raw: &str, n: usize) -> Result<Vec<String>, DecompositionError> {
    let subtasks: Vec<String> =
        serde_json::from_str(strip_code_fence(raw)).map_err(DecompositionError::NotJson)?;
    if subtasks.len() != n {
        return Err(DecompositionError::WrongCount {
            expected: n,
            actual: subtasks.len(),
        });
    }
    Ok(subtasks)
}

/// Asks the model to split `user_input` into `n` subtasks.
pub(crate) struct Decomposer {
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) context: ContextBuilder,
    pub(crate) registry: ToolRegistry,
    pub(crate) template: String,
    pub(crate) max_iterations: usize,
}

impl Decomposer {
    pub(crate) async fn generate(
        &self,
        user_input: &str,
        n: usize,
    ) -> Result<Vec<String>, DecompositionError> {
        let prompt = render_template(
            &self.template,
            &[("user_input", user_input), ("num_agents", &n.to_string())],
        );

        let agent = AgentLoop::new(
            self.provider.clone(),
            self.context.clone(),
            self.registry.without(COMPLETION_TOOL),
        )
        .with_max_iterations(self.max_iterations)
        .finish_on_text_reply(true);

        let raw = agent.run(&prompt).await?;
        parse_subtasks(&raw, n)
    }

    pub(crate) async fn decompose(&self, user_input: &str, n: usize) -> Vec<String> {
        match self.generate(user_input, n).await {
            Ok(subtasks) => subtasks,
            Err(e) => {
                tracing::warn!("Question generation failed, using fallback subtasks: {}", e);
                fallback_subtasks(user_input, n)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;
    use crate::tools::MarkTaskCompleteTool;
    use crate::traits::ChatResponse;

    fn decomposer(provider: Arc<ScriptedProvider>) -> Decomposer {
        Decomposer {
            provider,
            context: ContextBuilder::new("system"),
            registry: ToolRegistry::new().with_tool(Arc::new(MarkTaskCompleteTool::new())),
            template: "Split {user_input} into {num_agents}".into(),
            max_iterations: 3,
        }
    }

    #[test]
    fn fallback_has_exactly_n_entries() {
        let four = fallback_subtasks("tides", 4);
        assert_eq!(
            four,
            vec![
                "Research comprehensive information about: tides",
                "Analyze and provide insights about: tides",
                "Find alternative perspectives on: tides",
                "Verify and cross-check facts about: tides",
            ]
        );
        assert_eq!(fallback_subtasks("tides", 2), four[..2].to_vec());
        assert!(fallback_subtasks("tides", 0).is_empty());

        let six = fallback_subtasks("tides", 6);
        assert_eq!(six.len(), 6);
        assert_eq!(six[4], "Explore additional angle 5 on: tides");
        assert_eq!(six[5], "Explore additional angle 6 on: tides");
    }

    #[test]
    fn parses_plain_and_fenced_arrays() {
        assert_eq!(
            parse_subtasks(r#"["a", "b"]"#, 2).unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(
            parse_subtasks("```json\n[\"a\", \"b\"]\n```", 2).unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(
            parse_subtasks("```\n[\"a\"]\n```", 1).unwrap(),
            vec!["a"]
        );
    }

    #[test]
    fn rejects_wrong_shape_and_count() {
        assert!(matches!(
            parse_subtasks("Here are your questions: 1. a", 1),
            Err(DecompositionError::NotJson(_))
        ));
        assert!(matches!(
            parse_subtasks("[1, 2]", 2),
            Err(DecompositionError::NotJson(_))
        ));
        assert!(matches!(
            parse_subtasks(r#"["a", "b", "c"]"#, 2),
            Err(DecompositionError::WrongCount {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn uses_model_split_when_valid() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ChatResponse::text(
            r#"["q1", "q2", "q3"]"#,
        ))]));

        let subtasks = decomposer(provider.clone()).decompose("tides", 3).await;

        assert_eq!(subtasks, vec!["q1", "q2", "q3"]);
        let request = &provider.requests()[0];
        assert_eq!(request[1].text(), Some("Split tides into 3"));
        assert!(provider.tool_names()[0].is_empty());
    }

    #[tokio::test]
    async fn request_text_with_braces_reaches_model_verbatim() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ChatResponse::text(
            r#"["q1", "q2"]"#,
        ))]));

        decomposer(provider.clone())
            .decompose("explain Python's \"{num_agents}\" format syntax", 2)
            .await;

        assert_eq!(
            provider.requests()[0][1].text(),
            Some("Split explain Python's \"{num_agents}\" format syntax into 2")
        );
    }

    #[tokio::test]
    async fn falls_back_on_llm_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(anyhow::anyhow!(
            "rate limited"
        ))]));

        let subtasks = decomposer(provider).decompose("tides", 4).await;
        assert_eq!(subtasks, fallback_subtasks("tides", 4));
    }

    #[tokio::test]
    async fn falls_back_on_wrong_count() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ChatResponse::text(
            r#"["only one"]"#,
        ))]));

        let subtasks = decomposer(provider).decompose("tides", 2).await;
        assert_eq!(subtasks, fallback_subtasks("tides", 2));
    }
}
