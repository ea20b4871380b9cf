use crate::config::SearchConfig;
use crate::tools::{extract_string_arg, extract_usize_arg_opt};
use crate::traits::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    results: Vec<Topic>,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Topic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "FirstURL")]
    first_url: Option<String>,
    // Category groups nest further topics instead of carrying text.
    #[serde(default)]
    topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

fn collect_topics(topics: &[Topic], hits: &mut Vec<SearchHit>) {
    for topic in topics {
        if let (Some(text), Some(url)) = (&topic.text, &topic.first_url)
            && !text.is_empty()
        {
            // Titles are the part before " - " in DuckDuckGo topic texts.
            let title = text.split(" - ").next().unwrap_or(text).to_string();
            hits.push(SearchHit {
                title,
                url: url.clone(),
                snippet: text.clone(),
            });
        }
        collect_topics(&topic.topics, hits);
    }
}

fn extract_hits(answer: &InstantAnswer, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !answer.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: answer.heading.clone(),
            url: answer.abstract_url.clone(),
            snippet: answer.abstract_text.clone(),
        });
    }

    collect_topics(&answer.results, &mut hits);
    collect_topics(&answer.related_topics, &mut hits);

    hits.truncate(max_results);
    hits
}

/// Web search through the DuckDuckGo Instant Answer API.
pub struct SearchTool {
    client: reqwest::Client,
    config: SearchConfig,
    endpoint: String,
}

impl SearchTool {
    pub fn new(config: SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();

        Self {
            client,
            config,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("search API returned {}", response.status());
        }

        let answer: InstantAnswer = response.json().await?;
        Ok(extract_hits(&answer, max_results))
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web using DuckDuckGo for current information"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query to find information on the web"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of search results to return",
                    "default": self.config.max_results
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let query = extract_string_arg(&args, "query")?;
        let max_results =
            extract_usize_arg_opt(&args, "max_results").unwrap_or(self.config.max_results);

        match self.search(&query, max_results).await {
            Ok(hits) => Ok(serde_json::to_value(hits)?),
            Err(e) => {
                tracing::warn!(%query, "Web search failed: {:#}", e);
                Ok(json!([{ "error": format!("Search failed: {e:#}") }]))
            }
        }
    }
}
