use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONVOY_DIR: &str = ".convoy";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful research assistant. Use the available \
tools to gather facts, run calculations and work with files when that improves your answer. \
Explain your findings clearly and completely. When the user's request has been fully \
satisfied, you MUST call the mark_task_complete tool.";

pub const DEFAULT_QUESTION_GENERATION_PROMPT: &str = "You are an orchestrator that splits a \
request into {num_agents} independent research questions, each looking at the topic from a \
different angle.

Original request: {user_input}

Return ONLY a JSON array of exactly {num_agents} strings, for example:
[\"question 1\", \"question 2\"]
Do not add any other text.";

pub const DEFAULT_SYNTHESIS_PROMPT: &str = "{num_responses} agents analysed the same request \
from different perspectives. Combine their work into ONE comprehensive, well-structured final \
answer. Resolve contradictions, remove repetition and keep every important detail. Do not \
mention the agents or that several responses existed.

{agent_responses}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub parallel_agents: usize,
    pub task_timeout_secs: u64,
    pub aggregation_strategy: String,
    pub question_generation_prompt: String,
    pub synthesis_prompt: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            parallel_agents: 4,
            task_timeout_secs: 300,
            aggregation_strategy: "consensus".to_string(),
            question_generation_prompt: DEFAULT_QUESTION_GENERATION_PROMPT.to_string(),
            synthesis_prompt: DEFAULT_SYNTHESIS_PROMPT.to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            user_agent: "Mozilla/5.0 (compatible; convoy/0.1)".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_iterations: usize,
    pub system_prompt: String,
    pub orchestrator: OrchestratorConfig,
    pub search: SearchConfig,
    #[serde(skip)]
    pub workspace_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "google/gemini-2.5-flash".to_string(),
            temperature: 0.7,
            max_iterations: 10,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            orchestrator: OrchestratorConfig::default(),
            search: SearchConfig::default(),
            workspace_dir: get_convoy_dir().join("workspace"),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let orchestrator = &self.orchestrator;
        if orchestrator.parallel_agents == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.parallel_agents must be at least 1".to_string(),
            ));
        }
        if orchestrator.task_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.task_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !orchestrator.question_generation_prompt.contains("{user_input}") {
            return Err(ConfigError::Invalid(
                "orchestrator.question_generation_prompt must contain {user_input}".to_string(),
            ));
        }
        if !orchestrator.synthesis_prompt.contains("{agent_responses}") {
            return Err(ConfigError::Invalid(
                "orchestrator.synthesis_prompt must contain {agent_responses}".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn get_convoy_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(CONVOY_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_convoy_dir().join("config.toml")
}

/// Reads, parses and validates a config file. The workspace directory is always derived, never
/// read from the file.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    config.workspace_dir = get_convoy_dir().join("workspace");
    config.validate()?;

    Ok(config)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.orchestrator.parallel_agents, 4);
        assert_eq!(config.orchestrator.aggregation_strategy, "consensus");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "model = \"openai/gpt-4o\"\n\n[orchestrator]\nparallel_agents = 2\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.model, "openai/gpt-4o");
        assert_eq!(config.orchestrator.parallel_agents, 2);
        assert_eq!(config.orchestrator.task_timeout_secs, 300);
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load_config_from(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "max_iterations = \"many\"").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_agents_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[orchestrator]\nparallel_agents = 0\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("parallel_agents"));
    }

    #[test]
    fn synthesis_template_needs_responses_placeholder() {
        let mut config = Config::default();
        config.orchestrator.synthesis_prompt = "merge everything".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let config = Config {
            api_key: "sk-test".to_string(),
            max_iterations: 3,
            ..Default::default()
        };

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.api_key, "sk-test");
        assert_eq!(loaded.max_iterations, 3);
        assert_eq!(loaded.orchestrator, config.orchestrator);
    }
}
