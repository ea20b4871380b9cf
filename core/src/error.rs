use std::path::PathBuf;
use thiserror::Error;

/// Failures that end an agent run. Tool and argument problems never show up here; the loop
/// turns them into soft tool results.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM call failed: {0:#}")]
    LlmCall(anyhow::Error),
}

/// Construction-time configuration problems. These are the only errors allowed to abort a
/// request before any agent work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}. Run 'convoy onboard' to set up your configuration.")]
    NotFound(PathBuf),

    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
