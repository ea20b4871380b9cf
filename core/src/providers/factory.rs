use crate::config::Config;
use crate::providers::OpenRouterProvider;
use crate::traits::Provider;
use anyhow::{Result, anyhow};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub fn create_provider(config: &Config) -> Result<Box<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openrouter");

    let (env_vars, default_base_url): (&[&str], Option<&str>) =
        match provider_name.to_lowercase().as_str() {
            "openrouter" => (&["OPENROUTER_API_KEY", "CONVOY_OPENROUTER_API_KEY"], None),
            "openai" => (
                &["OPENAI_API_KEY", "CONVOY_OPENAI_API_KEY"],
                Some(OPENAI_BASE_URL),
            ),
            _ => {
                return Err(anyhow!(
                    "Unknown provider: {}. Available: openrouter, openai",
                    provider_name
                ));
            }
        };

    let api_key = resolve_api_key_with_fallback(env_vars, &config.api_key)?;
    let mut provider = OpenRouterProvider::new(api_key)
        .with_model(config.model.clone())
        .with_temperature(config.temperature);

    if let Some(base_url) = config.base_url.as_deref().or(default_base_url) {
        provider = provider.with_base_url(base_url);
    }

    Ok(Box::new(provider))
}

fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> Result<String> {
    for var_name in env_vars {
        if let Ok(key) = resolve_api_key_from_env(var_name) {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!(
            "No API key found. Set one of {} or api_key in the config file",
            env_vars.join(", ")
        ))
    }
}

fn resolve_api_key_from_env(var_name: &str) -> Result<String> {
    std::env::var(var_name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Environment variable {} not set", var_name))
}
