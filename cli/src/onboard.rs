use anyhow::{Context, Result};
use console::style;
use convoy_core::config::Config;
use dialoguer::{Input, Select};
use std::path::Path;

const BANNER: &str = r"
    -------------------------------------

      ___ ___  _ ____   _____  _   _
     / __/ _ \| '_ \ \ / / _ \| | | |
    | (_| (_) | | | \ V / (_) | |_| |
     \___\___/|_| |_|\_/ \___/ \__, |
                               |___/

    -------------------------------------
";

const MODELS: [&str; 4] = [
    "google/gemini-2.5-flash",
    "google/gemini-2.5-pro",
    "openai/gpt-4o-mini",
    "anthropic/claude-sonnet-4",
];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_api_key() -> Result<String> {
    let api_key: String = Input::new()
        .with_prompt("Enter your OpenRouter API key")
        .interact_text()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key.trim().to_string())
}

fn setup_model() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select your model")
        .items(&MODELS)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(MODELS[selection].to_string())
}

fn setup_parallel_agents() -> Result<usize> {
    let agents: usize = Input::new()
        .with_prompt("How many agents should run in parallel in heavy mode?")
        .default(4)
        .validate_with(|n: &usize| {
            if (1..=16).contains(n) {
                Ok(())
            } else {
                Err("choose between 1 and 16 agents")
            }
        })
        .interact_text()
        .context("Failed to read agent count")?;

    Ok(agents)
}

pub fn run_onboard(config_path: &Path) -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to Convoy!").white().bold());
    println!(
        "  {}",
        style("This wizard writes your configuration in under a minute.").dim()
    );
    println!();

    print_step(1, 4, "API Key Setup");
    let api_key = setup_api_key()?;

    print_step(2, 4, "Model Selection");
    let model = setup_model()?;

    print_step(3, 4, "Heavy Mode");
    let parallel_agents = setup_parallel_agents()?;

    let mut config = Config {
        api_key,
        model,
        ..Default::default()
    };
    config.orchestrator.parallel_agents = parallel_agents;

    print_step(4, 4, "Workspace Setup");
    if let Err(e) = std::fs::create_dir_all(&config.workspace_dir) {
        eprintln!(
            "  {} Warning: Could not create workspace: {}",
            style("!").yellow(),
            e
        );
    } else {
        println!(
            "  {} Workspace ready at {}",
            style("✓").green(),
            style(config.workspace_dir.display()).cyan()
        );
    }

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config will be saved to {}",
        style("→").green(),
        style(config_path.display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {} or {}",
        style("→").green(),
        style("convoy chat").cyan().bold(),
        style("convoy heavy").cyan().bold()
    );
    println!();

    Ok(config)
}
