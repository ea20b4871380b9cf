use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use convoy_core::{agent, config, orchestrator, providers, tools};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod display;
mod onboard;

#[derive(Parser)]
#[command(name = "convoy")]
#[command(about = "convoy - tool-calling agents, alone or in parallel", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.convoy/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive setup that writes the config file
    Onboard,
    /// Talk to a single agent
    Chat {
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Split the request across parallel agents and merge their answers
    Heavy {
        #[arg(short, long)]
        message: Option<String>,
    },
}

const EXIT_WORDS: [&str; 3] = ["quit", "exit", "bye"];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn load(path: &Path) -> Result<config::Config> {
    config::load_config_from(path)
        .with_context(|| format!("Could not load configuration from {}", path.display()))
}

fn ensure_workspace(config: &config::Config) -> Result<()> {
    if !config.workspace_dir.exists() {
        std::fs::create_dir_all(&config.workspace_dir).with_context(|| {
            format!(
                "Could not create workspace at {}",
                config.workspace_dir.display()
            )
        })?;
    }
    Ok(())
}

/// Reads one trimmed line from stdin. `None` on EOF or an exit word.
fn prompt_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();

    let mut input = String::new();
    match io::stdin().lock().read_line(&mut input) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let input = input.trim().to_string();
            if EXIT_WORDS.contains(&input.to_lowercase().as_str()) {
                None
            } else {
                Some(input)
            }
        }
    }
}

async fn chat(config: config::Config, message: Option<String>) -> Result<()> {
    ensure_workspace(&config)?;

    let provider: Arc<dyn convoy_core::Provider> = Arc::from(providers::create_provider(&config)?);
    let context_builder = agent::ContextBuilder::new(config.system_prompt.clone())
        .with_workspace(&config.workspace_dir);
    let agent_loop = agent::AgentLoop::new(
        provider,
        context_builder,
        tools::default_registry(&config),
    )
    .with_max_iterations(config.max_iterations);

    if let Some(msg) = message {
        println!("\n🤔 Processing...\n");
        let response = agent_loop
            .run(&msg)
            .await
            .context("Agent processing failed")?;
        println!("{}", response);
        return Ok(());
    }

    println!("🚚 Convoy");
    println!("Type your message ('quit', 'exit' or 'bye' to leave):\n");

    while let Some(input) = prompt_line("> ") {
        if input.is_empty() {
            continue;
        }

        println!("\n🤔 Processing...\n");
        match agent_loop.run(&input).await {
            Ok(response) => println!("{}", response),
            Err(e) => eprintln!("❌ Error: {}", e),
        }
        println!();
    }

    println!("\n👋 Goodbye!");
    Ok(())
}

async fn heavy(config: config::Config, message: Option<String>) -> Result<()> {
    ensure_workspace(&config)?;

    let provider: Arc<dyn convoy_core::Provider> = Arc::from(providers::create_provider(&config)?);
    let orchestrator = orchestrator::Orchestrator::from_config(provider, &config);

    if let Some(msg) = message {
        display::run_with_progress(&orchestrator, &config.model, &msg).await?;
        return Ok(());
    }

    println!("Multi-Agent Orchestrator");
    println!(
        "Configured for {} parallel agents using {}",
        orchestrator.num_agents(),
        config.model
    );
    println!("Type 'quit', 'exit', or 'bye' to exit");
    println!("{}", "-".repeat(50));

    while let Some(input) = prompt_line("\nUser: ") {
        if input.is_empty() {
            println!("Please enter a question or command.");
            continue;
        }

        println!("\nOrchestrator: Starting multi-agent analysis...\n");
        if let Err(e) = display::run_with_progress(&orchestrator, &config.model, &input).await {
            eprintln!("❌ Error: {}", e);
        }
    }

    println!("Goodbye!");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(config::get_config_path);

    let command = cli.command.unwrap_or_else(|| {
        if !config_path.exists() {
            Commands::Onboard
        } else {
            Commands::Chat { message: None }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard(&config_path).map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config_to(&onboard_config, &config_path)?;
        }
        Commands::Chat { message } => chat(load(&config_path)?, message).await?,
        Commands::Heavy { message } => heavy(load(&config_path)?, message).await?,
    }

    Ok(())
}
