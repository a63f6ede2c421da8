//! agent-cli
//!
//! Launches the configured tool providers, merges their tools, asks the
//! agent one question and prints every answer it wrote.

mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentBuilder, LlmProvider, format_answer};
use agent_mcp::{McpError, ProviderDescriptorSet, ToolAggregator};
use agent_runtime::OllamaProvider;

use crate::settings::AgentSettings;

const DEFAULT_QUERY: &str = "Give me AAPL stock price";

/// Ask a tool-calling agent one question
#[derive(Parser, Debug)]
#[command(name = "agent-cli")]
#[command(author, version, about)]
#[command(long_about = r"
Ask a tool-calling agent one question.

Tool providers are read from (in priority order):
1. --servers <path>        Explicit TOML file
2. $MCP_SERVERS_CONFIG     TOML file named by the environment
3. built-in set            crypto_news, yfinanceserver

Model settings come from AGENT_MODEL, AGENT_TEMPERATURE, AGENT_MAX_ITERATIONS,
OLLAMA_HOST and OLLAMA_PORT; a .env file overrides the environment.

Example:
  agent-cli
  agent-cli 'What is the latest crypto news?' --servers providers.toml
")]
struct Cli {
    /// The question to ask
    #[arg(default_value = DEFAULT_QUERY)]
    query: String,

    /// Provider configuration file
    #[arg(long, value_name = "PATH")]
    servers: Option<PathBuf>,

    /// Model to use (overrides AGENT_MODEL)
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Maximum model calls (overrides AGENT_MAX_ITERATIONS)
    #[arg(long, value_name = "N")]
    max_iterations: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Values in .env win over the inherited environment
    dotenvy::dotenv_override().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let descriptors = ProviderDescriptorSet::load(cli.servers.as_deref())
        .context("Failed to load provider configuration")?;
    let settings = AgentSettings::from_env().with_overrides(cli.model, cli.max_iterations);

    let provider = Arc::new(OllamaProvider::from_env());
    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Connected to Ollama at {}", provider.config().base_url()),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - agent will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    tracing::info!("Starting MCP Client...");
    let tools = match ToolAggregator::aggregate(&descriptors).await {
        Ok(tools) => tools,
        Err(McpError::NoToolsAvailable { .. }) => {
            tracing::error!("❌ No tools loaded. Exiting.");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    for report in &tools.reports {
        tracing::debug!(provider = %report.provider, "{:?}", report.outcome);
    }

    tracing::info!("Creating agent with loaded tools...");
    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(Arc::clone(&tools.namespace))
        .model(&settings.model)
        .temperature(settings.temperature)
        .max_iterations(settings.max_iterations)
        .build();

    let agent = match agent {
        Ok(agent) => agent,
        Err(e) => {
            tools.shutdown().await;
            return Err(e).context("Invalid agent settings");
        }
    };

    tracing::info!(model = %settings.model, "Invoking agent: {}", cli.query);
    let outcome = agent.run(&cli.query).await;
    tools.shutdown().await;

    match outcome {
        Ok(run) => {
            if run.hit_iteration_limit {
                tracing::warn!(
                    "Stopped after {} model calls; the answer may be incomplete",
                    run.model_calls
                );
            }
            for answer in run.answers() {
                println!("{}", format_answer(&answer));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("Agent invocation failed: {}", e);
            tracing::debug!("Partial trace had {} turns", e.trace.len());
            Ok(ExitCode::FAILURE)
        }
    }
}
