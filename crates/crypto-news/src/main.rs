//! crypto-news tool provider
//!
//! Without arguments: serve `get_crypto_news` over stdio until the client
//! disconnects. With `test`: fetch once and print a preview.

use std::sync::Arc;

use agent_mcp::{Implementation, McpServer};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crypto_news::{
    CryptoPanicClient, NewsConfig, NewsTool,
    config::API_KEY_ENV,
    digest::{PREVIEW_CHARS, format_digest, preview},
    feed::collect_news,
};

#[derive(Parser, Debug)]
#[command(name = "crypto-news")]
#[command(version, about = "CryptoPanic news digest as an MCP tool provider (stdio)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the fetch-and-format pipeline once and print a preview
    Test,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    // stdout carries the protocol, logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = NewsConfig::from_env();
    if !config.has_api_key() {
        tracing::error!("{} not found in environment variables", API_KEY_ENV);
    }

    match cli.command {
        Some(Command::Test) => run_test(config).await,
        None => serve(config).await,
    }
}

async fn serve(config: NewsConfig) -> anyhow::Result<()> {
    let max_pages = config.max_pages;
    let digest_limit = config.digest_limit;
    let client = Arc::new(CryptoPanicClient::new(config)?);

    let server = McpServer::new(
        Implementation::new("crypto_news", env!("CARGO_PKG_VERSION")),
        NewsTool::new(client, max_pages, digest_limit),
    );

    tracing::info!("Starting crypto news MCP server...");
    server.serve_stdio().await?;
    Ok(())
}

async fn run_test(config: NewsConfig) -> anyhow::Result<()> {
    println!("Testing crypto news fetcher locally...");

    if !config.has_api_key() {
        println!("❌ {API_KEY_ENV} not found. Please set it in your .env file");
        return Ok(());
    }

    println!("✅ API key found");
    println!("Fetching crypto news...");

    let max_pages = config.max_pages;
    let digest_limit = config.digest_limit;
    let client = CryptoPanicClient::new(config)?;
    let news = collect_news(&client, max_pages).await;

    if news.is_empty() {
        println!("❌ No news items fetched");
        return Ok(());
    }

    println!("✅ Successfully fetched {} news items", news.len());
    let readable = format_digest(&news, digest_limit);
    let ruler = "=".repeat(50);
    println!("\n{ruler}");
    println!("{}", preview(&readable, PREVIEW_CHARS));
    println!("{ruler}");
    Ok(())
}
