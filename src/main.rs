//! Search Agent - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the web search agent.

use clap::Parser;
use search_agent::{
    api,
    config::{self, Config},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "search-agent")]
#[command(about = "Web search LLM agent served over HTTP", long_about = None)]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_HOST, help = "Host to run the app on")]
    host: String,

    #[arg(long, default_value_t = config::DEFAULT_PORT, help = "Port to run the app on")]
    port: u16,

    #[arg(
        long = "log_level",
        alias = "log-level",
        default_value = config::DEFAULT_LOG_LEVEL,
        help = "Logging level"
    )]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine; the variables may come from the environment.
    dotenvy::dotenv().ok();

    let config = Config::from_env()?.with_server(cli.host, cli.port, cli.log_level);

    // Initialize logging
    let default_filter = config.log_filter()?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Loaded configuration: model={}, max_iterations={}",
        config.default_model, config.max_iterations
    );

    api::serve(config).await?;

    Ok(())
}
