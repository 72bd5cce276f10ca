//! Ask a running search agent server a single question.

use clap::Parser;
use search_agent::client::{AgentClient, DEFAULT_SERVER_URL};

#[derive(Parser)]
#[command(name = "search-agent-ask")]
#[command(about = "Send a message to a running search agent and print the answer", long_about = None)]
struct Cli {
    #[arg(help = "Message to send to the agent")]
    message: String,

    #[arg(long, default_value = DEFAULT_SERVER_URL, help = "URL of the /chat endpoint")]
    server_url: String,

    #[arg(long, help = "Model to use (server default if omitted)")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let client = AgentClient::new(cli.server_url)?;
    let answer = client.ask(&cli.message, cli.model.as_deref()).await?;
    println!("{}", answer);

    Ok(())
}
