//! Agent REPL
//!
//! Interactive terminal loop: connects to the configured tool servers,
//! opens the conversation with the assistant's system prompt and prints
//! every output item as it arrives. `quit` exits; providers are
//! disconnected on every exit path.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{Agent, AgentConfig, DEFAULT_SYSTEM_PROMPT, Message, TurnInput};
use agent_runtime::{MistralProvider, StdioConnector, resolve_specs};

#[derive(Parser)]
#[command(name = "agent-cli", version, about = "Chat with an assistant that can use MCP tools")]
struct Cli {
    /// Path to a JSON file of tool server specs ({name, command, args})
    #[arg(long)]
    servers: Option<PathBuf>,

    /// Maximum tool-call round-trips per turn
    #[arg(long, default_value_t = 10)]
    max_hops: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the terminal quiet unless asked otherwise
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let provider = match MistralProvider::from_env() {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("{}", e.user_message());
            eprintln!("Set MISTRAL_API_KEY in the environment or in a local .env file.");
            return Ok(());
        }
    };

    let specs = resolve_specs(cli.servers.as_deref())?;

    let mut agent = Agent::new(
        Arc::new(provider),
        AgentConfig {
            max_hops: cli.max_hops,
        },
    );
    agent.connect(&StdioConnector::new(), &specs).await?;

    let result = run_repl(&mut agent).await;

    if let Err(e) = agent.disconnect().await {
        tracing::warn!("Provider disconnect failed: {e}");
    }
    println!("Goodbye!");

    result
}

async fn run_repl(agent: &mut Agent) -> anyhow::Result<()> {
    // Open the conversation with the assistant's instructions
    print_turn(agent, TurnInput::Message(Message::system(DEFAULT_SYSTEM_PROMPT))).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        // Newlines around the user input, for clarity
        println!();
        print!(">>> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        println!();

        let prompt = line.trim();
        if prompt == "quit" {
            break;
        }
        if prompt == "debug" {
            println!("Tools: {}", serde_json::to_string_pretty(agent.tool_definitions())?);
            println!(
                "Messages: {}",
                serde_json::to_string_pretty(agent.history().messages())?
            );
            continue;
        }
        if prompt.is_empty() {
            continue;
        }

        print_turn(agent, TurnInput::Text(prompt.into())).await?;
    }

    Ok(())
}

async fn print_turn(agent: &mut Agent, input: TurnInput) -> anyhow::Result<()> {
    let stream = agent.turn(input);
    futures::pin_mut!(stream);
    while let Some(item) = stream.next().await {
        println!("{}", item?);
    }
    Ok(())
}
