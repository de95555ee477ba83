//! tabletalk CLI — the main entry point.
//!
//! Commands:
//! - `serve` — Start the HTTP gateway
//! - `ask`   — One-shot question or interactive chat in the terminal

use clap::{Parser, Subcommand};

mod commands;
mod demo;

#[derive(Parser)]
#[command(
    name = "tabletalk",
    about = "tabletalk — ask your tables questions, get SQL-grounded answers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question (interactive chat when no message is given)
    Ask {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask { message } => commands::ask::run(message).await?,
    }

    Ok(())
}
