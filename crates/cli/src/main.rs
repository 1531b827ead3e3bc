//! ToolLoop CLI: the main entry point.
//!
//! Commands:
//! - `review`: Review the unstaged changes of the current git repository
//! - `ask`   : Ask the agent a single question
//! - `config`: Show the effective or default configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolloop",
    about = "ToolLoop — tool-calling agent loop and code review assistant",
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
    /// Review the unstaged changes of the current git repository
    Review {
        /// Override the maximum number of model rounds
        #[arg(long)]
        max_steps: Option<u32>,

        /// Wait for complete responses instead of streaming them
        #[arg(long)]
        buffered: bool,
    },

    /// Ask the agent a single question
    Ask {
        /// The question
        message: String,

        /// Override the maximum number of model rounds
        #[arg(long)]
        max_steps: Option<u32>,
    },

    /// Show the effective configuration
    Config {
        /// Print the default configuration instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout carries the agent's answer
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Review {
            max_steps,
            buffered,
        } => commands::review::run(max_steps, buffered).await?,
        Commands::Ask { message, max_steps } => commands::ask::run(message, max_steps).await?,
        Commands::Config { default } => commands::config_cmd::show(default)?,
    }

    Ok(())
}
