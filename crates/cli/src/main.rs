//! colloquy CLI - the main entry point.
//!
//! Commands:
//! - `init`    - Write a default config file and session directory
//! - `chat`    - Interactive session loop
//! - `send`    - Run one turn and print the answer
//! - `prompt`  - Show the assembled system message and its token count
//! - `reset`   - Clear the conversation log (facts are kept)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod render;
mod session;

#[derive(Parser)]
#[command(
    name = "colloquy",
    about = "colloquy — conversational sessions over streaming LLMs",
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
    /// Write a default config file and create the session directory
    Init,

    /// Start an interactive session
    Chat,

    /// Send a single message and print the answer
    Send {
        /// The message text
        message: String,

        /// Attach an image file to the message
        #[arg(short, long)]
        attach: Option<PathBuf>,
    },

    /// Print the current system message and its token count
    Prompt,

    /// Clear the conversation log; facts are kept
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with chat output.
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
        Commands::Init => commands::init::run().await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::Send { message, attach } => commands::send::run(message, attach).await?,
        Commands::Prompt => commands::prompt::run().await?,
        Commands::Reset => commands::reset::run().await?,
    }

    Ok(())
}
