//! Folio CLI, the main entry point.
//!
//! Commands:
//! - `init`      Write a default config file
//! - `chat`      Ask a question, or chat interactively
//! - `health`    Check the backend and history store
//! - `models`    List models the backend serves
//! - `history`   Show a session's past turns
//! - `session`   Create or inspect sessions
//! - `starters`  Show the conversation starters
//! - `stats`     Show history analytics

use clap::{Parser, Subcommand};
use folio_core::message::StatsRange;

mod commands;

#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: a portfolio chatbot over a local LLM",
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
    /// Write a default config file to ~/.folio/config.toml
    Init,

    /// Chat with the portfolio assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Override the configured model
        #[arg(long)]
        model: Option<String>,

        /// Tag stored turns with a user id
        #[arg(long)]
        user: Option<String>,

        /// Print the response as it is generated
        #[arg(long)]
        stream: bool,

        /// Print the full response record as JSON (single message only)
        #[arg(long, conflicts_with = "stream")]
        json: bool,
    },

    /// Check the generation backend and history store
    Health {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List models available on the backend
    Models,

    /// Show the turns of a session, oldest first
    History {
        /// Session id
        session: String,

        /// Maximum number of turns (defaults to history.list_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Create or inspect sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Show the conversation starters from the knowledge base
    Starters,

    /// Show message counts, top questions and daily volume
    Stats {
        /// Time window: day, week, month or all
        #[arg(short, long, default_value = "week")]
        range: StatsRange,

        /// Print the stats as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Create a new session
    New {
        /// Explicit session id
        #[arg(long)]
        id: Option<String>,

        /// Owner of the session
        #[arg(long)]
        user: Option<String>,
    },

    /// Show a session with its recent messages
    Show {
        /// Session id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so responses on stdout stay pipeable
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
        Commands::Chat {
            message,
            session,
            model,
            user,
            stream,
            json,
        } => {
            let options = commands::chat::ChatOptions {
                session,
                model,
                user,
                stream,
                json,
            };
            commands::chat::run(message, options).await?
        }
        Commands::Health { json } => commands::health::run(json).await?,
        Commands::Models => commands::models::run().await?,
        Commands::History { session, limit } => commands::history::run(session, limit).await?,
        Commands::Session { action } => commands::session::run(action).await?,
        Commands::Starters => commands::starters::run().await?,
        Commands::Stats { range, json } => commands::stats::run(range, json).await?,
    }

    Ok(())
}
