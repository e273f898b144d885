#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tutor_client::{open_store, ChatSession};
use tutor_common::logging::init_logging;
use tutor_common::{StorageBackend, TutorConfig, Validate};

mod commands;
mod repl;

/// `tutor` - terminal client for the Tutor study assistant.
#[derive(Parser, Debug)]
#[command(name = "tutor")]
#[command(version)]
#[command(about = "Chat, quiz and manage study data with the Tutor backend.", long_about = None)]
struct Cli {
    /// Config file (default: ~/.tutor/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep history and API keys in memory for this run only
    #[arg(long, global = true)]
    memory_store: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat about a subject (interactive unless --message is given)
    Chat {
        /// Subject key, e.g. math
        #[arg(short, long)]
        subject: String,

        /// Send a single message and exit
        #[arg(short, long)]
        message: Option<String>,

        /// Attach an image to the first message
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Start a quiz for a subject
    Quiz {
        #[arg(short, long)]
        subject: String,
    },

    /// Inspect or export learning memory
    Memory {
        #[command(subcommand)]
        memory_command: MemoryCommands,
    },

    /// Export the wrong-question book
    Wrong {
        #[command(subcommand)]
        wrong_command: WrongCommands,
    },

    /// Import a memory_*.json or wrong_*.json export
    Import {
        file: PathBuf,
    },

    /// Manage API keys sent with chat requests
    Keys {
        #[command(subcommand)]
        key_command: KeyCommands,
    },

    /// Show or clear local conversation history
    History {
        #[command(subcommand)]
        history_command: HistoryCommands,
    },
}

#[derive(Subcommand, Debug)]
enum MemoryCommands {
    /// Print stored memory as JSON
    Show {
        #[arg(short, long)]
        subject: String,
    },
    /// Write memory_{subject}.json
    Export {
        #[arg(short, long)]
        subject: String,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum WrongCommands {
    /// Write wrong_{subject}.json
    Export {
        #[arg(short, long)]
        subject: String,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCommands {
    /// List configured keys (masked)
    List,
    /// Add or replace a key
    Set { name: String, value: String },
    /// Remove a key
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// Print the saved conversation
    Show {
        #[arg(short, long)]
        subject: String,
    },
    /// Delete the saved conversation
    Clear {
        #[arg(short, long)]
        subject: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = TutorConfig::load_with_env(cli.config.as_deref())?;
    if cli.memory_store {
        config.storage.backend = StorageBackend::Memory;
    }

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );
    config.validate().context("Invalid configuration")?;

    let store = open_store(&config.storage).context("Failed to open local storage")?;
    tracing::debug!(backend = store.name(), base_url = %config.backend.base_url, "Client ready");
    let mut session =
        ChatSession::from_config(&config, store).context("Failed to create HTTP client")?;

    match cli.command {
        Commands::Chat {
            subject,
            message,
            image,
        } => commands::chat(&mut session, &config, &subject, message, image).await,

        Commands::Quiz { subject } => commands::quiz(&mut session, &subject).await,

        Commands::Memory { memory_command } => match memory_command {
            MemoryCommands::Show { subject } => commands::show_memory(&session, &subject).await,
            MemoryCommands::Export { subject, out } => {
                commands::export_memory(&session, &subject, &out).await
            }
        },

        Commands::Wrong { wrong_command } => match wrong_command {
            WrongCommands::Export { subject, out } => {
                commands::export_wrong(&session, &subject, &out).await
            }
        },

        Commands::Import { file } => commands::import(&session, &file).await,

        Commands::Keys { key_command } => match key_command {
            KeyCommands::List => commands::list_keys(&session),
            KeyCommands::Set { name, value } => commands::set_key(&session, &name, &value),
            KeyCommands::Remove { name } => commands::remove_key(&session, &name),
        },

        Commands::History { history_command } => match history_command {
            HistoryCommands::Show { subject } => commands::show_history(&mut session, &subject),
            HistoryCommands::Clear { subject } => commands::clear_history(&mut session, &subject),
        },
    }
}
