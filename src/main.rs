use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use convo_config::StoreConfig;
use convo_conversation::ConversationStore;
use convo_core::{HistoryEntry, Interaction};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "convo")]
#[command(about = "Durable conversation transcripts on local disk or S3", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = "convo.yaml")]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh conversation id
    New,

    /// Record a question/answer pair
    Append {
        /// Conversation id; a new one is generated when omitted
        #[arg(short, long)]
        id: Option<String>,

        #[arg(short, long)]
        question: String,

        #[arg(short, long)]
        answer: String,

        /// JSON file holding a list of {role, content} messages to merge first
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,

        /// Idempotency key; retrying with the same key does not duplicate the pair
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Print stored messages
    History {
        #[arg(short, long)]
        id: String,

        /// Print the raw JSON messages
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },

    /// Print the transcript as Human/Assistant prompt lines
    Prompt {
        #[arg(short, long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    if let Commands::New = cli.command {
        println!("{}", ConversationStore::new_conversation_id());
        return Ok(());
    }

    let config = if cli.config.exists() {
        info!("Loading configuration from: {:?}", cli.config);
        StoreConfig::from_yaml(&cli.config)?
    } else {
        info!("Using environment configuration");
        StoreConfig::from_env()?
    };

    let store = ConversationStore::from_config(&config).await?;

    match cli.command {
        Commands::New => {}
        Commands::Append {
            id,
            question,
            answer,
            history,
            key,
        } => {
            let id = id.unwrap_or_else(ConversationStore::new_conversation_id);
            let mut interaction = Interaction::new(question, answer);
            if let Some(path) = history {
                interaction = interaction.with_history(read_history(&path)?);
            }
            if let Some(key) = key {
                interaction = interaction.with_idempotency_key(key);
            }

            let transcript = store.append_interaction(&id, interaction).await?;
            println!("{}", id);
            info!("Conversation {} now has {} messages", id, transcript.len());
        }
        Commands::History { id, json } => {
            let messages = store.history(&id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                for message in &messages {
                    println!(
                        "[{}] {}: {}",
                        message.timestamp.to_rfc3339(),
                        message.role,
                        message.content
                    );
                }
            }
        }
        Commands::Prompt { id } => {
            println!("{}", store.render_as_prompt(&id).await?);
        }
    }

    Ok(())
}

fn read_history(path: &Path) -> Result<Vec<HistoryEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {:?}", path))?;
    let entries: Vec<HistoryEntry> = serde_json::from_str(&content)
        .with_context(|| format!("History file {:?} is not a list of {{role, content}}", path))?;
    Ok(entries)
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
