//! CLI module for Parley
//!
//! Provides commands to operate the conversation stores:
//! - `health`: Probe the backing store
//! - `resolve`, `new`, `append`, `context`, `show`, `list`, `summarize`:
//!   Primary conversation store
//! - `agent`: Agent conversation store
//! - `classify`: Check agent output for context-window exhaustion

use anyhow::Result;
use clap::{Parser, Subcommand};
use parley_core::{AgentRole, ConversationStatus, MessageSource, QueueType, Role, Stores};
use std::io::Read;
use tracing::{info, warn};

pub mod agent;
pub mod conversation;

/// Parley conversational memory CLI
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Conversational memory for coding agents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Conversation(ConversationCommands),
    /// Agent conversation commands
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Read agent output from stdin and report context-window errors
    Classify,
}

#[derive(Subcommand, Debug)]
pub enum ConversationCommands {
    /// Probe the backing store
    Health,
    /// Resolve the conversation to use (explicit id or the queue's active one)
    Resolve {
        /// Explicit conversation id
        #[arg(long)]
        id: Option<String>,
        /// Queue type
        #[arg(long, default_value = "default")]
        queue: QueueType,
    },
    /// Start a fresh conversation and make it the queue's active one
    New {
        /// Use this id instead of generating one
        #[arg(long)]
        id: Option<String>,
        /// Queue type
        #[arg(long, default_value = "default")]
        queue: QueueType,
    },
    /// Append a message
    Append {
        /// Conversation id
        id: String,
        /// user or assistant
        role: Role,
        /// Message text
        content: String,
        /// Mark as a review turn
        #[arg(long)]
        review: bool,
    },
    /// Print the rendered context handed to the agent
    Context {
        /// Conversation id
        id: String,
    },
    /// Print the full conversation record as JSON
    Show {
        /// Conversation id
        id: String,
    },
    /// List all conversations, most recent first
    List,
    /// Replace the agent-facing history with the given summary
    Summarize {
        /// Conversation id
        id: String,
        /// Summary text
        #[arg(long)]
        summary: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Create an agent conversation
    Create {
        /// Use this id instead of generating one
        #[arg(long)]
        id: Option<String>,
        /// Owning agent
        #[arg(long)]
        agent_id: Option<String>,
        /// Title
        #[arg(long)]
        title: Option<String>,
    },
    /// Append a message
    Add {
        /// Conversation id
        id: String,
        /// user, assistant, system or tool
        role: AgentRole,
        /// Message text
        content: String,
        /// Originating channel
        #[arg(long)]
        source: Option<MessageSource>,
    },
    /// Set the status
    Status {
        /// Conversation id
        id: String,
        /// active, completed, archived or failed
        status: ConversationStatus,
    },
    /// List agent conversations
    List {
        /// Only conversations owned by this agent
        #[arg(long)]
        agent_id: Option<String>,
    },
    /// Print an agent conversation as JSON
    Show {
        /// Conversation id
        id: String,
    },
}

async fn connect() -> Result<Stores> {
    let app = crate::loader::load_config()?;
    let stores = Stores::connect(&app.store).await?;
    if stores.backing.is_available() {
        info!(redis_url = %app.store.redis_url, "Connected to backing store");
    } else {
        warn!(
            redis_url = %app.store.redis_url,
            "Backing store unreachable, running in degraded mode"
        );
    }
    Ok(stores)
}

/// Run the CLI command
pub async fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Classify => classify(),
        Commands::Agent { command } => agent::run(&connect().await?, command).await,
        Commands::Conversation(command) => conversation::run(&connect().await?, command).await,
    }
}

fn classify() -> Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    match parley_core::matched_pattern(&input) {
        Some(pattern) => println!("context-window error ({})", pattern),
        None => println!("ok"),
    }
    Ok(())
}
