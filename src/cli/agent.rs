//! Agent conversation store commands

use super::AgentCommands;
use anyhow::{bail, Result};
use parley_core::{NewAgentConversation, NewAgentMessage, Stores};

/// Run an agent subcommand.
pub async fn run(stores: &Stores, cmd: AgentCommands) -> Result<()> {
    let store = &stores.agent_conversations;

    match cmd {
        AgentCommands::Create {
            id,
            agent_id,
            title,
        } => {
            let input = NewAgentConversation {
                conversation_id: id,
                agent_id,
                title,
                ..Default::default()
            };
            println!("{}", store.create_conversation(input).await);
        }
        AgentCommands::Add {
            id,
            role,
            content,
            source,
        } => {
            let mut input = NewAgentMessage::new(role, content);
            input.source = source;
            let message = store.add_message(&id, input).await?;
            println!("{}", message.message_id);
        }
        AgentCommands::Status { id, status } => {
            store.update_status(&id, status).await?;
        }
        AgentCommands::List { agent_id } => {
            let conversations = match agent_id {
                Some(agent_id) => store.list_by_agent(&agent_id).await,
                None => store.list_conversations().await,
            };
            for c in conversations {
                println!(
                    "{}  {}  {}  {} messages  {}",
                    c.conversation_id,
                    c.status,
                    c.last_accessed_at.to_rfc3339(),
                    c.messages.len(),
                    c.title.as_deref().unwrap_or("-")
                );
            }
        }
        AgentCommands::Show { id } => match store.get_conversation(&id).await {
            Some(c) => println!("{}", serde_json::to_string_pretty(&c)?),
            None => bail!("agent conversation not found: {}", id),
        },
    }
    Ok(())
}
