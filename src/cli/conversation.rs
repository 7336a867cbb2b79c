//! Primary conversation store commands

use super::ConversationCommands as Commands;
use anyhow::{bail, Result};
use parley_core::Stores;

/// Run a conversation store command.
pub async fn run(stores: &Stores, cmd: Commands) -> Result<()> {
    let store = &stores.conversations;

    match cmd {
        Commands::Health => {
            if store.health_check().await {
                println!("reachable");
            } else {
                println!("unreachable (degraded mode)");
            }
        }
        Commands::Resolve { id, queue } => {
            println!("{}", store.resolve_conversation_id(id.as_deref(), queue).await);
        }
        Commands::New { id, queue } => {
            let id = match id {
                Some(id) => {
                    store.create_conversation(&id, queue).await;
                    id
                }
                None => store.force_new_conversation(queue).await,
            };
            println!("{}", id);
        }
        Commands::Append {
            id,
            role,
            content,
            review,
        } => {
            store.append_message(&id, role, &content, review).await;
        }
        Commands::Context { id } => {
            println!("{}", store.get_rendered_context(&id).await);
        }
        Commands::Show { id } => match store.get_conversation(&id).await {
            Some(ctx) => println!("{}", serde_json::to_string_pretty(&ctx)?),
            None => bail!("conversation not found: {}", id),
        },
        Commands::List => {
            for ctx in store.list_all().await {
                println!(
                    "{}  {}  {} messages{}",
                    ctx.conversation_id,
                    ctx.last_accessed_at.to_rfc3339(),
                    ctx.messages.len(),
                    if ctx.is_summarized() { " (summarized)" } else { "" }
                );
            }
        }
        Commands::Summarize { id, summary } => {
            store
                .summarize(&id, |_| async move { Ok::<_, std::convert::Infallible>(summary) })
                .await?;
        }
    }
    Ok(())
}
