use super::*;
use crate::availability::BackingStore;
use crate::backend::{KvBackend, MemoryBackend};
use crate::config::StoreConfig;
use crate::error::Error;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn connected() -> (Arc<MemoryBackend>, AgentConversationStore) {
    let config = StoreConfig::default().with_key_prefix("test");
    let backend = Arc::new(MemoryBackend::new());
    let store = BackingStore::connect(backend.clone(), &config).await;
    (backend, AgentConversationStore::new(store))
}

fn degraded() -> AgentConversationStore {
    let config = StoreConfig::default().with_key_prefix("test");
    AgentConversationStore::new(BackingStore::new(Arc::new(MemoryBackend::new()), &config))
}

#[tokio::test]
async fn test_create_and_get() {
    let (_, store) = connected().await;
    let id = store
        .create_conversation(
            NewAgentConversation::new()
                .with_agent_id("builder")
                .with_title("Fix login")
                .with_metadata("repository", json!("acme/web")),
        )
        .await;

    let conversation = store.get_conversation(&id).await.unwrap();
    assert_eq!(conversation.conversation_id, id);
    assert_eq!(conversation.agent_id.as_deref(), Some("builder"));
    assert_eq!(conversation.title.as_deref(), Some("Fix login"));
    assert_eq!(conversation.status, ConversationStatus::Active);
    assert_eq!(conversation.metadata["repository"], json!("acme/web"));
    assert!(conversation.messages.is_empty());
}

#[tokio::test]
async fn test_create_with_explicit_id() {
    let (_, store) = connected().await;
    let id = store
        .create_conversation(NewAgentConversation::new().with_id("agent-1"))
        .await;
    assert_eq!(id, "agent-1");
    assert!(store.get_conversation("agent-1").await.is_some());
}

#[tokio::test]
async fn test_add_message_generates_id_and_timestamp() {
    let (_, store) = connected().await;
    let id = store.create_conversation(NewAgentConversation::new()).await;

    let message = store
        .add_message(
            &id,
            NewAgentMessage::new(AgentRole::User, "run the tests").with_source(MessageSource::Telegram),
        )
        .await
        .unwrap();

    assert!(!message.message_id.is_empty());
    assert_eq!(message.source, Some(MessageSource::Telegram));

    let messages = store.get_messages(&id).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0], message);
}

#[tokio::test]
async fn test_add_message_keeps_caller_fields() {
    let (_, store) = connected().await;
    let id = store.create_conversation(NewAgentConversation::new()).await;
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();

    store
        .add_message(
            &id,
            NewAgentMessage::new(AgentRole::Tool, "2 passed")
                .with_message_id("m-1")
                .with_timestamp(at)
                .with_tool("run_tests", Some(json!({"filter": "auth"})), Some("ok".to_string()))
                .with_metadata("model", json!("fast")),
        )
        .await
        .unwrap();

    let stored = &store.get_messages(&id).await[0];
    assert_eq!(stored.message_id, "m-1");
    assert_eq!(stored.timestamp, at);
    assert_eq!(stored.role, AgentRole::Tool);
    assert_eq!(stored.tool_name.as_deref(), Some("run_tests"));
    assert_eq!(stored.tool_args, Some(json!({"filter": "auth"})));
    assert_eq!(stored.tool_output.as_deref(), Some("ok"));
    assert_eq!(stored.metadata["model"], json!("fast"));
}

#[tokio::test]
async fn test_history_is_never_truncated() {
    let (_, store) = connected().await;
    let id = store.create_conversation(NewAgentConversation::new()).await;

    for i in 0..20 {
        store
            .add_message(&id, NewAgentMessage::new(AgentRole::Assistant, format!("step {}", i)))
            .await
            .unwrap();
    }

    let messages = store.get_messages(&id).await;
    assert_eq!(messages.len(), 20);
    assert_eq!(messages[19].content, "step 19");
}

#[tokio::test]
async fn test_add_message_to_unknown_conversation_fails() {
    let (_, store) = connected().await;
    let result = store
        .add_message("missing", NewAgentMessage::new(AgentRole::User, "hi"))
        .await;
    assert!(matches!(result, Err(Error::ConversationNotFound(id)) if id == "missing"));
}

#[tokio::test]
async fn test_update_unknown_conversation_fails() {
    let (_, store) = connected().await;
    assert!(matches!(
        store.update_status("missing", ConversationStatus::Failed).await,
        Err(Error::ConversationNotFound(_))
    ));
    assert!(store.update_title("missing", "t").await.is_err());
    assert!(store.merge_metadata("missing", Metadata::new()).await.is_err());
}

#[tokio::test]
async fn test_status_transitions_are_unrestricted() {
    let (_, store) = connected().await;
    let id = store.create_conversation(NewAgentConversation::new()).await;

    for status in [
        ConversationStatus::Archived,
        ConversationStatus::Active,
        ConversationStatus::Failed,
        ConversationStatus::Completed,
    ] {
        store.update_status(&id, status).await.unwrap();
        assert_eq!(store.get_conversation(&id).await.unwrap().status, status);
    }
}

#[tokio::test]
async fn test_title_and_metadata_updates() {
    let (_, store) = connected().await;
    let id = store
        .create_conversation(NewAgentConversation::new().with_metadata("branch", json!("main")))
        .await;

    store.update_title(&id, "Renamed").await.unwrap();
    let mut extra = Metadata::new();
    extra.insert("branch".to_string(), json!("feature"));
    extra.insert("requestId".to_string(), json!("r-9"));
    store.merge_metadata(&id, extra).await.unwrap();

    let conversation = store.get_conversation(&id).await.unwrap();
    assert_eq!(conversation.title.as_deref(), Some("Renamed"));
    assert_eq!(conversation.metadata["branch"], json!("feature"));
    assert_eq!(conversation.metadata["requestId"], json!("r-9"));
}

#[tokio::test]
async fn test_list_uses_index_sorted_by_access() {
    let (_, store) = connected().await;
    let first = store.create_conversation(NewAgentConversation::new()).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = store.create_conversation(NewAgentConversation::new()).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    store
        .add_message(&first, NewAgentMessage::new(AgentRole::User, "bump"))
        .await
        .unwrap();

    let listed: Vec<String> = store
        .list_conversations()
        .await
        .into_iter()
        .map(|c| c.conversation_id)
        .collect();
    assert_eq!(listed, vec![first, second]);
}

#[tokio::test]
async fn test_list_prunes_expired_members() {
    let (backend, store) = connected().await;
    let kept = store.create_conversation(NewAgentConversation::new()).await;
    let gone = store.create_conversation(NewAgentConversation::new()).await;

    backend
        .del(&format!("test:agent_conversation:{}", gone))
        .await
        .unwrap();

    let listed = store.list_conversations().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].conversation_id, kept);
    assert_eq!(
        backend.smembers("test:agent_conversations").await.unwrap(),
        vec![kept]
    );
}

#[tokio::test]
async fn test_list_by_agent() {
    let (_, store) = connected().await;
    store
        .create_conversation(NewAgentConversation::new().with_agent_id("a"))
        .await;
    store
        .create_conversation(NewAgentConversation::new().with_agent_id("b"))
        .await;
    store.create_conversation(NewAgentConversation::new()).await;

    let owned = store.list_by_agent("a").await;
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].agent_id.as_deref(), Some("a"));
}

#[tokio::test]
async fn test_index_ttl_refreshed_on_membership_change() {
    let (backend, store) = connected().await;
    store.create_conversation(NewAgentConversation::new()).await;

    let ttl = backend.ttl("test:agent_conversations").await.unwrap();
    assert!(ttl > Duration::from_secs(3500));
}

#[tokio::test(start_paused = true)]
async fn test_agent_conversation_expires_without_access() {
    let (_, store) = connected().await;
    let id = store.create_conversation(NewAgentConversation::new()).await;

    tokio::time::advance(Duration::from_secs(30 * 60)).await;
    assert!(store.get_conversation(&id).await.is_some());

    tokio::time::advance(Duration::from_secs(61 * 60)).await;
    assert!(store.get_conversation(&id).await.is_none());
    assert!(store.list_conversations().await.is_empty());
}

#[tokio::test]
async fn test_unreadable_record_is_not_found() {
    let (backend, store) = connected().await;
    backend
        .insert_raw("test:agent_conversation:bad", "[]")
        .await;

    assert!(store.get_conversation("bad").await.is_none());
    assert!(matches!(
        store
            .add_message("bad", NewAgentMessage::new(AgentRole::User, "x"))
            .await,
        Err(Error::ConversationNotFound(_))
    ));
}

#[tokio::test]
async fn test_degraded_mode() {
    let store = degraded();
    assert!(!store.is_available());

    let id = store
        .create_conversation(NewAgentConversation::new().with_id("offline"))
        .await;
    assert_eq!(id, "offline");

    let message = store
        .add_message("offline", NewAgentMessage::new(AgentRole::User, "hi"))
        .await
        .unwrap();
    assert!(!message.message_id.is_empty());

    store
        .update_status("offline", ConversationStatus::Completed)
        .await
        .unwrap();
    store.update_title("offline", "t").await.unwrap();

    assert!(store.get_conversation("offline").await.is_none());
    assert!(store.get_messages("offline").await.is_empty());
    assert!(store.list_conversations().await.is_empty());
}

#[tokio::test]
async fn test_outage_degrades_reads() {
    let (backend, store) = connected().await;
    let id = store.create_conversation(NewAgentConversation::new()).await;

    backend.set_unreachable(true);
    assert!(store.get_conversation(&id).await.is_none());
    assert!(!store.is_available());
    assert!(store
        .add_message(&id, NewAgentMessage::new(AgentRole::User, "x"))
        .await
        .is_ok());
}

#[test]
fn test_wire_format_is_camel_case() {
    let message = NewAgentMessage::new(AgentRole::Assistant, "done")
        .with_message_id("m")
        .with_tool("grep", None, Some("3 matches".to_string()))
        .into_message();
    let value = serde_json::to_value(&message).unwrap();

    assert_eq!(value["messageId"], json!("m"));
    assert_eq!(value["role"], json!("assistant"));
    assert_eq!(value["toolName"], json!("grep"));
    assert_eq!(value["toolOutput"], json!("3 matches"));
    assert!(value.get("toolArgs").is_none());
    assert!(value.get("source").is_none());
}

#[test]
fn test_status_parsing() {
    assert_eq!(
        "Archived".parse::<ConversationStatus>().unwrap(),
        ConversationStatus::Archived
    );
    assert!("closed".parse::<ConversationStatus>().is_err());
    assert_eq!("tool".parse::<AgentRole>().unwrap(), AgentRole::Tool);
    assert_eq!("slack".parse::<MessageSource>().unwrap(), MessageSource::Slack);
}
