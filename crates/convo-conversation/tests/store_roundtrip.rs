use std::sync::Arc;

use convo_conversation::{ConversationStore, LocalFileBackend, StorageBackend};
use convo_core::{HistoryEntry, Interaction, Role, Transcript};
use tempfile::TempDir;

fn local_store() -> (TempDir, Arc<LocalFileBackend>, ConversationStore) {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(LocalFileBackend::new(temp_dir.path().join("history")).unwrap());
    let store = ConversationStore::new(backend.clone());
    (temp_dir, backend, store)
}

#[tokio::test]
async fn first_append_creates_user_then_assistant() {
    let (_temp, backend, store) = local_store();
    let id = ConversationStore::new_conversation_id();

    assert!(!store.exists(&id).await.unwrap());
    let transcript = store
        .append_interaction(&id, Interaction::new("What is PTO?", "10 days."))
        .await
        .unwrap();

    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript.messages[0].role, Role::User);
    assert_eq!(transcript.messages[0].content, "What is PTO?");
    assert_eq!(transcript.messages[1].role, Role::Assistant);
    assert_eq!(transcript.messages[1].content, "10 days.");
    assert!(transcript.updated_at.is_some());
    assert!(backend.path_for(&id).is_file());
    assert!(store.exists(&id).await.unwrap());
}

#[tokio::test]
async fn stored_transcript_round_trips_exactly() {
    let (_temp, _backend, store) = local_store();
    let id = "round-trip";

    store
        .append_interaction(id, Interaction::new("q1", "a1"))
        .await
        .unwrap();
    let written = store
        .append_interaction(id, Interaction::new("q2 ünïcode ✓", "a2\nmultiline"))
        .await
        .unwrap();

    let loaded: Transcript = store.load(id).await.unwrap();
    assert_eq!(loaded, written);
    assert_eq!(loaded.created_at, written.created_at);
}

#[tokio::test]
async fn created_at_is_kept_across_appends() {
    let (_temp, _backend, store) = local_store();
    let first = store
        .append_interaction("c", Interaction::new("q1", "a1"))
        .await
        .unwrap();
    let second = store
        .append_interaction("c", Interaction::new("q2", "a2"))
        .await
        .unwrap();

    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(second.len(), 4);
}

#[tokio::test]
async fn resent_history_is_not_duplicated() {
    let (_temp, _backend, store) = local_store();
    let id = "merge";
    store
        .append_interaction(id, Interaction::new("hi", "hello"))
        .await
        .unwrap();

    let history = vec![
        HistoryEntry::new("user", "hi"),
        HistoryEntry::new("assistant", "hello"),
    ];
    let transcript = store
        .append_interaction(id, Interaction::new("next", "answer").with_history(history))
        .await
        .unwrap();

    let contents: Vec<&str> = transcript
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["hi", "hello", "next", "answer"]);
}

#[tokio::test]
async fn imported_history_precedes_new_pair() {
    let (_temp, _backend, store) = local_store();
    let history = vec![
        HistoryEntry::new("User", "earlier question"),
        HistoryEntry::new("ASSISTANT", "earlier answer"),
    ];

    let transcript = store
        .append_interaction("backfill", Interaction::new("q", "a").with_history(history))
        .await
        .unwrap();

    let roles: Vec<&Role> = transcript.messages.iter().map(|m| &m.role).collect();
    assert_eq!(
        roles,
        vec![&Role::User, &Role::Assistant, &Role::User, &Role::Assistant]
    );
    assert_eq!(transcript.messages[0].content, "earlier question");
}

#[tokio::test]
async fn missing_conversation_loads_empty_and_stays_unsaved() {
    let (_temp, backend, store) = local_store();

    let transcript = store.load("never-seen-id").await.unwrap();
    assert!(transcript.messages.is_empty());
    assert_eq!(store.render_as_prompt("never-seen-id").await.unwrap(), "");
    assert!(store.history("never-seen-id").await.unwrap().is_empty());
    assert!(!backend.path_for("never-seen-id").exists());
}

#[tokio::test]
async fn renders_prompt_and_hides_other_roles() {
    let (_temp, _backend, store) = local_store();
    let id = "render";
    let history = vec![HistoryEntry::new("system", "You are an HR assistant.")];

    store
        .append_interaction(id, Interaction::new("What is PTO?", "10 days.").with_history(history))
        .await
        .unwrap();

    assert_eq!(
        store.render_as_prompt(id).await.unwrap(),
        "Human: What is PTO?\nAssistant: 10 days."
    );
    let history = store.history(id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].role, Role::Other("system".into()));
}

#[tokio::test]
async fn idempotency_key_prevents_duplicate_pairs() {
    let (_temp, _backend, store) = local_store();
    let id = "retry";
    let interaction = Interaction::new("q", "a").with_idempotency_key("req-1");

    store.append_interaction(id, interaction.clone()).await.unwrap();
    let after_retry = store.append_interaction(id, interaction).await.unwrap();
    assert_eq!(after_retry.len(), 2);
    assert_eq!(after_retry.messages[0].interaction_id.as_deref(), Some("req-1"));

    // Without a key the pair is appended again.
    let unkeyed = store
        .append_interaction(id, Interaction::new("q", "a"))
        .await
        .unwrap();
    assert_eq!(unkeyed.len(), 4);
}

#[tokio::test]
async fn concurrent_appends_to_one_conversation_are_all_kept() {
    let (_temp, _backend, store) = local_store();
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .append_interaction("busy", Interaction::new(format!("q{i}"), format!("a{i}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let history = store.history("busy").await.unwrap();
    assert_eq!(history.len(), 16);
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
        assert_eq!(pair[0].content[1..], pair[1].content[1..]);
    }
}

#[tokio::test]
async fn reads_documents_written_with_naive_timestamps() {
    let (_temp, backend, store) = local_store();
    let legacy = r#"{
  "conversation_id": "legacy",
  "created_at": "2024-05-01T10:00:00.000001",
  "messages": [
    { "role": "user", "content": "hi", "timestamp": "2024-05-01T10:00:01.5" },
    { "role": "assistant", "content": "hello", "timestamp": "2024-05-01T10:00:02" }
  ]
}"#;
    backend.write("legacy", legacy.as_bytes()).await.unwrap();

    let transcript = store
        .append_interaction(
            "legacy",
            Interaction::new("more", "sure").with_history(vec![
                HistoryEntry::new("user", "hi"),
                HistoryEntry::new("assistant", "hello"),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(transcript.len(), 4);
    assert_eq!(
        transcript.created_at.to_rfc3339(),
        "2024-05-01T10:00:00.000001+00:00"
    );
}
