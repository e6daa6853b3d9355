/// Core reconciliation tests
/// Integration tests for the conversation store, classifier and identity
/// promotion working together through the public API

// In integration tests, the package is available as an external crate
extern crate filewise_core;

use filewise_core::backend::RemoteConversation;
use filewise_core::classifier::{self, MSG_SEARCH_DEFAULT};
use filewise_core::identity;
use filewise_core::types::{Message, MessageData};
use filewise_core::ConversationStore;
use serde_json::json;

fn remote(id: u64, session_id: &str, title: &str) -> RemoteConversation {
    RemoteConversation {
        id: json!(id),
        session_id: Some(session_id.to_string()),
        title: title.to_string(),
        last_activity: Some("2026-02-01T10:00:00Z".to_string()),
        created_at: Some("2026-01-01T10:00:00Z".to_string()),
    }
}

#[test]
fn test_title_round_trip() {
    let mut store = ConversationStore::new();
    let (id, _) = store.create();
    store
        .append_message(
            &id,
            Message::user(identity::message_id(), "hello".to_string(), Vec::new()),
        )
        .unwrap();
    assert_eq!(store.get(&id).unwrap().title, "hello");
}

#[test]
fn test_full_first_turn_reconciliation() {
    // A full first turn against the store, driven by classified payloads:
    // optimistic create + append, identity promotion from the reply,
    // assistant append under the promoted id, then a lagging listing merge
    // followed by a caught-up one.
    let mut store = ConversationStore::new();
    let (provisional, _) = store.create();
    store
        .append_message(
            &provisional,
            Message::user(
                identity::message_id(),
                "Find all invoices".to_string(),
                Vec::new(),
            ),
        )
        .unwrap();

    let reply = json!({
        "sessionId": "session-abc",
        "conversation": { "id": 42 },
        "files": [{ "id": 1, "name": "inv.pdf" }],
        "avg_similarity": 0.8
    });

    let revealed = classifier::extract_identity(&reply).unwrap();
    store.promote(&provisional, &revealed.session_id, revealed.id.as_deref());
    assert_eq!(store.active_id(), Some("42"));

    let classified = classifier::classify(&reply);
    assert_eq!(classified.content, MSG_SEARCH_DEFAULT);
    store
        .append_message(
            "42",
            Message::assistant(identity::message_id(), classified.content, classified.data),
        )
        .unwrap();

    // Lagging listing: the new conversation is not indexed yet
    store.merge_remote_listing(vec![remote(9, "session-other", "Other")], Some("42"));
    assert_eq!(store.conversations()[0].id, "42");
    assert_eq!(store.conversations()[0].messages.len(), 2);

    // Caught-up listing: the backend now knows it, with a server title
    store.merge_remote_listing(
        vec![
            remote(42, "session-abc", "Invoices"),
            remote(9, "session-other", "Other"),
        ],
        Some("42"),
    );
    let conversation = store.get("42").unwrap();
    assert_eq!(conversation.title, "Invoices");
    assert_eq!(conversation.messages.len(), 2);
    match &conversation.messages[1].data {
        Some(MessageData::Search(search)) => {
            assert_eq!(search.count, 1);
            assert_eq!(search.files[0].name, "inv.pdf");
        }
        other => panic!("expected search data, got {:?}", other),
    }
}

#[test]
fn test_merge_idempotence_property() {
    let mut store = ConversationStore::new();
    let (id, _) = store.create();
    store
        .append_message(
            &id,
            Message::user(identity::message_id(), "hi".to_string(), Vec::new()),
        )
        .unwrap();

    let listing = vec![remote(1, "session-a", "A"), remote(2, "session-b", "B")];
    store.merge_remote_listing(listing.clone(), Some(&id));
    let once: Vec<(String, String, usize)> = store
        .conversations()
        .iter()
        .map(|c| (c.id.clone(), c.title.clone(), c.messages.len()))
        .collect();

    store.merge_remote_listing(listing, Some(&id));
    let twice: Vec<(String, String, usize)> = store
        .conversations()
        .iter()
        .map(|c| (c.id.clone(), c.title.clone(), c.messages.len()))
        .collect();

    assert_eq!(once, twice);
}

#[test]
fn test_preservation_only_for_known_conversations() {
    let mut store = ConversationStore::new();
    let (id, _) = store.create();

    // Known active id not in the listing: preserved
    store.merge_remote_listing(vec![remote(1, "session-a", "A")], Some(&id));
    assert!(store.get(&id).is_some());

    // Unknown preserve id: nothing invented
    let before = store.conversations().len();
    store.merge_remote_listing(vec![remote(1, "session-a", "A")], Some("never-existed"));
    assert!(store.conversations().len() <= before);
    assert!(store.get("never-existed").is_none());
}

#[test]
fn test_promotion_idempotence_property() {
    let mut store = ConversationStore::new();
    let (provisional, _) = store.create();

    store.promote(&provisional, "session-abc", Some("42"));
    let once: Vec<(String, Option<String>)> = store
        .conversations()
        .iter()
        .map(|c| (c.id.clone(), c.session_id.clone()))
        .collect();
    let active_once = store.active_id().map(str::to_string);

    store.promote(&provisional, "session-abc", Some("42"));
    let twice: Vec<(String, Option<String>)> = store
        .conversations()
        .iter()
        .map(|c| (c.id.clone(), c.session_id.clone()))
        .collect();

    assert_eq!(once, twice);
    assert_eq!(store.active_id().map(str::to_string), active_once);
}

#[test]
fn test_classifier_precedence_contract() {
    // Overlapping payload: both a non-empty files list and a document
    // field. The order-of-checks contract says search wins.
    let reply = json!({
        "files": [{ "id": 1, "name": "a.pdf" }],
        "document": { "name": "a.pdf", "content": "..." },
        "action": "document_generation"
    });
    match classifier::classify(&reply).data {
        Some(MessageData::Search(_)) => {}
        other => panic!("expected search to win precedence, got {:?}", other),
    }
}

#[test]
fn test_session_key_bridges_listing_after_external_promotion() {
    // The send-turn reply promoted the session id but the conversation
    // still carries its provisional id (reply had no conversation.id).
    // The listing's session_id match must carry the messages over.
    let mut store = ConversationStore::new();
    let (provisional, _) = store.create();
    store
        .append_message(
            &provisional,
            Message::user(identity::message_id(), "hello".to_string(), Vec::new()),
        )
        .unwrap();
    store.promote(&provisional, "session-abc", None);
    assert_eq!(store.active_id(), Some(provisional.as_str()));

    store.merge_remote_listing(vec![remote(42, "session-abc", "hello")], Some(&provisional));

    // The listing is authoritative for the id; messages survived the swap
    // via the session key. The provisional record is gone.
    let conversation = store.get("42").unwrap();
    assert_eq!(conversation.messages.len(), 1);
    assert!(store.get(&provisional).is_none());
}
