//! Reconciler behavior over a fake backend: optimistic sends, rollback,
//! realtime reconciliation, and ordering.

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use uuid::Uuid;

use pairchat_core::{ChatEvent, Message, MessageId, Reconciler, UserId};
use support::FakeBackend;

fn user() -> UserId {
    UserId(Uuid::new_v4())
}

fn confirmed(id: i64, from: UserId, to: UserId, content: &str, secs: i64) -> Message {
    Message {
        id: MessageId(id),
        content: content.to_string(),
        sender_id: from,
        receiver_id: to,
        created_at: DateTime::from_timestamp(secs, 0).unwrap(),
    }
}

fn record(id: i64, from: UserId, to: UserId, content: &str, created_at: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "content": content,
        "sender_id": from,
        "receiver_id": to,
        "created_at": created_at,
    })
}

fn setup() -> (Arc<FakeBackend>, Arc<Reconciler>, UserId, UserId) {
    let backend = Arc::new(FakeBackend::new());
    let me = user();
    let them = user();
    let reconciler = Arc::new(Reconciler::new(backend.clone(), "token", me, them));
    (backend, reconciler, me, them)
}

/// Wait for the next event matching `pred`, failing the test after a second.
async fn wait_for<F>(events: &mut tokio::sync::broadcast::Receiver<ChatEvent>, pred: F) -> ChatEvent
where
    F: Fn(&ChatEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn load_history_output_is_sorted_ascending() {
    let (backend, reconciler, me, them) = setup();
    // The fake returns rows in stored order; sorting is the client's job.
    backend.set_history(vec![
        confirmed(3, them, me, "third", 3000),
        confirmed(1, me, them, "first", 1000),
        confirmed(2, them, me, "second", 2000),
    ]);

    let count = reconciler.load_history().await.unwrap();
    assert_eq!(count, 3);

    let messages = reconciler.messages();
    let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn load_history_excludes_other_conversations() {
    let (backend, reconciler, me, them) = setup();
    let stranger = user();
    backend.set_history(vec![
        confirmed(1, me, them, "ours", 1000),
        confirmed(2, me, stranger, "theirs", 2000),
    ]);

    reconciler.load_history().await.unwrap();
    assert_eq!(reconciler.messages().len(), 1);
    assert_eq!(reconciler.messages()[0].content, "ours");
}

#[tokio::test]
async fn load_history_failure_is_recoverable() {
    let (backend, reconciler, me, them) = setup();
    backend.set_history(vec![confirmed(1, me, them, "hi", 1000)]);
    backend.set_fail_fetch(true);

    assert!(reconciler.load_history().await.is_err());

    backend.set_fail_fetch(false);
    assert_eq!(reconciler.load_history().await.unwrap(), 1);
}

#[tokio::test]
async fn send_shows_exactly_one_pending_entry() {
    let (backend, reconciler, _, _) = setup();
    let mut events = reconciler.subscribe_events();

    reconciler.send_message("hello there");

    let messages = reconciler.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_pending());
    assert_eq!(messages[0].content, "hello there");
    assert_eq!(reconciler.pending_count(), 1);

    let event = wait_for(&mut events, |e| {
        matches!(e, ChatEvent::MessagePending { .. })
    })
    .await;
    assert_eq!(event.message().unwrap().content, "hello there");

    // The submission itself reaches the backend
    tokio::time::timeout(Duration::from_secs(1), async {
        while backend.inserted().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("submission never reached the backend");
    assert_eq!(backend.inserted()[0].content, "hello there");
}

#[tokio::test]
async fn empty_send_is_a_no_op() {
    let (backend, reconciler, _, _) = setup();
    reconciler.send_message("");
    assert!(reconciler.messages().is_empty());
    assert!(backend.inserted().is_empty());
}

#[tokio::test]
async fn failed_send_removes_exactly_its_entry_and_restores_content() {
    let (backend, reconciler, me, them) = setup();
    backend.set_history(vec![confirmed(1, them, me, "existing", 1000)]);
    reconciler.load_history().await.unwrap();
    backend.set_fail_insert(true);

    let mut events = reconciler.subscribe_events();
    reconciler.send_message("hi");
    assert_eq!(reconciler.messages().len(), 2);

    let event = wait_for(&mut events, |e| matches!(e, ChatEvent::SendFailed { .. })).await;
    match event {
        ChatEvent::SendFailed { content, .. } => assert_eq!(content, "hi"),
        _ => unreachable!(),
    }

    // Sequence returned to its prior state
    let messages = reconciler.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "existing");
    assert_eq!(reconciler.pending_count(), 0);
}

#[tokio::test]
async fn failed_send_leaves_other_pending_entries_alone() {
    let (backend, reconciler, _, _) = setup();

    backend.fail_insert_for("fails");
    let mut events = reconciler.subscribe_events();
    reconciler.send_message("survives");
    reconciler.send_message("fails");

    wait_for(&mut events, |e| matches!(e, ChatEvent::SendFailed { .. })).await;

    let messages = reconciler.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "survives");
}

#[tokio::test]
async fn remote_insert_with_non_matching_pair_is_ignored() {
    let (backend, reconciler, me, them) = setup();
    backend.set_history(vec![confirmed(1, me, them, "ours", 1000)]);
    reconciler.load_history().await.unwrap();

    let stranger = user();
    reconciler.on_remote_insert(record(2, stranger, me, "psst", "2025-01-01T10:00:00Z"));
    reconciler.on_remote_insert(record(3, them, stranger, "psst", "2025-01-01T10:00:00Z"));

    let messages = reconciler.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "ours");
}

#[tokio::test]
async fn matching_insert_clears_all_pending_and_appends_once() {
    let (_, reconciler, me, them) = setup();

    reconciler.send_message("one");
    reconciler.send_message("two");
    assert_eq!(reconciler.pending_count(), 2);

    let mut events = reconciler.subscribe_events();
    reconciler.on_remote_insert(record(10, me, them, "one", "2025-01-01T10:00:00Z"));

    wait_for(&mut events, |e| {
        matches!(e, ChatEvent::MessageConfirmed { .. })
    })
    .await;

    // Every placeholder is cleared on any confirmed arrival, not just the
    // matching one; "two" reappears when its own confirmation lands.
    let messages = reconciler.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, MessageId(10));
    assert_eq!(reconciler.pending_count(), 0);
}

#[tokio::test]
async fn duplicate_insert_is_a_no_op() {
    let (_, reconciler, me, them) = setup();

    reconciler.on_remote_insert(record(10, them, me, "hi", "2025-01-01T10:00:00Z"));
    reconciler.on_remote_insert(record(10, them, me, "hi", "2025-01-01T10:00:00Z"));

    assert_eq!(reconciler.messages().len(), 1);
}

#[tokio::test]
async fn undecodable_insert_is_dropped() {
    let (_, reconciler, me, them) = setup();
    reconciler.on_remote_insert(record(1, me, them, "ok", "2025-01-01T10:00:00Z"));

    reconciler.on_remote_insert(serde_json::json!({ "garbage": true }));
    reconciler.on_remote_insert(record(2, me, them, "bad", "not-a-date"));

    assert_eq!(reconciler.messages().len(), 1);
}

#[tokio::test]
async fn offline_send_scenario_restores_prior_state() {
    // Local user sends "hi" while offline: pending appears, submission
    // fails, sequence returns to the prior state and the content comes
    // back for the input buffer.
    let (backend, reconciler, _, _) = setup();
    backend.set_fail_insert(true);

    let before = reconciler.messages();
    let mut events = reconciler.subscribe_events();
    reconciler.send_message("hi");

    let event = wait_for(&mut events, |e| matches!(e, ChatEvent::SendFailed { .. })).await;
    let restored = match event {
        ChatEvent::SendFailed { content, .. } => content,
        _ => unreachable!(),
    };

    assert_eq!(restored, "hi");
    assert_eq!(reconciler.messages(), before);
}

#[tokio::test]
async fn fractional_and_whole_second_timestamps_order_correctly() {
    let (backend, reconciler, me, them) = setup();

    let whole = pairchat_core::wire::decode_message(record(
        1,
        me,
        them,
        "whole",
        "2025-01-01T10:00:00Z",
    ))
    .unwrap();
    let fractional = pairchat_core::wire::decode_message(record(
        2,
        them,
        me,
        "fractional",
        "2025-01-01T10:00:00.500000Z",
    ))
    .unwrap();

    // Stored fractional-first; the load must order it second.
    backend.set_history(vec![fractional, whole]);
    reconciler.load_history().await.unwrap();

    let contents: Vec<_> = reconciler
        .messages()
        .iter()
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(contents, vec!["whole", "fractional"]);
}

#[tokio::test]
async fn confirmed_messages_survive_reload() {
    let (backend, reconciler, me, them) = setup();
    backend.set_history(vec![confirmed(1, me, them, "kept", 1000)]);
    reconciler.load_history().await.unwrap();

    reconciler.send_message("pending stays until reload");
    assert_eq!(reconciler.messages().len(), 2);

    // A reload replaces the sequence wholesale, dropping the pending entry.
    reconciler.load_history().await.unwrap();
    assert_eq!(reconciler.messages().len(), 1);
    assert_eq!(reconciler.messages()[0].content, "kept");
}
