// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the poll loop against mock page and relay adapters.

use std::time::Duration;

use domrelay_agent::{LoopState, PollLoop};
use domrelay_core::types::{RosterEntry, RosterKind, WorkspaceRoster};
use domrelay_core::{Context, DomRelayError, OrderingKey, OutboundEvent, SendScope};
use domrelay_test_utils::{TestHarness, record, unkeyed};
use tokio_util::sync::CancellationToken;

fn poll_loop(harness: &TestHarness) -> PollLoop {
    PollLoop::new(harness.shared_page(), harness.relay_handle(), &harness.config)
        .expect("harness config is valid")
}

fn contents(events: &[domrelay_core::types::NewMessageEvent]) -> Vec<&str> {
    events.iter().map(|e| e.content.as_str()).collect()
}

#[tokio::test]
async fn first_contact_starts_after_own_last_message() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![
            record("alice", "before", 1),
            record("Pearl", "my reply", 2),
            record("bob", "after", 3),
        ])
        .await;

    let mut poll = poll_loop(&harness);
    let report = poll.tick().await.unwrap();

    assert!(report.reseeded);
    assert!(!report.context_changed);
    assert_eq!(report.relayed, 1);
    assert_eq!(contents(&harness.relay.new_messages().await), vec!["after"]);
    assert_eq!(poll.state(), LoopState::Steady);
    assert_eq!(
        poll.tracker().current(&Context::new("C1", false)),
        Some(OrderingKey(3))
    );
}

#[tokio::test]
async fn steady_ticks_relay_only_new_messages() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![record("pearl", "hello", 1)])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();
    assert!(harness.relay.new_messages().await.is_empty());

    harness.page.push_record(record("bob", "hi there", 2)).await;
    harness.page.push_record(record("carol", "me too", 3)).await;
    let report = poll.tick().await.unwrap();
    assert_eq!(report.relayed, 2);
    assert!(!report.reseeded);

    // Same snapshot again: nothing new.
    assert_eq!(poll.tick().await.unwrap().relayed, 0);
    assert_eq!(
        contents(&harness.relay.new_messages().await),
        vec!["hi there", "me too"]
    );
}

#[tokio::test]
async fn first_contact_without_own_message_uses_bounded_fallback() {
    let harness = TestHarness::builder().with_fallback_count(2).build();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![
            record("a", "one", 1),
            record("b", "two", 2),
            record("c", "three", 3),
            record("d", "four", 4),
            record("e", "five", 5),
        ])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();
    poll.tick().await.unwrap();

    assert_eq!(
        contents(&harness.relay.new_messages().await),
        vec!["four", "five"]
    );
}

#[tokio::test]
async fn empty_first_contact_does_not_flood_later() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![record("a", "   ", 1), record("b", "", 2)])
        .await;

    let mut poll = poll_loop(&harness);
    assert_eq!(poll.tick().await.unwrap().relayed, 0);
    assert_eq!(
        poll.tracker().current(&Context::new("C1", false)),
        Some(OrderingKey(2))
    );

    harness.page.push_record(record("c", "finally", 3)).await;
    assert_eq!(poll.tick().await.unwrap().relayed, 1);
}

#[tokio::test]
async fn context_change_is_reported_and_reseeds() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![record("pearl", "mine", 10)])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    harness.page.show("D2", false).await;
    harness
        .page
        .set_records(vec![
            record("bob", "older dm", 1),
            record("pearl", "my dm", 2),
            record("bob", "new dm", 3),
        ])
        .await;
    let report = poll.tick().await.unwrap();

    assert!(report.context_changed);
    assert!(report.reseeded);
    let changes = harness.relay.context_changes().await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].new_context_id, "D2");
    assert!(!changes[0].thread_open);
    // Keys in D2 are far below C1's cursor; they must not be compared with it.
    assert_eq!(contents(&harness.relay.new_messages().await), vec!["new dm"]);

    let events = harness.relay.emitted().await;
    assert!(matches!(events[0], OutboundEvent::ContextChanged(_)));
}

#[tokio::test]
async fn thread_reseed_stops_at_own_last_reply() {
    let harness = TestHarness::new();
    harness.page.show("C1", true).await;
    harness
        .page
        .set_records(vec![
            record("alice", "question", 1),
            record("pearl", "answer", 2),
            record("bob", "follow-up", 3),
        ])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    let messages = harness.relay.new_messages().await;
    assert_eq!(contents(&messages), vec!["question"]);
    assert_eq!(messages[0].context_id, "C1#thread");
}

fn roster(name: &str) -> WorkspaceRoster {
    WorkspaceRoster {
        name: name.into(),
        ..WorkspaceRoster::default()
    }
}

#[tokio::test]
async fn context_switch_survives_a_failed_workspace_update() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness.page.set_workspace("W1", roster("W1")).await;
    harness
        .page
        .set_records(vec![record("pearl", "hello", 1)])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    // Switching workspace moves to another channel in the same tick.
    harness.page.show("C2", false).await;
    harness.page.set_workspace("W2", roster("W2")).await;
    harness
        .page
        .set_records(vec![
            record("alice", "old, already answered", 5),
            record("pearl", "my answer", 6),
            record("bob", "new", 7),
        ])
        .await;
    harness.relay.fail_next_emits(1).await;

    let err = poll.tick().await.unwrap_err();
    assert!(matches!(err, DomRelayError::Relay { .. }));
    assert_eq!(poll.state(), LoopState::Init);
    assert!(harness.relay.context_changes().await.is_empty());

    let report = poll.tick().await.unwrap();
    assert!(report.workspace_updated);
    assert!(report.context_changed);
    assert!(report.reseeded);
    assert_eq!(contents(&harness.relay.new_messages().await), vec!["new"]);

    let changes = harness.relay.context_changes().await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].new_context_id, "C2");
}

#[tokio::test]
async fn failed_context_change_event_is_resent() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    harness.page.show("D2", false).await;
    harness.relay.fail_next_emits(1).await;
    assert!(poll.tick().await.is_err());

    let report = poll.tick().await.unwrap();
    assert!(report.context_changed);
    assert!(!poll.tick().await.unwrap().context_changed);
    let changes = harness.relay.context_changes().await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].new_context_id, "D2");
}

#[tokio::test]
async fn platform_self_label_is_never_relayed() {
    let harness = TestHarness::builder().with_self_labels(&["You"]).build();
    harness.page.show("thread-9", false).await;
    harness
        .page
        .set_records(vec![unkeyed("kim", "hey"), unkeyed("You", "mine")])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    harness.page.push_record(unkeyed("You", "again")).await;
    harness.page.push_record(unkeyed("Youssef", "hello")).await;
    poll.tick().await.unwrap();

    assert_eq!(
        contents(&harness.relay.new_messages().await),
        vec!["hey", "hello"]
    );
}

#[tokio::test]
async fn opening_a_thread_is_a_context_change() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    harness.page.show("C1", true).await;
    let report = poll.tick().await.unwrap();
    assert!(report.context_changed);
    assert_eq!(
        harness.relay.context_changes().await[0].new_context_id,
        "C1#thread"
    );
}

#[tokio::test]
async fn classifier_failure_keeps_context_and_cursor() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![record("pearl", "mine", 5)])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    harness.page.fail_next_classify(1).await;
    let report = poll.tick().await.unwrap();
    assert_eq!(report, Default::default());
    assert_eq!(poll.current_context(), Some(&Context::new("C1", false)));

    harness.page.push_record(record("bob", "new", 6)).await;
    let report = poll.tick().await.unwrap();
    assert!(!report.context_changed);
    assert!(!report.reseeded);
    assert_eq!(report.relayed, 1);
}

#[tokio::test]
async fn no_context_stays_in_init_without_scraping() {
    let harness = TestHarness::new();
    harness.page.show_nothing().await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();
    poll.tick().await.unwrap();

    assert_eq!(poll.state(), LoopState::Init);
    assert_eq!(harness.page.snapshot_count().await, 0);
    assert!(harness.relay.emitted().await.is_empty());
}

#[tokio::test]
async fn failed_reseed_is_retried_next_tick() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![record("pearl", "mine", 1), record("bob", "reply", 2)])
        .await;
    harness.page.fail_next_snapshot(1).await;

    let mut poll = poll_loop(&harness);
    let err = poll.tick().await.unwrap_err();
    assert!(matches!(err, DomRelayError::Scrape { .. }));
    assert_eq!(poll.state(), LoopState::Init);

    let report = poll.tick().await.unwrap();
    assert!(report.reseeded);
    assert_eq!(report.relayed, 1);
}

#[tokio::test]
async fn relay_failure_keeps_partial_progress() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![record("pearl", "mine", 1)])
        .await;
    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    harness.page.push_record(record("bob", "first", 2)).await;
    harness.page.push_record(record("bob", "second", 3)).await;
    harness.page.push_record(record("bob", "third", 4)).await;

    harness.relay.fail_emit_after(1).await;
    let err = poll.tick().await.unwrap_err();
    assert!(matches!(err, DomRelayError::Relay { .. }));
    assert_eq!(contents(&harness.relay.new_messages().await), vec!["first"]);
    assert_eq!(
        poll.tracker().current(&Context::new("C1", false)),
        Some(OrderingKey(2))
    );

    poll.tick().await.unwrap();
    assert_eq!(
        contents(&harness.relay.new_messages().await),
        vec!["first", "second", "third"]
    );
}

#[tokio::test]
async fn outbound_payload_carries_identity_and_ids() {
    let harness = TestHarness::builder()
        .with_hashing("pepper")
        .with_user_id("U42")
        .build();
    harness.page.show("C1", false).await;
    harness
        .page
        .set_records(vec![record("pearl", "mine", 1), record("Alice Smith", "hey", 2)])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();

    let messages = harness.relay.new_messages().await;
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(
        message.sender_identity,
        "7677ff754953d838a85bca8d1da6c795654301d3f272d083b30077539378b441"
    );
    assert_eq!(message.ordering_key, Some(OrderingKey(2)));
    assert_eq!(message.message_id, "2");
    assert_eq!(message.user_id, "U42");
    assert_eq!(message.context_id, "C1");
}

#[tokio::test]
async fn unkeyed_platform_relays_each_message_once() {
    let harness = TestHarness::builder().with_fallback_count(2).build();
    harness.page.show("thread-9", false).await;
    harness
        .page
        .set_records(vec![
            unkeyed("alice", "a"),
            unkeyed("bob", "b"),
            unkeyed("alice", "c"),
        ])
        .await;

    let mut poll = poll_loop(&harness);
    poll.tick().await.unwrap();
    assert_eq!(contents(&harness.relay.new_messages().await), vec!["b", "c"]);

    assert_eq!(poll.tick().await.unwrap().relayed, 0);

    harness.page.push_record(unkeyed("bob", "d")).await;
    poll.tick().await.unwrap();
    let messages = harness.relay.new_messages().await;
    assert_eq!(contents(&messages), vec!["b", "c", "d"]);
    assert!(messages.iter().all(|m| m.ordering_key.is_none()));
}

#[tokio::test]
async fn workspace_update_is_emitted_once_per_workspace() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    let roster = WorkspaceRoster {
        name: "Acme".into(),
        channels: vec![RosterEntry {
            id: "C1".into(),
            name: "general".into(),
            kind: RosterKind::Channel,
            participants: vec![],
        }],
        ..WorkspaceRoster::default()
    };
    harness.page.set_workspace("Acme", roster.clone()).await;

    let mut poll = poll_loop(&harness);
    assert!(poll.tick().await.unwrap().workspace_updated);
    assert!(!poll.tick().await.unwrap().workspace_updated);

    let updates: Vec<_> = harness
        .relay
        .emitted()
        .await
        .into_iter()
        .filter(|e| matches!(e, OutboundEvent::WorkspaceUpdate(_)))
        .collect();
    assert_eq!(updates, vec![OutboundEvent::WorkspaceUpdate(roster)]);
}

#[tokio::test]
async fn missing_markers_are_rejected() {
    let harness = TestHarness::builder()
        .with_markers(&[], Default::default())
        .build();
    let result = PollLoop::new(harness.shared_page(), harness.relay_handle(), &harness.config);
    assert!(matches!(result, Err(DomRelayError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn run_serves_commands_and_shuts_down() {
    let harness = TestHarness::new();
    harness.page.show("C1", false).await;
    harness.relay.inject_response("on my way", SendScope::Thread).await;
    harness.relay.inject_response("   ", SendScope::Current).await;

    let poll = poll_loop(&harness);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(poll.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(3)).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(
        harness.page.sent_texts().await,
        vec![("on my way".to_string(), SendScope::Thread)]
    );
    assert!(harness.page.snapshot_count().await >= 1);
    assert!(harness.page.is_shut_down().await);
    assert!(harness.relay.is_shut_down().await);
}
