use agent_desk::config::ThreadConfig;
use agent_desk::optimistic::OptimisticTracker;
use agent_desk::types::{
    Message, MessageKind, MessageStatus, OptimisticMessage, OptimisticStatus, SenderKind,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

fn tracker() -> OptimisticTracker {
    OptimisticTracker::new(&ThreadConfig::default())
}

fn draft(id: &str, content: &str, created_at: DateTime<Utc>) -> OptimisticMessage {
    OptimisticMessage {
        id: id.to_string(),
        chat_id: "c1".to_string(),
        content: Some(content.to_string()),
        attachments: vec![],
        reply_to_message_id: None,
        status: OptimisticStatus::Pending,
        error_message: None,
        created_at,
    }
}

fn confirmed(id: &str, temp_id: &str, content: &str, created_at: DateTime<Utc>) -> Message {
    Message {
        id: id.to_string(),
        chat_id: "c1".to_string(),
        content: Some(content.to_string()),
        kind: MessageKind::Text,
        sender_kind: SenderKind::Agent,
        sender_agent_id: Some("a1".to_string()),
        sender_customer_id: None,
        status: MessageStatus::Sent,
        created_at,
        attachments: vec![],
        metadata: Some(json!({"tempId": temp_id})),
        response_message_id: None,
        response_to: None,
        sender_agent: None,
    }
}

#[test]
fn test_temp_id_correlation_removes_entry() {
    let now = Utc::now();
    let mut tracker = tracker();
    assert!(tracker.add(draft("abc", "hello", now), &[], now));

    let msg = confirmed("m1", "abc", "hello", now);
    let retired = tracker.retire_for_message(&msg, now);
    assert!(retired.is_some());
    assert!(tracker.is_empty());
}

#[test]
fn test_truncated_temp_id_still_correlates() {
    let now = Utc::now();
    let mut tracker = tracker();
    tracker.add(draft("temp-0123456789abcdef", "hello", now), &[], now);

    let msg = confirmed("m1", "temp-0123456789", "different text", now);
    assert!(tracker.retire_for_message(&msg, now).is_some());
}

#[test]
fn test_correlation_miss_is_not_an_error() {
    let now = Utc::now();
    let mut tracker = tracker();
    tracker.add(draft("t1", "hello", now), &[], now);

    let msg = confirmed("m1", "unrelated", "other", now - Duration::seconds(60));
    assert!(tracker.retire_for_message(&msg, now).is_none());
    assert_eq!(tracker.entries().len(), 1);
}

#[test]
fn test_retry_reuses_the_same_id() {
    let now = Utc::now();
    let mut tracker = tracker();
    tracker.add(draft("t2", "hello", now), &[], now);
    tracker.mark_status("t2", OptimisticStatus::Failed, Some("boom".to_string()));

    // retry flips the entry back to pending under the same id
    assert!(tracker.mark_status("t2", OptimisticStatus::Pending, None));
    let entry = tracker.get("t2").unwrap();
    assert_eq!(entry.status, OptimisticStatus::Pending);
    assert!(entry.error_message.is_none());

    // the eventual push still correlates on the original tempId
    let msg = confirmed("m1", "t2", "hello", now);
    assert!(tracker.retire_for_message(&msg, now).is_some());
    assert!(tracker.is_empty());
}

#[test]
fn test_failed_subset_survives_snapshot_round_trip() {
    let now = Utc::now();
    let mut tracker = tracker();
    tracker.add(draft("t1", "pending one", now), &[], now);
    tracker.add(draft("t2", "failed one", now), &[], now);
    tracker.mark_status("t2", OptimisticStatus::Failed, Some("send rejected".to_string()));

    let raw = serde_json::to_string(&tracker.failed_snapshot()).unwrap();
    let restored: Vec<OptimisticMessage> = serde_json::from_str(&raw).unwrap();

    let mut fresh = OptimisticTracker::new(&ThreadConfig::default());
    fresh.restore(restored);
    assert_eq!(fresh.entries().len(), 1);
    let entry = fresh.get("t2").unwrap();
    assert!(entry.is_failed());
    assert_eq!(entry.error_message.as_deref(), Some("send rejected"));
}

#[test]
fn test_anti_duplicate_guard_window() {
    let now = Utc::now();
    let mut tracker = tracker();
    let fresh_twin = confirmed("m1", "other", "hello", now - Duration::seconds(4));
    assert!(!tracker.add(draft("t1", "hello", now), &[fresh_twin], now));

    let stale_twin = confirmed("m1", "other", "hello", now - Duration::seconds(6));
    assert!(tracker.add(draft("t1", "hello", now), &[stale_twin], now));
}

#[test]
fn test_display_suppression_handoff() {
    let now = Utc::now();
    let mut tracker = tracker();
    tracker.add(draft("t1", "hello", now), &[], now);

    // confirmation just landed: local entry hides to avoid the flicker
    let twin = confirmed("m1", "zzz", "hello", now);
    assert!(tracker.visible(&[twin.clone()], now).is_empty());

    // well past the window, both would render (de-dup is the engine's job)
    let visible = tracker.visible(&[twin], now + Duration::seconds(20));
    assert_eq!(visible.len(), 1);
}

#[test]
fn test_visible_keeps_attachment_only_entries() {
    let now = Utc::now();
    let mut tracker = tracker();
    let mut entry = draft("t1", "", now);
    entry.content = None;
    tracker.add(entry, &[], now);
    assert_eq!(tracker.visible(&[], now).len(), 1);
}

#[test]
fn test_delete_event_reaches_failed_entries() {
    let now = Utc::now();
    let mut tracker = tracker();
    tracker.add(draft("temp-42", "x", now), &[], now);
    tracker.mark_status("temp-42", OptimisticStatus::Failed, None);
    assert_eq!(tracker.remove_for_delete("TEMP-42"), 1);
    assert!(tracker.is_empty());
}
