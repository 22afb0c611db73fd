use agent_desk::types::{
    Attachment, ChannelKind, Chat, Collaborator, Message, MessageKind, MessageStatus,
    OptimisticMessage, OptimisticStatus, SenderKind,
};
use chrono::Utc;
use serde_json::json;

#[test]
fn test_message_round_trip() {
    let raw = json!({
        "id": "m1",
        "chat_id": "c1",
        "content": "hello",
        "type": "text",
        "sender_kind": "agent",
        "sender_agent_id": "a1",
        "sender_customer_id": null,
        "status": "sent",
        "created_at": "2026-02-01T09:30:00Z",
        "attachments": [{"url": "https://cdn/x.png", "type": "image", "name": "x.png"}],
        "metadata": {"tempId": "t-77"},
        "response_message_id": null
    });
    let msg: Message = serde_json::from_value(raw).unwrap();
    assert_eq!(msg.kind, MessageKind::Text);
    assert_eq!(msg.sender_kind, SenderKind::Agent);
    assert_eq!(msg.status, MessageStatus::Sent);
    assert_eq!(msg.temp_id(), Some("t-77"));
    assert_eq!(msg.attachments.len(), 1);

    let back = serde_json::to_value(&msg).unwrap();
    assert_eq!(back.get("type").unwrap(), "text");
}

#[test]
fn test_message_status_variants() {
    for (raw, expected) in [
        ("pending", MessageStatus::Pending),
        ("sent", MessageStatus::Sent),
        ("delivered", MessageStatus::Delivered),
        ("read", MessageStatus::Read),
        ("failed", MessageStatus::Failed),
        ("deleted", MessageStatus::Deleted),
    ] {
        let status: MessageStatus = serde_json::from_value(json!(raw)).unwrap();
        assert_eq!(status, expected);
    }
}

#[test]
fn test_message_kind_variants() {
    for raw in [
        "text", "image", "video", "audio", "document", "sticker", "template", "system_event",
    ] {
        let kind: Result<MessageKind, _> = serde_json::from_value(json!(raw));
        assert!(kind.is_ok(), "kind {raw} failed to parse");
    }
}

#[test]
fn test_channel_kind_variants() {
    for raw in [
        "whatsapp_official",
        "whatsapp_unofficial",
        "instagram",
        "facebook",
    ] {
        let kind: Result<ChannelKind, _> = serde_json::from_value(json!(raw));
        assert!(kind.is_ok(), "channel {raw} failed to parse");
    }
}

#[test]
fn test_chat_with_nested_expansion() {
    let raw = json!({
        "id": "c1",
        "status": "in_progress",
        "assigned_to": "a1",
        "channel": {"id": "chan_1", "type": "whatsapp_official", "connected": true},
        "customer": {"id": "cust_1", "name": "Dana"},
        "last_customer_message_at": "2026-02-01T08:00:00Z",
        "flow_session_id": null,
        "collaborators": [{
            "id": "col_1",
            "chat_id": "c1",
            "user_id": "a2",
            "joined_at": "2026-02-01T08:05:00Z",
            "left_at": null
        }]
    });
    let chat: Chat = serde_json::from_value(raw).unwrap();
    assert_eq!(chat.channel.kind, ChannelKind::WhatsappOfficial);
    assert_eq!(chat.customer.as_ref().unwrap().name.as_deref(), Some("Dana"));
    assert_eq!(chat.collaborators.len(), 1);
    assert!(chat.collaborators[0].left_at.is_none());
}

#[test]
fn test_chat_without_optional_expansions() {
    let raw = json!({
        "id": "c1",
        "status": "pending",
        "assigned_to": null,
        "channel": {"id": "chan_1", "type": "instagram", "connected": false},
        "last_customer_message_at": null,
        "flow_session_id": null
    });
    let chat: Chat = serde_json::from_value(raw).unwrap();
    assert!(chat.customer.is_none());
    assert!(chat.collaborators.is_empty());
}

#[test]
fn test_optimistic_message_snapshot_round_trip() {
    let entry = OptimisticMessage {
        id: "t1".to_string(),
        chat_id: "c1".to_string(),
        content: Some("draft".to_string()),
        attachments: vec![],
        reply_to_message_id: Some("m9".to_string()),
        status: OptimisticStatus::Failed,
        error_message: Some("timeout".to_string()),
        created_at: Utc::now(),
    };
    let raw = serde_json::to_string(&entry).unwrap();
    let back: OptimisticMessage = serde_json::from_str(&raw).unwrap();
    assert_eq!(back.id, "t1");
    assert!(back.is_failed());
    assert_eq!(back.error_message.as_deref(), Some("timeout"));
    assert_eq!(back.reply_to_message_id.as_deref(), Some("m9"));
}

#[test]
fn test_attachment_serializes_type_field() {
    let att = Attachment {
        url: "https://cdn/doc.pdf".to_string(),
        kind: Some("document".to_string()),
        name: Some("doc.pdf".to_string()),
    };
    let raw = serde_json::to_value(&att).unwrap();
    assert_eq!(raw.get("type").unwrap(), "document");
    assert!(raw.get("kind").is_none());
}

#[test]
fn test_collaborator_left_at() {
    let raw = json!({
        "id": "col_1",
        "chat_id": "c1",
        "user_id": "a1",
        "joined_at": "2026-02-01T08:00:00Z",
        "left_at": "2026-02-01T09:00:00Z"
    });
    let collaborator: Collaborator = serde_json::from_value(raw).unwrap();
    assert!(collaborator.left_at.is_some());
}

#[test]
fn test_dom_ids_are_deterministic() {
    let entry = OptimisticMessage {
        id: "t1".to_string(),
        chat_id: "c1".to_string(),
        content: None,
        attachments: vec![],
        reply_to_message_id: None,
        status: OptimisticStatus::Pending,
        error_message: None,
        created_at: Utc::now(),
    };
    assert_eq!(entry.dom_id(), "message-t1");
}
