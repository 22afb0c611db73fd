use crate::types::{AgentProfile, Chat, Collaborator, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub mod tables {
    pub const MESSAGES: &str = "messages";
    pub const CHATS: &str = "chats";
    pub const CHAT_COLLABORATORS: &str = "chat_collaborators";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("subscription failed: {0}")]
    Subscribe(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushEventKind {
    Insert,
    Update,
    Delete,
    Ack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub kind: PushEventKind,
    pub table: String,
    pub row: serde_json::Value,
    #[serde(default)]
    pub old: Option<serde_json::Value>,
}

impl PushEvent {
    pub fn ack(table: &str) -> Self {
        Self {
            kind: PushEventKind::Ack,
            table: table.to_string(),
            row: serde_json::Value::Null,
            old: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

impl ColumnFilter {
    pub fn eq(column: &str, value: &str) -> Self {
        Self {
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionSpec {
    pub table: String,
    pub kinds: Vec<PushEventKind>,
    pub filter: Option<ColumnFilter>,
}

impl SubscriptionSpec {
    pub fn new(table: &str, kinds: &[PushEventKind], filter: Option<ColumnFilter>) -> Self {
        Self {
            table: table.to_string(),
            kinds: kinds.to_vec(),
            filter,
        }
    }

    pub fn wants(&self, kind: PushEventKind) -> bool {
        kind == PushEventKind::Ack || self.kinds.contains(&kind)
    }
}

// Dropping the subscription tears down the remote channel.
pub struct Subscription {
    pub events: mpsc::Receiver<PushEvent>,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<PushEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
pub trait Realtime: Send + Sync {
    async fn subscribe(&self, spec: SubscriptionSpec) -> Result<Subscription, StoreError>;
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Newest-first page of a chat's messages.
    async fn list_chat_messages(
        &self,
        chat_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, StoreError>;

    /// Newest-first page bounded by `created_at <= cutoff`.
    async fn list_chat_messages_before(
        &self,
        chat_id: &str,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError>;

    /// Newest-first page across every chat the customer has on a channel.
    async fn list_customer_messages(
        &self,
        customer_id: &str,
        channel_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, StoreError>;

    async fn get_message(&self, id: &str) -> Result<Option<Message>, StoreError>;

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, StoreError>;

    async fn get_agent_profile(&self, agent_id: &str) -> Result<Option<AgentProfile>, StoreError>;

    async fn upsert_collaborator(&self, collaborator: &Collaborator) -> Result<(), StoreError>;

    /// Collaborator row for (chat, user) with `left_at` still null.
    async fn active_collaborator(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Option<Collaborator>, StoreError>;
}
