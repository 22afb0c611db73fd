use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    WhatsappOfficial,
    WhatsappUnofficial,
    Instagram,
    Facebook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Template,
    SystemEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Customer,
    Agent,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub id: String,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sender_kind: SenderKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sender_kind: SenderKind,
    pub sender_agent_id: Option<String>,
    pub sender_customer_id: Option<String>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub response_message_id: Option<String>,
    #[serde(default)]
    pub response_to: Option<ResponseSnapshot>,
    #[serde(default)]
    pub sender_agent: Option<AgentProfile>,
}

impl Message {
    pub fn temp_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("tempId"))
            .and_then(|v| v.as_str())
    }

    pub fn trimmed_content(&self) -> Option<&str> {
        self.content.as_deref().map(str::trim)
    }

    pub fn dom_id(&self) -> String {
        format!("message-{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimisticStatus {
    Pending,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentPreview {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimisticMessage {
    pub id: String,
    pub chat_id: String,
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentPreview>,
    pub reply_to_message_id: Option<String>,
    pub status: OptimisticStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OptimisticMessage {
    pub fn is_failed(&self) -> bool {
        self.status == OptimisticStatus::Failed
    }

    pub fn trimmed_content(&self) -> Option<&str> {
        self.content.as_deref().map(str::trim)
    }

    pub fn dom_id(&self) -> String {
        format!("message-{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Pending,
    InProgress,
    Closed,
    AwaitClosing,
    Spam,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDetails {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub status: ChatStatus,
    pub assigned_to: Option<String>,
    pub channel: ChannelDetails,
    #[serde(default)]
    pub customer: Option<Customer>,
    pub last_customer_message_at: Option<DateTime<Utc>>,
    pub flow_session_id: Option<String>,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub content: Option<String>,
    pub attachments: Vec<AttachmentPreview>,
    pub reply_to_message_id: Option<String>,
}
