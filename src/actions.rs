use crate::config::BackendConfig;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

const TOKEN_HEADER: &str = "X-Agent-Desk-Token";

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The backend rejected the call; the message is its `error` field,
    /// surfaced to the user verbatim.
    #[error("{0}")]
    Remote(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureKind {
    Resolved,
    Unresolved,
    Spam,
}

#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    pub bytes: Bytes,
    pub filename: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub chat_id: String,
    pub temp_id: String,
    pub content: Option<String>,
    pub reply_to_message_id: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
}

#[derive(Clone)]
pub struct ActionClient {
    http: Client,
    base_url: String,
    api_token: Option<String>,
}

impl ActionClient {
    pub fn new(http: Client, config: &BackendConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.post(format!("{}{}", self.base_url, path));
        if let Some(token) = self.api_token.as_ref() {
            req = req.header(TOKEN_HEADER, token);
        }
        req
    }

    async fn check(resp: reqwest::Response) -> Result<serde_json::Value, ActionError> {
        if resp.status().is_success() {
            return Ok(resp.json().await.unwrap_or(serde_json::Value::Null));
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| format!("request failed: {status}"));
        Err(ActionError::Remote(message))
    }

    pub async fn send_message(&self, request: &SendRequest) -> Result<(), ActionError> {
        let metadata = json!({ "tempId": request.temp_id });
        let mut form = Form::new()
            .text("chat_id", request.chat_id.clone())
            .text("metadata", metadata.to_string());
        if let Some(content) = request.content.clone() {
            form = form.text("content", content);
        }
        if let Some(reply_to) = request.reply_to_message_id.clone() {
            form = form.text("response_message_id", reply_to);
        }
        for att in &request.attachments {
            let mut part = Part::bytes(att.bytes.to_vec()).file_name(att.filename.clone());
            if let Some(mime) = att.mime_type.as_deref() {
                if let Ok(with_mime) = part.mime_str(mime) {
                    part = with_mime;
                } else {
                    part = Part::bytes(att.bytes.to_vec()).file_name(att.filename.clone());
                }
            }
            form = form.part("attachments", part);
        }

        let resp = self.post("/v1/messages/send").multipart(form).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<(), ActionError> {
        let resp = self
            .post("/v1/messages/delete")
            .json(&json!({ "message_id": message_id }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn start_flow(&self, chat_id: &str, flow_id: &str) -> Result<(), ActionError> {
        let resp = self
            .post("/v1/flows/start")
            .json(&json!({ "chat_id": chat_id, "flow_id": flow_id }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn pause_flow(&self, flow_session_id: &str) -> Result<(), ActionError> {
        let resp = self
            .post("/v1/flows/pause")
            .json(&json!({ "flow_session_id": flow_session_id }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn resolve_chat(
        &self,
        chat_id: &str,
        closure: ClosureKind,
        title: &str,
    ) -> Result<(), ActionError> {
        let resp = self
            .post("/v1/chats/resolve")
            .json(&json!({ "chat_id": chat_id, "closure": closure, "title": title }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn generate_summary(&self, chat_id: &str) -> Result<String, ActionError> {
        let resp = self
            .post("/v1/chats/summary")
            .json(&json!({ "chat_id": chat_id }))
            .send()
            .await?;
        let body = Self::check(resp).await?;
        Ok(body
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    pub async fn send_template(
        &self,
        chat_id: &str,
        template_id: &str,
        variables: &serde_json::Value,
    ) -> Result<(), ActionError> {
        let resp = self
            .post("/v1/templates/send")
            .json(&json!({
                "chat_id": chat_id,
                "template_id": template_id,
                "variables": variables,
            }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
