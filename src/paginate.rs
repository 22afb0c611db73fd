use crate::store::{Store, StoreError};
use crate::types::Message;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Initial,
    Older,
    /// Forced reload after a suspected push gap; ignores the live-insert
    /// offset adjustment.
    Resync,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadMode::Initial => "initial",
            LoadMode::Older => "older",
            LoadMode::Resync => "resync",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    /// Chronological order, oldest first.
    pub messages: Vec<Message>,
    pub has_more: bool,
}

pub struct Paginator {
    store: Arc<dyn Store>,
    page_size: i64,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut keys) = self.keys.lock() {
            keys.remove(&self.key);
        }
    }
}

impl Paginator {
    pub fn new(store: Arc<dyn Store>, page_size: i64) -> Self {
        Self {
            store,
            page_size,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    fn try_begin(&self, key: String) -> Option<InFlightGuard> {
        let mut keys = self.in_flight.lock().ok()?;
        if !keys.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            keys: Arc::clone(&self.in_flight),
            key,
        })
    }

    /// Fetches one newest-first page and returns it in chronological order.
    /// `Ok(None)` means the identical request is already in flight and this
    /// call was dropped, not queued.
    pub async fn load_page(
        &self,
        chat_id: &str,
        page: i64,
        mode: LoadMode,
        live_inserts: usize,
    ) -> Result<Option<Page>, StoreError> {
        let key = format!("{chat_id}:{page}:{mode}");
        let Some(_guard) = self.try_begin(key) else {
            return Ok(None);
        };

        let adjustment = match mode {
            LoadMode::Resync => 0,
            _ => live_inserts as i64,
        };
        let offset = (page - 1) * self.page_size + adjustment;

        let mut rows = self
            .store
            .list_chat_messages(chat_id, self.page_size, offset)
            .await?;
        let has_more = rows.len() as i64 == self.page_size;
        rows.reverse();
        Ok(Some(Page {
            messages: rows,
            has_more,
        }))
    }

    /// Deep-link load: a page of context around one historical message.
    /// Degrades to a plain first-page load when anything goes wrong.
    pub async fn load_around_message(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<Option<Page>, StoreError> {
        let key = format!("{chat_id}:around:{message_id}");
        let Some(_guard) = self.try_begin(key) else {
            return Ok(None);
        };

        match self.context_page(chat_id, message_id).await {
            Ok(page) => Ok(Some(page)),
            Err(err) => {
                warn!(%chat_id, %message_id, error = %err, "context load failed, falling back to first page");
                let mut rows = self
                    .store
                    .list_chat_messages(chat_id, self.page_size, 0)
                    .await?;
                let has_more = rows.len() as i64 == self.page_size;
                rows.reverse();
                Ok(Some(Page {
                    messages: rows,
                    has_more,
                }))
            }
        }
    }

    async fn context_page(&self, chat_id: &str, message_id: &str) -> Result<Page, StoreError> {
        let target = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| StoreError::Request(format!("message {message_id} not found")))?;

        let mut rows = self
            .store
            .list_chat_messages(chat_id, self.page_size, 0)
            .await?;

        if !rows.iter().any(|m| m.id == target.id) {
            // Walk backward from the target's timestamp instead.
            rows = self
                .store
                .list_chat_messages_before(chat_id, target.created_at, self.page_size)
                .await?;
        }

        let has_more = rows.len() as i64 == self.page_size;
        rows.reverse();
        Ok(Page {
            messages: rows,
            has_more,
        })
    }

    /// Cross-chat history: every conversation this customer has on the
    /// channel, page by page.
    pub async fn load_customer_page(
        &self,
        customer_id: &str,
        channel_id: &str,
        page: i64,
    ) -> Result<Option<Page>, StoreError> {
        let key = format!("customer:{customer_id}:{channel_id}:{page}");
        let Some(_guard) = self.try_begin(key) else {
            return Ok(None);
        };

        let offset = (page - 1) * self.page_size;
        let mut rows = self
            .store
            .list_customer_messages(customer_id, channel_id, self.page_size, offset)
            .await?;
        let has_more = rows.len() as i64 == self.page_size;
        rows.reverse();
        Ok(Some(Page {
            messages: rows,
            has_more,
        }))
    }
}
