use crate::config::ThreadConfig;
use crate::types::{Message, OptimisticMessage, OptimisticStatus};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

pub struct OptimisticTracker {
    entries: Vec<OptimisticMessage>,
    duplicate_window: Duration,
    optimistic_suppress: Duration,
    failed_suppress: Duration,
}

impl OptimisticTracker {
    pub fn new(config: &ThreadConfig) -> Self {
        Self {
            entries: Vec::new(),
            duplicate_window: Duration::seconds(config.duplicate_window_seconds),
            optimistic_suppress: Duration::seconds(config.optimistic_suppress_seconds),
            failed_suppress: Duration::seconds(config.failed_suppress_seconds),
        }
    }

    pub fn entries(&self) -> &[OptimisticMessage] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&OptimisticMessage> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a new entry unless the id is already tracked, already
    /// persisted, or a persisted message with the same trimmed content
    /// landed within the duplicate window.
    pub fn add(
        &mut self,
        entry: OptimisticMessage,
        persisted: &[Message],
        now: DateTime<Utc>,
    ) -> bool {
        if self.entries.iter().any(|e| e.id == entry.id) {
            return false;
        }
        if persisted.iter().any(|m| m.id == entry.id) {
            return false;
        }
        if let Some(content) = entry.trimmed_content() {
            if !content.is_empty()
                && persisted.iter().any(|m| {
                    m.trimmed_content() == Some(content)
                        && now - m.created_at <= self.duplicate_window
                })
            {
                debug!(id = %entry.id, "optimistic add suppressed by recent duplicate");
                return false;
            }
        }
        self.entries.push(entry);
        true
    }

    /// Updates status in place. Failed is a status, not a separate list.
    pub fn mark_status(
        &mut self,
        id: &str,
        status: OptimisticStatus,
        error_message: Option<String>,
    ) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.status = status;
            entry.error_message = error_message;
            return true;
        }
        false
    }

    /// Removes by exact id, then by substring containment either way
    /// (correlation ids can arrive truncated). Silent when nothing matches.
    pub fn retire(&mut self, id: &str) -> Option<OptimisticMessage> {
        if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
            return Some(self.entries.remove(pos));
        }
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.id.contains(id) || id.contains(&e.id))
        {
            return Some(self.entries.remove(pos));
        }
        None
    }

    /// Retirement driven by an observed persisted message: tempId match
    /// first, content + recency as a last resort.
    pub fn retire_for_message(
        &mut self,
        message: &Message,
        now: DateTime<Utc>,
    ) -> Option<OptimisticMessage> {
        if let Some(temp_id) = message.temp_id() {
            let temp_id = temp_id.to_string();
            if let Some(entry) = self.retire(&temp_id) {
                return Some(entry);
            }
        }
        let content = message.trimmed_content()?;
        if content.is_empty() || now - message.created_at > self.duplicate_window {
            return None;
        }
        let pos = self
            .entries
            .iter()
            .position(|e| e.trimmed_content() == Some(content))?;
        Some(self.entries.remove(pos))
    }

    /// Normalized delete matching across the optimistic and failed entries.
    /// Returns how many entries were removed.
    pub fn remove_for_delete(&mut self, deleted_id: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !crate::reconcile::id_matches(&e.id, deleted_id));
        before - self.entries.len()
    }

    /// User removed the entry locally.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Entries that should render right now. An entry is hidden while a
    /// persisted message with identical trimmed content sits inside the
    /// handoff window, which removes the flicker during confirmation.
    pub fn visible(&self, persisted: &[Message], now: DateTime<Utc>) -> Vec<OptimisticMessage> {
        self.entries
            .iter()
            .filter(|entry| {
                let window = match entry.status {
                    OptimisticStatus::Pending => self.optimistic_suppress,
                    OptimisticStatus::Failed => self.failed_suppress,
                };
                let Some(content) = entry.trimmed_content() else {
                    return true;
                };
                if content.is_empty() {
                    return true;
                }
                !persisted.iter().any(|m| {
                    m.trimmed_content() == Some(content) && now - m.created_at <= window
                })
            })
            .cloned()
            .collect()
    }

    pub fn failed_snapshot(&self) -> Vec<OptimisticMessage> {
        self.entries.iter().filter(|e| e.is_failed()).cloned().collect()
    }

    /// Seeds the tracker from a durable snapshot on chat activation.
    pub fn restore(&mut self, entries: Vec<OptimisticMessage>) {
        for entry in entries {
            if self.entries.iter().all(|e| e.id != entry.id) {
                self.entries.push(entry);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
