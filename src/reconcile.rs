use crate::types::{Message, OptimisticMessage};
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::collections::HashSet;

pub fn normalize_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Exact or substring match in either direction, case/whitespace-normalized.
/// Deletion ids can arrive truncated on either side.
pub fn id_matches(a: &str, b: &str) -> bool {
    let na = normalize_id(a);
    let nb = normalize_id(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    na == nb || na.contains(&nb) || nb.contains(&na)
}

/// The persisted side of the thread. One message per id, kept in ascending
/// `created_at` order with ties left in arrival order.
#[derive(Default)]
pub struct ThreadBuffer {
    messages: Vec<Message>,
    live_inserts: usize,
}

impl ThreadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn find_by_temp_id(&self, temp_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.temp_id() == Some(temp_id))
    }

    /// Count of push inserts observed since the buffer was (re)seeded.
    pub fn live_inserts(&self) -> usize {
        self.live_inserts
    }

    /// Replaces the buffer with a chronological page. Resets the
    /// live-insert counter: a fresh seed starts a fresh session.
    pub fn seed(&mut self, page: Vec<Message>) {
        self.messages.clear();
        self.live_inserts = 0;
        for msg in page {
            if !self.contains(&msg.id) {
                self.messages.push(msg);
            }
        }
        self.sort();
    }

    /// Prepends an older page fetched during backfill. Rows already
    /// delivered by push events are dropped.
    pub fn merge_older(&mut self, page: Vec<Message>) {
        for msg in page {
            if !self.contains(&msg.id) {
                self.messages.push(msg);
            }
        }
        self.sort();
    }

    /// Idempotent push insert.
    pub fn apply_insert(&mut self, msg: Message) -> bool {
        if self.contains(&msg.id) {
            return false;
        }
        self.messages.push(msg);
        self.sort();
        self.live_inserts += 1;
        true
    }

    /// In-place replacement, no reordering. Updates for rows outside the
    /// loaded window are ignored.
    pub fn apply_update(&mut self, msg: Message) -> bool {
        if let Some(slot) = self.messages.iter_mut().find(|m| m.id == msg.id) {
            *slot = msg;
            return true;
        }
        false
    }

    /// Removes every message the deleted id matches (normalized, substring
    /// either direction). Returns how many were removed.
    pub fn apply_delete(&mut self, deleted_id: &str) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !id_matches(&m.id, deleted_id));
        before - self.messages.len()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.live_inserts = 0;
    }

    fn sort(&mut self) {
        self.messages.sort_by_key(|m| m.created_at);
    }
}

#[derive(Debug, Clone)]
pub enum ThreadEntry {
    Persisted(Message),
    Local(OptimisticMessage),
}

impl ThreadEntry {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ThreadEntry::Persisted(m) => m.created_at,
            ThreadEntry::Local(m) => m.created_at,
        }
    }

    pub fn dom_id(&self) -> String {
        match self {
            ThreadEntry::Persisted(m) => m.dom_id(),
            ThreadEntry::Local(m) => m.dom_id(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ThreadEntry::Persisted(m) => &m.id,
            ThreadEntry::Local(m) => &m.id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub entries: Vec<ThreadEntry>,
}

#[derive(Debug, Clone)]
pub struct ChatBlock {
    pub chat_id: String,
    /// Reply/delete/retry affordances are only offered on the active block.
    pub actions_enabled: bool,
    pub groups: Vec<DateGroup>,
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

fn group_entries(entries: Vec<ThreadEntry>) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();
    for entry in entries {
        let date = local_date(entry.created_at());
        match groups.last_mut() {
            Some(group) if group.date == date => group.entries.push(entry),
            _ => groups.push(DateGroup {
                date,
                entries: vec![entry],
            }),
        }
    }
    groups
}

/// The single-chat render model: persisted and local entries merged,
/// de-duplicated by id, ordered ascending and grouped by calendar date.
pub fn build_render_model(
    persisted: &[Message],
    local: Vec<OptimisticMessage>,
) -> Vec<DateGroup> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut temp_ids: HashSet<&str> = HashSet::new();
    let mut entries: Vec<ThreadEntry> = Vec::new();

    for msg in persisted {
        if !seen.insert(msg.id.as_str()) {
            continue;
        }
        if let Some(temp_id) = msg.temp_id() {
            temp_ids.insert(temp_id);
        }
        entries.push(ThreadEntry::Persisted(msg.clone()));
    }

    for entry in local {
        if seen.contains(entry.id.as_str()) || temp_ids.contains(entry.id.as_str()) {
            continue;
        }
        entries.push(ThreadEntry::Local(entry));
    }

    entries.sort_by_key(|e| e.created_at());
    group_entries(entries)
}

/// Cross-chat mode: one block per originating chat, blocks ordered by first
/// appearance, dates grouped within each block.
pub fn build_chat_blocks(messages: &[Message], active_chat_id: &str) -> Vec<ChatBlock> {
    let mut order: Vec<String> = Vec::new();
    for msg in messages {
        if !order.iter().any(|id| id == &msg.chat_id) {
            order.push(msg.chat_id.clone());
        }
    }

    order
        .into_iter()
        .map(|chat_id| {
            let mut entries: Vec<ThreadEntry> = messages
                .iter()
                .filter(|m| m.chat_id == chat_id)
                .cloned()
                .map(ThreadEntry::Persisted)
                .collect();
            entries.sort_by_key(|e| e.created_at());
            ChatBlock {
                actions_enabled: chat_id == active_chat_id,
                groups: group_entries(entries),
                chat_id,
            }
        })
        .collect()
}
