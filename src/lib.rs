pub mod actions;
pub mod config;
pub mod features;
pub mod mirror;
pub mod optimistic;
pub mod paginate;
pub mod reconcile;
pub mod resync;
pub mod scroll;
pub mod store;
pub mod types;

pub use config::Config;

use self::actions::{ActionClient, ActionError, ClosureKind, OutgoingAttachment, SendRequest};
use self::config::{load_config, resolve_database_url};
use self::features::{channel_features, messaging_window, ChannelFeatures, MessagingWindow};
use self::mirror::DbKind;
use self::optimistic::OptimisticTracker;
use self::paginate::{LoadMode, Paginator};
use self::reconcile::{build_chat_blocks, build_render_model, ChatBlock, DateGroup, ThreadBuffer};
use self::resync::{ResyncDecision, ResyncMonitor};
use self::scroll::{ScrollPreserver, Viewport};
use self::store::{
    tables, ColumnFilter, PushEvent, PushEventKind, Realtime, Store, Subscription,
    SubscriptionSpec,
};
use self::types::{
    Chat, Collaborator, Message, MessageDraft, MessageKind, OptimisticMessage, OptimisticStatus,
    ResponseSnapshot,
};

use chrono::{DateTime, Duration, Utc};
use sqlx::AnyPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
}

#[derive(Debug, Clone)]
pub enum Notice {
    Error(String),
    MessageRemoved,
    NewMessages(u32),
    ScrollToLatest,
    Resynced,
}

#[derive(Debug, Clone)]
pub struct Highlight {
    pub message_id: String,
    pub until: DateTime<Utc>,
}

struct SessionSubscriptions {
    messages: Subscription,
    deletes: Subscription,
    chat: Subscription,
    collaborators: Subscription,
}

struct CrossChatView {
    customer_id: String,
    channel_id: String,
    page: i64,
    has_more: bool,
    messages: Vec<Message>,
}

enum Routed {
    Message(PushEvent),
    Delete(PushEvent),
    Chat(PushEvent),
    Collaborator(PushEvent),
    Closed,
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// One agent-facing conversation thread. Owns the persisted buffer, the
/// optimistic tracker and the four push subscriptions for the active chat;
/// switching chats tears everything down first.
pub struct ThreadSession {
    config: Config,
    store: Arc<dyn Store>,
    realtime: Arc<dyn Realtime>,
    actions: ActionClient,
    pool: AnyPool,
    db_kind: DbKind,
    viewport: Arc<dyn Viewport>,
    notice_tx: broadcast::Sender<Notice>,
    current_user_id: String,

    state: SessionState,
    chat: Option<Chat>,
    buffer: ThreadBuffer,
    tracker: OptimisticTracker,
    paginator: Paginator,
    preserver: ScrollPreserver,
    monitor: ResyncMonitor,
    agent_profiles: HashMap<String, types::AgentProfile>,
    subs: Option<SessionSubscriptions>,
    cross_chat: Option<CrossChatView>,
    page: i64,
    has_more: bool,
    unread_since_insert: u32,
    highlight: Option<Highlight>,
}

/// Builds a session from the on-disk/env configuration, connecting the
/// durable mirror on the way.
pub async fn create_session(
    store: Arc<dyn Store>,
    realtime: Arc<dyn Realtime>,
    viewport: Arc<dyn Viewport>,
    current_user_id: &str,
    user_agent: &str,
) -> anyhow::Result<ThreadSession> {
    sqlx::any::install_default_drivers();

    let config = load_config();
    let db_url = resolve_database_url(&config);
    let db_kind = mirror::db_kind_from_url(&db_url);
    let pool = AnyPool::connect(&db_url).await?;
    mirror::init_mirror(&pool, db_kind).await?;

    Ok(ThreadSession::new(
        config,
        store,
        realtime,
        viewport,
        pool,
        db_kind,
        current_user_id,
        user_agent,
    ))
}

impl ThreadSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        realtime: Arc<dyn Realtime>,
        viewport: Arc<dyn Viewport>,
        pool: AnyPool,
        db_kind: DbKind,
        current_user_id: &str,
        user_agent: &str,
    ) -> Self {
        let (notice_tx, _) = broadcast::channel(100);
        let actions = ActionClient::new(reqwest::Client::new(), &config.backend);
        let paginator = Paginator::new(Arc::clone(&store), config.thread.page_size);
        let preserver =
            ScrollPreserver::new(&config.scroll, scroll::is_embedded_webview(user_agent));
        let monitor = ResyncMonitor::new(&config.resync, Utc::now());
        let tracker = OptimisticTracker::new(&config.thread);

        Self {
            config,
            store,
            realtime,
            actions,
            pool,
            db_kind,
            viewport,
            notice_tx,
            current_user_id: current_user_id.to_string(),
            state: SessionState::Idle,
            chat: None,
            buffer: ThreadBuffer::new(),
            tracker,
            paginator,
            preserver,
            monitor,
            agent_profiles: HashMap::new(),
            subs: None,
            cross_chat: None,
            page: 1,
            has_more: false,
            unread_since_insert: 0,
            highlight: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn chat(&self) -> Option<&Chat> {
        self.chat.as_ref()
    }

    pub fn unread_since_insert(&self) -> u32 {
        self.unread_since_insert
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    pub fn highlight_at(&self, now: DateTime<Utc>) -> Option<&Highlight> {
        self.highlight.as_ref().filter(|h| h.until > now)
    }

    pub fn channel_features(&self) -> Option<ChannelFeatures> {
        self.chat.as_ref().map(|c| channel_features(c.channel.kind))
    }

    pub fn messaging_window_at(&self, now: DateTime<Utc>) -> Option<MessagingWindow> {
        self.chat.as_ref().map(|c| messaging_window(c, now))
    }

    /// Feeds the resync monitor; every confirmed push delivery counts,
    /// including connection acks.
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.monitor.record_activity(now);
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notice_tx.send(notice);
    }

    fn active_chat_id(&self) -> anyhow::Result<String> {
        self.chat
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or_else(|| anyhow::anyhow!("no active chat"))
    }

    /// Selects a chat: tears down the previous session, restores the
    /// durable failed snapshot, opens the push subscriptions and performs
    /// the initial load. With `deep_link` set, loads context around that
    /// message and arms a transient highlight instead.
    pub async fn activate(
        &mut self,
        chat_id: &str,
        deep_link: Option<&str>,
    ) -> anyhow::Result<()> {
        self.deactivate();
        self.state = SessionState::Loading;

        let chat = match self.store.get_chat(chat_id).await {
            Ok(Some(chat)) => chat,
            Ok(None) => {
                self.state = SessionState::Idle;
                self.notify(Notice::Error("conversation not found".to_string()));
                anyhow::bail!("chat {chat_id} not found");
            }
            Err(err) => {
                self.state = SessionState::Idle;
                self.notify(Notice::Error("failed to load conversation".to_string()));
                return Err(err.into());
            }
        };
        self.chat = Some(chat);

        match mirror::load_failed_snapshot(&self.pool, self.db_kind, chat_id).await {
            Ok(entries) => self.tracker.restore(entries),
            Err(err) => warn!(%chat_id, error = %err, "failed snapshot restore failed"),
        }

        if let Err(err) = self.open_subscriptions(chat_id).await {
            self.state = SessionState::Idle;
            self.notify(Notice::Error("failed to load conversation".to_string()));
            return Err(err);
        }

        match deep_link {
            Some(message_id) => self.initial_load_around(chat_id, message_id).await,
            None => self.initial_load(chat_id).await,
        }

        self.state = SessionState::Ready;
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.subs = None;
        self.buffer.clear();
        self.tracker.clear();
        self.agent_profiles.clear();
        self.cross_chat = None;
        self.chat = None;
        self.page = 1;
        self.has_more = false;
        self.unread_since_insert = 0;
        self.highlight = None;
        self.state = SessionState::Idle;
    }

    async fn open_subscriptions(&mut self, chat_id: &str) -> anyhow::Result<()> {
        let messages = self
            .realtime
            .subscribe(SubscriptionSpec::new(
                tables::MESSAGES,
                &[PushEventKind::Insert, PushEventKind::Update],
                Some(ColumnFilter::eq("chat_id", chat_id)),
            ))
            .await?;
        // Deletes are rare and must not be lost to filter-timing races, so
        // this subscription is table-wide and unfiltered.
        let deletes = self
            .realtime
            .subscribe(SubscriptionSpec::new(
                tables::MESSAGES,
                &[PushEventKind::Delete],
                None,
            ))
            .await?;
        let chat = self
            .realtime
            .subscribe(SubscriptionSpec::new(
                tables::CHATS,
                &[PushEventKind::Update],
                Some(ColumnFilter::eq("id", chat_id)),
            ))
            .await?;
        let collaborators = self
            .realtime
            .subscribe(SubscriptionSpec::new(
                tables::CHAT_COLLABORATORS,
                &[PushEventKind::Insert, PushEventKind::Update],
                Some(ColumnFilter::eq("chat_id", chat_id)),
            ))
            .await?;

        self.subs = Some(SessionSubscriptions {
            messages,
            deletes,
            chat,
            collaborators,
        });
        Ok(())
    }

    async fn initial_load(&mut self, chat_id: &str) {
        match self
            .paginator
            .load_page(chat_id, 1, LoadMode::Initial, 0)
            .await
        {
            Ok(Some(page)) => {
                self.buffer.seed(page.messages);
                self.page = 1;
                self.has_more = page.has_more;
                self.retire_confirmed().await;
            }
            Ok(None) => {}
            Err(err) => {
                error!(%chat_id, error = %err, "initial page load failed");
                self.notify(Notice::Error("failed to load messages".to_string()));
            }
        }
    }

    /// Entries already confirmed by fetched rows (tempId present in the
    /// page) are retired straight away.
    async fn retire_confirmed(&mut self) {
        let now = Utc::now();
        let mut retired_failed = false;
        let confirmed: Vec<Message> = self
            .buffer
            .messages()
            .iter()
            .filter(|m| m.temp_id().is_some())
            .cloned()
            .collect();
        for msg in &confirmed {
            if let Some(entry) = self.tracker.retire_for_message(msg, now) {
                retired_failed |= entry.is_failed();
            }
        }
        if retired_failed {
            self.persist_failed_snapshot().await;
        }
    }

    async fn initial_load_around(&mut self, chat_id: &str, message_id: &str) {
        match self.paginator.load_around_message(chat_id, message_id).await {
            Ok(Some(page)) => {
                self.buffer.seed(page.messages);
                self.page = 1;
                self.has_more = page.has_more;
                self.retire_confirmed().await;
                if self.buffer.contains(message_id) {
                    self.highlight = Some(Highlight {
                        message_id: message_id.to_string(),
                        until: Utc::now()
                            + Duration::seconds(self.config.thread.highlight_seconds),
                    });
                }
            }
            Ok(None) => {}
            Err(err) => {
                error!(%chat_id, %message_id, error = %err, "deep-link load failed");
                self.notify(Notice::Error("failed to load messages".to_string()));
            }
        }
    }

    /// Drains one push event from whichever subscription delivers first.
    /// Returns false once the session is idle or every channel closed.
    pub async fn pump_once(&mut self) -> bool {
        let routed = {
            let Some(subs) = self.subs.as_mut() else {
                return false;
            };
            tokio::select! {
                ev = subs.messages.events.recv() => ev.map(Routed::Message).unwrap_or(Routed::Closed),
                ev = subs.deletes.events.recv() => ev.map(Routed::Delete).unwrap_or(Routed::Closed),
                ev = subs.chat.events.recv() => ev.map(Routed::Chat).unwrap_or(Routed::Closed),
                ev = subs.collaborators.events.recv() => ev.map(Routed::Collaborator).unwrap_or(Routed::Closed),
            }
        };

        match routed {
            Routed::Message(ev) => self.handle_message_event(ev).await,
            Routed::Delete(ev) => self.handle_delete_event(ev).await,
            Routed::Chat(ev) => self.handle_chat_event(ev),
            Routed::Collaborator(ev) => self.handle_collaborator_event(ev),
            Routed::Closed => return false,
        }
        true
    }

    pub async fn handle_message_event(&mut self, event: PushEvent) {
        self.monitor.record_activity(Utc::now());
        match event.kind {
            PushEventKind::Ack => {}
            PushEventKind::Insert => match serde_json::from_value::<Message>(event.row) {
                Ok(msg) => self.apply_insert(msg).await,
                Err(err) => warn!(error = %err, "undecodable insert event"),
            },
            PushEventKind::Update => match serde_json::from_value::<Message>(event.row) {
                Ok(msg) => self.apply_update(msg).await,
                Err(err) => warn!(error = %err, "undecodable update event"),
            },
            // subscriptions are unordered relative to each other; a delete
            // arriving here is handled the same as on its own channel
            PushEventKind::Delete => self.handle_delete_event(event).await,
        }
    }

    async fn apply_insert(&mut self, mut msg: Message) {
        let Ok(chat_id) = self.active_chat_id() else {
            return;
        };
        if msg.chat_id != chat_id {
            return;
        }
        if self.buffer.contains(&msg.id) {
            return;
        }

        // measured before the buffer grows
        let near_bottom =
            self.viewport.distance_to_bottom() <= self.config.thread.near_bottom_px;

        self.enrich(&mut msg).await;

        let now = Utc::now();
        let retired = self.tracker.retire_for_message(&msg, now);
        self.buffer.apply_insert(msg);

        if retired.as_ref().map(|e| e.is_failed()).unwrap_or(false) {
            self.persist_failed_snapshot().await;
        }

        if near_bottom {
            self.notify(Notice::ScrollToLatest);
        } else {
            self.unread_since_insert += 1;
            self.notify(Notice::NewMessages(self.unread_since_insert));
        }
    }

    async fn apply_update(&mut self, mut msg: Message) {
        let Ok(chat_id) = self.active_chat_id() else {
            return;
        };
        if msg.chat_id != chat_id {
            return;
        }

        self.enrich(&mut msg).await;

        let now = Utc::now();
        let replaced = self.buffer.apply_update(msg.clone());

        if !replaced && msg.status == types::MessageStatus::Failed {
            // failed-status update beat its own insert; keep the tracked
            // entry so the retry affordance is not lost
            if let Some(temp_id) = msg.temp_id().map(str::to_string) {
                let error_message = msg
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get("error"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                if self
                    .tracker
                    .mark_status(&temp_id, OptimisticStatus::Failed, error_message)
                {
                    self.persist_failed_snapshot().await;
                }
            }
            return;
        }

        let retired = self.tracker.retire_for_message(&msg, now);
        if retired.as_ref().map(|e| e.is_failed()).unwrap_or(false) {
            self.persist_failed_snapshot().await;
        }
    }

    pub async fn handle_delete_event(&mut self, event: PushEvent) {
        self.monitor.record_activity(Utc::now());
        if event.kind != PushEventKind::Delete {
            return;
        }
        let Some(deleted_id) = extract_deleted_id(&event) else {
            return;
        };

        let removed_persisted = self.buffer.apply_delete(&deleted_id);
        let removed_local = self.tracker.remove_for_delete(&deleted_id);

        for _ in 0..removed_persisted + removed_local {
            self.notify(Notice::MessageRemoved);
        }
        if removed_local > 0 {
            self.persist_failed_snapshot().await;
        }
        // no match anywhere: the delete belongs to another open chat
    }

    pub fn handle_chat_event(&mut self, event: PushEvent) {
        self.monitor.record_activity(Utc::now());
        if event.kind != PushEventKind::Update {
            return;
        }
        match serde_json::from_value::<Chat>(event.row) {
            Ok(chat) => {
                if self.chat.as_ref().map(|c| c.id == chat.id).unwrap_or(false) {
                    self.chat = Some(chat);
                }
            }
            Err(err) => warn!(error = %err, "undecodable chat event"),
        }
    }

    pub fn handle_collaborator_event(&mut self, event: PushEvent) {
        self.monitor.record_activity(Utc::now());
        if !matches!(event.kind, PushEventKind::Insert | PushEventKind::Update) {
            return;
        }
        let collaborator = match serde_json::from_value::<Collaborator>(event.row) {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "undecodable collaborator event");
                return;
            }
        };
        let Some(chat) = self.chat.as_mut() else {
            return;
        };
        if collaborator.chat_id != chat.id {
            return;
        }
        match chat
            .collaborators
            .iter_mut()
            .find(|c| c.id == collaborator.id)
        {
            Some(slot) => *slot = collaborator,
            None => chat.collaborators.push(collaborator),
        }
    }

    /// Enrichment is best-effort: the message renders without it rather
    /// than blocking the thread.
    async fn enrich(&mut self, msg: &mut Message) {
        if msg.sender_agent.is_none() && msg.kind == MessageKind::SystemEvent {
            if let Some(agent_id) = msg.sender_agent_id.clone() {
                if let Some(profile) = self.agent_profiles.get(&agent_id) {
                    msg.sender_agent = Some(profile.clone());
                } else {
                    match self.store.get_agent_profile(&agent_id).await {
                        Ok(Some(profile)) => {
                            self.agent_profiles.insert(agent_id, profile.clone());
                            msg.sender_agent = Some(profile);
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(%agent_id, error = %err, "agent profile lookup failed")
                        }
                    }
                }
            }
        }

        if msg.response_to.is_none() {
            if let Some(ref_id) = msg.response_message_id.clone() {
                match self.store.get_message(&ref_id).await {
                    Ok(Some(target)) => msg.response_to = Some(response_snapshot(&target)),
                    Ok(None) => {}
                    Err(err) => warn!(%ref_id, error = %err, "reply target lookup failed"),
                }
            }
        }
    }

    async fn persist_failed_snapshot(&self) {
        let Some(chat) = self.chat.as_ref() else {
            return;
        };
        let snapshot = self.tracker.failed_snapshot();
        if let Err(err) =
            mirror::save_failed_snapshot(&self.pool, self.db_kind, &chat.id, &snapshot).await
        {
            warn!(chat_id = %chat.id, error = %err, "failed snapshot persist failed");
        }
    }

    /// Registers the optimistic entry and issues the send. A rejected
    /// remote call marks the entry failed with the backend's error text;
    /// there is no automatic retry.
    pub async fn send(
        &mut self,
        draft: MessageDraft,
        attachments: Vec<OutgoingAttachment>,
    ) -> anyhow::Result<String> {
        let chat_id = self.active_chat_id()?;
        let now = Utc::now();

        let window = self
            .messaging_window_at(now)
            .ok_or_else(|| anyhow::anyhow!("no active chat"))?;
        if !window.can_send_message {
            self.notify(Notice::Error(
                "the messaging window for this conversation has closed".to_string(),
            ));
            anyhow::bail!("messaging window closed");
        }
        if draft.reply_to_message_id.is_some()
            && !self.channel_features().map(|f| f.replies).unwrap_or(false)
        {
            anyhow::bail!("channel does not support replies");
        }

        let temp_id = Uuid::new_v4().to_string();
        let entry = OptimisticMessage {
            id: temp_id.clone(),
            chat_id: chat_id.clone(),
            content: draft.content.clone(),
            attachments: draft.attachments.clone(),
            reply_to_message_id: draft.reply_to_message_id.clone(),
            status: OptimisticStatus::Pending,
            error_message: None,
            created_at: now,
        };
        if !self.tracker.add(entry, self.buffer.messages(), now) {
            debug!(%temp_id, "optimistic entry suppressed");
        }

        let request = SendRequest {
            chat_id,
            temp_id: temp_id.clone(),
            content: draft.content,
            reply_to_message_id: draft.reply_to_message_id,
            attachments,
        };
        if let Err(err) = self.actions.send_message(&request).await {
            self.fail_entry(&temp_id, &err).await;
        }
        Ok(temp_id)
    }

    /// Re-issues a failed send under the same tempId so a later push for
    /// it still correlates.
    pub async fn retry(
        &mut self,
        temp_id: &str,
        attachments: Vec<OutgoingAttachment>,
    ) -> anyhow::Result<()> {
        let entry = self
            .tracker
            .get(temp_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no tracked entry for {temp_id}"))?;
        if !entry.is_failed() {
            return Ok(());
        }

        self.tracker
            .mark_status(temp_id, OptimisticStatus::Pending, None);
        self.persist_failed_snapshot().await;

        let request = SendRequest {
            chat_id: entry.chat_id,
            temp_id: temp_id.to_string(),
            content: entry.content,
            reply_to_message_id: entry.reply_to_message_id,
            attachments,
        };
        if let Err(err) = self.actions.send_message(&request).await {
            self.fail_entry(temp_id, &err).await;
        }
        Ok(())
    }

    async fn fail_entry(&mut self, temp_id: &str, err: &ActionError) {
        let message = err.to_string();
        error!(%temp_id, error = %message, "send failed");
        self.tracker
            .mark_status(temp_id, OptimisticStatus::Failed, Some(message.clone()));
        self.persist_failed_snapshot().await;
        self.notify(Notice::Error(message));
    }

    /// User dismissed a local entry.
    pub async fn remove_local(&mut self, temp_id: &str) {
        if self.tracker.remove(temp_id) {
            self.persist_failed_snapshot().await;
        }
    }

    pub async fn delete_message(&mut self, message_id: &str) -> anyhow::Result<()> {
        if !self.channel_features().map(|f| f.delete).unwrap_or(false) {
            anyhow::bail!("channel does not support deleting messages");
        }
        if let Err(err) = self.actions.delete_message(message_id).await {
            self.notify(Notice::Error(err.to_string()));
            return Err(err.into());
        }
        Ok(())
    }

    /// Backfill one older page, preserving the visual anchor.
    pub async fn load_older(&mut self) -> anyhow::Result<()> {
        let chat_id = self.active_chat_id()?;
        if !self.has_more {
            return Ok(());
        }

        let anchor = scroll::capture(self.viewport.as_ref());
        match self
            .paginator
            .load_page(
                &chat_id,
                self.page + 1,
                LoadMode::Older,
                self.buffer.live_inserts(),
            )
            .await
        {
            Ok(Some(page)) => {
                self.buffer.merge_older(page.messages);
                self.page += 1;
                self.has_more = page.has_more;
                self.preserver.restore(self.viewport.as_ref(), &anchor).await;
            }
            Ok(None) => {}
            Err(err) => {
                error!(%chat_id, error = %err, "backfill failed");
                self.notify(Notice::Error("failed to load messages".to_string()));
            }
        }
        Ok(())
    }

    /// The host page became visible again.
    pub async fn on_visible(&mut self) -> anyhow::Result<()> {
        if self.chat.is_none() {
            return Ok(());
        }
        match self.monitor.on_visible().await {
            ResyncDecision::Trusted => Ok(()),
            ResyncDecision::Reload => self.force_resync().await,
        }
    }

    /// Full reset: the push feed may have dropped events, so nothing in
    /// the buffers can be trusted.
    pub async fn force_resync(&mut self) -> anyhow::Result<()> {
        let chat_id = self.active_chat_id()?;

        self.buffer.clear();
        self.tracker.clear();
        self.page = 1;
        self.has_more = false;
        self.unread_since_insert = 0;
        self.state = SessionState::Loading;

        match self
            .paginator
            .load_page(&chat_id, 1, LoadMode::Resync, 0)
            .await
        {
            Ok(Some(page)) => {
                self.buffer.seed(page.messages);
                self.has_more = page.has_more;
            }
            Ok(None) => {}
            Err(err) => {
                error!(%chat_id, error = %err, "resync load failed");
                self.notify(Notice::Error("failed to load messages".to_string()));
            }
        }

        match self.store.get_chat(&chat_id).await {
            Ok(Some(chat)) => self.chat = Some(chat),
            Ok(None) => {}
            Err(err) => warn!(%chat_id, error = %err, "chat refresh failed"),
        }

        self.state = SessionState::Ready;
        self.notify(Notice::Resynced);
        Ok(())
    }

    pub fn jump_to_latest(&mut self) {
        self.unread_since_insert = 0;
        self.notify(Notice::ScrollToLatest);
    }

    pub fn render(&self) -> Vec<DateGroup> {
        self.render_at(Utc::now())
    }

    pub fn render_at(&self, now: DateTime<Utc>) -> Vec<DateGroup> {
        let local = self.tracker.visible(self.buffer.messages(), now);
        build_render_model(self.buffer.messages(), local)
    }

    /// Every conversation this customer has on the active channel,
    /// grouped by originating chat.
    pub async fn load_customer_history(&mut self, append: bool) -> anyhow::Result<()> {
        let chat = self
            .chat
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no active chat"))?;
        let customer_id = chat
            .customer
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or_else(|| anyhow::anyhow!("chat has no resolved customer"))?;
        let channel_id = chat.channel.id.clone();

        let page = if append {
            self.cross_chat.as_ref().map(|v| v.page + 1).unwrap_or(1)
        } else {
            1
        };

        match self
            .paginator
            .load_customer_page(&customer_id, &channel_id, page)
            .await
        {
            Ok(Some(result)) => {
                let view = self.cross_chat.get_or_insert_with(|| CrossChatView {
                    customer_id,
                    channel_id,
                    page: 0,
                    has_more: false,
                    messages: Vec::new(),
                });
                if !append {
                    view.messages.clear();
                }
                for msg in result.messages {
                    if !view.messages.iter().any(|m| m.id == msg.id) {
                        view.messages.push(msg);
                    }
                }
                view.messages.sort_by_key(|m| m.created_at);
                view.page = page;
                view.has_more = result.has_more;
            }
            Ok(None) => {}
            Err(err) => {
                error!(%customer_id, error = %err, "customer history load failed");
                self.notify(Notice::Error("failed to load messages".to_string()));
            }
        }
        Ok(())
    }

    pub fn render_customer_history(&self) -> Vec<ChatBlock> {
        let Some(view) = self.cross_chat.as_ref() else {
            return Vec::new();
        };
        let active = self
            .chat
            .as_ref()
            .map(|c| c.id.clone())
            .unwrap_or_default();
        build_chat_blocks(&view.messages, &active)
    }

    pub fn customer_history_has_more(&self) -> bool {
        self.cross_chat.as_ref().map(|v| v.has_more).unwrap_or(false)
    }

    pub fn close_customer_history(&mut self) {
        self.cross_chat = None;
    }

    /// Adds the current agent to the conversation's collaborators.
    pub async fn join_chat(&mut self) -> anyhow::Result<()> {
        let chat_id = self.active_chat_id()?;
        if self
            .store
            .active_collaborator(&chat_id, &self.current_user_id)
            .await?
            .is_some()
        {
            return Ok(());
        }
        let collaborator = Collaborator {
            id: Uuid::new_v4().to_string(),
            chat_id,
            user_id: self.current_user_id.clone(),
            joined_at: Utc::now(),
            left_at: None,
        };
        self.store.upsert_collaborator(&collaborator).await?;
        Ok(())
    }

    pub async fn start_flow(&mut self, flow_id: &str) -> anyhow::Result<()> {
        let chat_id = self.active_chat_id()?;
        if let Err(err) = self.actions.start_flow(&chat_id, flow_id).await {
            self.notify(Notice::Error(err.to_string()));
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn pause_flow(&mut self) -> anyhow::Result<()> {
        let flow_session_id = self
            .chat
            .as_ref()
            .and_then(|c| c.flow_session_id.clone())
            .ok_or_else(|| anyhow::anyhow!("no running flow session"))?;
        if let Err(err) = self.actions.pause_flow(&flow_session_id).await {
            self.notify(Notice::Error(err.to_string()));
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn resolve_chat(
        &mut self,
        closure: ClosureKind,
        title: &str,
    ) -> anyhow::Result<()> {
        let chat_id = self.active_chat_id()?;
        if let Err(err) = self.actions.resolve_chat(&chat_id, closure, title).await {
            self.notify(Notice::Error(err.to_string()));
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn generate_summary(&mut self) -> anyhow::Result<String> {
        let chat_id = self.active_chat_id()?;
        match self.actions.generate_summary(&chat_id).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.notify(Notice::Error(err.to_string()));
                Err(err.into())
            }
        }
    }

    pub async fn send_template(
        &mut self,
        template_id: &str,
        variables: &serde_json::Value,
    ) -> anyhow::Result<()> {
        let chat_id = self.active_chat_id()?;
        let window = self
            .messaging_window_at(Utc::now())
            .ok_or_else(|| anyhow::anyhow!("no active chat"))?;
        if !window.can_send_template {
            anyhow::bail!("channel does not support templates");
        }
        if let Err(err) = self
            .actions
            .send_template(&chat_id, template_id, variables)
            .await
        {
            self.notify(Notice::Error(err.to_string()));
            return Err(err.into());
        }
        Ok(())
    }
}

fn extract_deleted_id(event: &PushEvent) -> Option<String> {
    event
        .row
        .get("id")
        .and_then(|v| v.as_str())
        .or_else(|| {
            event
                .old
                .as_ref()
                .and_then(|v| v.get("id"))
                .and_then(|v| v.as_str())
        })
        .map(str::to_string)
}

fn response_snapshot(message: &Message) -> ResponseSnapshot {
    ResponseSnapshot {
        id: message.id.clone(),
        content: message.content.clone(),
        kind: message.kind,
        sender_kind: message.sender_kind,
    }
}
