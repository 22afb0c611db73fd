use crate::types::{ChannelKind, Chat};
use chrono::{DateTime, Duration, Utc};

pub const MESSAGING_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFeatures {
    pub replies: bool,
    pub audio: bool,
    pub templates: bool,
    pub delete: bool,
    pub edit: bool,
}

pub fn channel_features(kind: ChannelKind) -> ChannelFeatures {
    match kind {
        ChannelKind::WhatsappUnofficial => ChannelFeatures {
            replies: true,
            audio: true,
            templates: false,
            delete: true,
            edit: true,
        },
        ChannelKind::WhatsappOfficial => ChannelFeatures {
            replies: true,
            audio: true,
            templates: true,
            delete: false,
            edit: false,
        },
        ChannelKind::Instagram => ChannelFeatures {
            replies: true,
            audio: false,
            templates: false,
            delete: false,
            edit: false,
        },
        ChannelKind::Facebook => ChannelFeatures {
            replies: true,
            audio: true,
            templates: false,
            delete: false,
            edit: false,
        },
    }
}

pub fn is_window_limited(kind: ChannelKind) -> bool {
    matches!(
        kind,
        ChannelKind::Instagram | ChannelKind::Facebook | ChannelKind::WhatsappOfficial
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagingWindow {
    pub window_limited: bool,
    pub window_closed: bool,
    pub can_send_message: bool,
    pub can_send_template: bool,
}

// Recomputed per render; the window is a wall-clock comparison, not a timer.
pub fn messaging_window(chat: &Chat, now: DateTime<Utc>) -> MessagingWindow {
    let features = channel_features(chat.channel.kind);
    let window_limited = is_window_limited(chat.channel.kind);

    let window_closed = if window_limited {
        match chat.last_customer_message_at {
            Some(last) => now - last > Duration::hours(MESSAGING_WINDOW_HOURS),
            None => true,
        }
    } else {
        false
    };

    MessagingWindow {
        window_limited,
        window_closed,
        can_send_message: !window_closed,
        can_send_template: features.templates,
    }
}
