use crate::config::ScrollConfig;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Seam to the embedder's scroll container. Offsets are pixels from the
/// container's top edge; entries are addressed by their `message-<id>`
/// element identity.
pub trait Viewport: Send + Sync {
    fn first_visible(&self) -> Option<String>;
    fn offset_of(&self, dom_id: &str) -> Option<f64>;
    fn scroll_height(&self) -> f64;
    fn scroll_top(&self) -> f64;
    fn set_scroll_top(&self, value: f64);
    fn distance_to_bottom(&self) -> f64;
    fn force_reflow(&self);
}

#[derive(Debug, Clone)]
pub struct ScrollAnchor {
    pub dom_id: Option<String>,
    pub offset: f64,
    pub scroll_height: f64,
    pub scroll_top: f64,
}

/// Measure the reference element before the buffer mutation lands.
pub fn capture(viewport: &dyn Viewport) -> ScrollAnchor {
    let dom_id = viewport.first_visible();
    let offset = dom_id
        .as_deref()
        .and_then(|id| viewport.offset_of(id))
        .unwrap_or(0.0);
    ScrollAnchor {
        dom_id,
        offset,
        scroll_height: viewport.scroll_height(),
        scroll_top: viewport.scroll_top(),
    }
}

pub struct ScrollPreserver {
    max_retries: u32,
    retry_base: Duration,
    min_settled_top: f64,
    embedded_webview: bool,
}

impl ScrollPreserver {
    pub fn new(config: &ScrollConfig, embedded_webview: bool) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
            min_settled_top: config.min_settled_top,
            embedded_webview,
        }
    }

    /// Relocates the anchor after the view re-rendered and compensates
    /// `scrollTop` so the visual reference does not jump. Embedded mobile
    /// webviews settle layout asynchronously, so the adjustment is retried
    /// on an increasing delay there.
    pub async fn restore(&self, viewport: &dyn Viewport, anchor: &ScrollAnchor) {
        self.apply(viewport, anchor);

        if !self.embedded_webview {
            return;
        }

        for attempt in 1..=self.max_retries {
            sleep(self.retry_base * attempt).await;
            viewport.force_reflow();
            self.apply(viewport, anchor);
            if viewport.scroll_top() > self.min_settled_top {
                debug!(attempt, "scroll position settled");
                break;
            }
        }
    }

    fn apply(&self, viewport: &dyn Viewport, anchor: &ScrollAnchor) {
        let adjusted = anchor
            .dom_id
            .as_deref()
            .and_then(|id| viewport.offset_of(id))
            .map(|new_offset| anchor.scroll_top + (new_offset - anchor.offset));

        match adjusted {
            Some(top) => viewport.set_scroll_top(top),
            None => {
                // Anchor fell out of the view (virtualization); compensate
                // by the raw growth in total scroll height.
                let growth = viewport.scroll_height() - anchor.scroll_height;
                viewport.set_scroll_top(anchor.scroll_top + growth);
            }
        }
    }
}

/// User-agent heuristics for embedded mobile webviews, whose layout
/// engines report scroll geometry late.
pub fn is_embedded_webview(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    ua.contains("; wv)")
        || ua.contains("webview")
        || ua.contains("fb_iab")
        || ua.contains("fban")
        || ua.contains("fbav")
        || ua.contains("instagram")
        || ua.contains("line/")
        || (ua.contains("iphone") && !ua.contains("safari/"))
}
