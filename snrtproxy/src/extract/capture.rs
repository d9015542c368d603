use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// A network request URL observed during a capture session.
#[derive(Debug, Clone)]
pub struct CapturedUrl {
    pub url: String,
    pub captured_at: DateTime<Utc>,
}

/// Play-control selectors tried, in order, once the page has settled.
pub const PLAY_SELECTORS: &[&str] = &[
    "button[aria-label*=\"play\"]",
    "button.play",
    "[class*=\"play-button\"]",
    "button[title*=\"Play\"]",
    ".vjs-big-play-button",
];

/// Wait budget for one capture session.
#[derive(Debug, Clone, Copy)]
pub struct CaptureBudget {
    /// Maximum time for the initial navigation. A timeout is tolerated;
    /// the stream may start loading anyway.
    pub navigate: Duration,
    /// Settle time after navigation before looking for a play control.
    pub settle: Duration,
    /// Extra wait after a successful play click.
    pub after_click: Duration,
    /// Final window for the stream to start emitting requests.
    pub tail: Duration,
}

impl Default for CaptureBudget {
    fn default() -> Self {
        Self {
            navigate: Duration::from_secs(45),
            settle: Duration::from_secs(25),
            after_click: Duration::from_secs(5),
            tail: Duration::from_secs(20),
        }
    }
}

/**
    One page-rendering session that emits network requests as a side
    effect of loading a player.

    The extraction driver only needs these four capabilities, which keeps
    the capture/selection logic testable against a scripted fake session.
*/
pub trait CaptureSession {
    /// Navigate to a URL, waiting at most `timeout` for the load.
    /// Best-effort: a slow page is not an error.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait for `duration`, returning every request URL observed while
    /// waiting.
    async fn wait(&mut self, duration: Duration) -> Vec<CapturedUrl>;

    /// Find and click a play control, trying `selectors` in order.
    /// Returns whether anything was clicked.
    async fn try_click(&mut self, selectors: &[&str]) -> bool;

    /// Tear the session down.
    async fn close(self) -> Result<()>;
}
