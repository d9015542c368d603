use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::channel::config::Provider;
use crate::util;

use super::capture::{CaptureBudget, CaptureSession, CapturedUrl, PLAY_SELECTORS};

/// A stream-manifest URL captured during a session.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub captured_at: DateTime<Utc>,
}

/// How much trust the selected record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Met the freshness threshold, or carries no parseable expiry.
    Fresh,
    /// Fallback pick; its token may already be expired.
    Degraded,
}

/// The record selected for a channel after a capture session.
#[derive(Debug, Clone)]
pub struct Selection {
    pub url: String,
    pub confidence: Confidence,
    pub expires_at: Option<DateTime<Utc>>,
}

/**
    Filter separating genuine stream-manifest URLs from the provider's
    token-metadata calls, which carry no usable manifest.
*/
pub struct UrlFilter {
    stream: Regex,
    metadata: Option<Regex>,
}

impl UrlFilter {
    pub fn from_provider(provider: &Provider) -> Result<Self> {
        Ok(Self {
            stream: Regex::new(&provider.stream_url)?,
            metadata: provider
                .metadata_url
                .as_deref()
                .map(Regex::new)
                .transpose()?,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        if let Some(metadata) = &self.metadata
            && metadata.is_match(url)
        {
            return false;
        }
        self.stream.is_match(url)
    }
}

/// Drive one capture session through the full wait budget, returning the
/// deduplicated stream-manifest candidates it emitted.
pub async fn run_capture<S: CaptureSession>(
    session: &mut S,
    player_url: &str,
    filter: &UrlFilter,
    budget: &CaptureBudget,
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();

    session.navigate(player_url, budget.navigate).await?;

    let burst = session.wait(budget.settle).await;
    absorb(&mut candidates, burst, filter);

    if session.try_click(PLAY_SELECTORS).await {
        let burst = session.wait(budget.after_click).await;
        absorb(&mut candidates, burst, filter);
    }

    let burst = session.wait(budget.tail).await;
    absorb(&mut candidates, burst, filter);

    Ok(candidates)
}

fn absorb(candidates: &mut Vec<Candidate>, burst: Vec<CapturedUrl>, filter: &UrlFilter) {
    for captured in burst {
        if filter.matches(&captured.url) && !candidates.iter().any(|c| c.url == captured.url) {
            println!(
                "[extract] Captured: {}...",
                &captured.url[..captured.url.len().min(80)]
            );
            candidates.push(Candidate {
                url: captured.url,
                captured_at: captured.captured_at,
            });
        }
    }
}

/// Pick the best candidate per the freshness policy.
///
/// Candidates whose path carries a preferred marker (DVR-capable or
/// variant-selectable) outrank plain ones. Within a rank, candidates
/// whose token expires sooner than `min_validity` are discarded (a token
/// about to expire is worse than no new information), while candidates
/// without a parseable expiry are kept. Ties go to the most recent
/// capture. If nothing survives, the most recent capture is returned with
/// degraded confidence.
pub fn select_best(
    candidates: &[Candidate],
    preferred_paths: &[String],
    now: DateTime<Utc>,
    min_validity: Duration,
) -> Option<Selection> {
    if candidates.is_empty() {
        return None;
    }

    let is_fresh = |candidate: &&Candidate| match expires_at(&candidate.url) {
        Some(expiry) => (expiry - now).num_seconds() >= min_validity.as_secs() as i64,
        None => true,
    };
    let is_preferred = |candidate: &Candidate| {
        preferred_paths
            .iter()
            .any(|marker| candidate.url.contains(marker.as_str()))
    };

    for want_preferred in [true, false] {
        let pick = candidates
            .iter()
            .filter(|c| is_preferred(c) == want_preferred)
            .filter(is_fresh)
            .max_by_key(|c| c.captured_at);

        if let Some(candidate) = pick {
            return Some(Selection {
                url: candidate.url.clone(),
                confidence: Confidence::Fresh,
                expires_at: expires_at(&candidate.url),
            });
        }
    }

    // Nothing meets the freshness threshold; hand out the most recent
    // capture anyway so the channel keeps working a little longer.
    let fallback = candidates.iter().max_by_key(|c| c.captured_at)?;
    Some(Selection {
        url: fallback.url.clone(),
        confidence: Confidence::Degraded,
        expires_at: expires_at(&fallback.url),
    })
}

/// Parse the expiry timestamp embedded in a captured URL's query string.
pub fn expires_at(url: &str) -> Option<DateTime<Utc>> {
    let query = url.split_once('?')?.1;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("expires=") {
            return util::time::parse_timestamp(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use chrono::TimeZone;

    use super::*;

    /// Replays a scripted sequence of captured URL bursts, one per wait.
    struct ScriptedSession {
        bursts: VecDeque<Vec<CapturedUrl>>,
        navigated: Vec<String>,
        has_play_control: bool,
    }

    impl ScriptedSession {
        fn new(bursts: Vec<Vec<CapturedUrl>>, has_play_control: bool) -> Self {
            Self {
                bursts: bursts.into(),
                navigated: Vec::new(),
                has_play_control,
            }
        }
    }

    impl CaptureSession for ScriptedSession {
        async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
            self.navigated.push(url.to_string());
            Ok(())
        }

        async fn wait(&mut self, _duration: Duration) -> Vec<CapturedUrl> {
            self.bursts.pop_front().unwrap_or_default()
        }

        async fn try_click(&mut self, _selectors: &[&str]) -> bool {
            self.has_play_control
        }

        async fn close(self) -> Result<()> {
            Ok(())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_770_000_000 + secs, 0).unwrap()
    }

    fn captured(url: &str, secs: i64) -> CapturedUrl {
        CapturedUrl {
            url: url.to_string(),
            captured_at: at(secs),
        }
    }

    fn candidate(url: &str, secs: i64) -> Candidate {
        Candidate {
            url: url.to_string(),
            captured_at: at(secs),
        }
    }

    fn snrt_filter() -> UrlFilter {
        UrlFilter {
            stream: Regex::new(r"cdn\.live\.easybroadcast\.io/.*\.m3u8").unwrap(),
            metadata: Some(Regex::new(r"token\.easybroadcast\.io").unwrap()),
        }
    }

    fn dvr_markers() -> Vec<String> {
        vec!["playlist_dvr".to_string(), "hls_variant".to_string()]
    }

    #[tokio::test]
    async fn test_run_capture_filters_metadata_family() {
        let mut session = ScriptedSession::new(
            vec![
                vec![
                    captured("https://token.easybroadcast.io/auth/73_x.m3u8", 0),
                    captured("https://cdn.live.easybroadcast.io/abr/x/playlist_dvr.m3u8?token=T", 1),
                ],
                vec![captured("https://snrtlive.ma/fr/page.html", 2)],
            ],
            false,
        );

        let candidates = run_capture(
            &mut session,
            "https://player.example/events/x",
            &snrt_filter(),
            &CaptureBudget::default(),
        )
        .await
        .unwrap();

        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].url.contains("playlist_dvr"));
        assert_eq!(session.navigated, ["https://player.example/events/x"]);
    }

    #[tokio::test]
    async fn test_run_capture_dedupes_and_keeps_click_burst() {
        let url = "https://cdn.live.easybroadcast.io/abr/x/playlist_dvr.m3u8?token=T";
        let late = "https://cdn.live.easybroadcast.io/abr/x/chunk_720.m3u8?token=T";
        let mut session = ScriptedSession::new(
            vec![
                vec![captured(url, 0)],
                vec![captured(url, 5), captured(late, 6)],
            ],
            true,
        );

        let candidates = run_capture(
            &mut session,
            "https://player.example/events/x",
            &snrt_filter(),
            &CaptureBudget::default(),
        )
        .await
        .unwrap();

        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, [url, late]);
        // Dedupe keeps the first capture time.
        assert_eq!(candidates[0].captured_at, at(0));
    }

    #[test]
    fn test_selection_empty_yields_none() {
        assert!(select_best(&[], &dvr_markers(), at(0), Duration::from_secs(1800)).is_none());
    }

    #[test]
    fn test_selection_prefers_dvr_marker_over_later_expiry() {
        // now+50 is below the threshold and must be rejected; the DVR-path
        // candidate without a parseable expiry outranks the plain now+500.
        let now = at(0);
        let candidates = [
            candidate(&format!("https://c/live/plain.m3u8?expires={}", now.timestamp() + 50), 0),
            candidate(&format!("https://c/live/other.m3u8?expires={}", now.timestamp() + 500), 1),
            candidate("https://c/live/playlist_dvr.m3u8?token=T", 2),
        ];

        let selected =
            select_best(&candidates, &dvr_markers(), now, Duration::from_secs(120)).unwrap();
        assert_eq!(selected.url, "https://c/live/playlist_dvr.m3u8?token=T");
        assert_eq!(selected.confidence, Confidence::Fresh);
    }

    #[test]
    fn test_selection_discards_below_threshold() {
        let now = at(0);
        let stale = format!(
            "https://c/live/playlist_dvr.m3u8?expires={}",
            now.timestamp() + 600
        );
        let fresh = format!(
            "https://c/live/playlist_dvr.m3u8?v=2&expires={}",
            now.timestamp() + 7200
        );
        let candidates = [candidate(&stale, 5), candidate(&fresh, 0)];

        let selected =
            select_best(&candidates, &dvr_markers(), now, Duration::from_secs(1800)).unwrap();
        assert_eq!(selected.url, fresh);
        assert_eq!(selected.confidence, Confidence::Fresh);
        assert_eq!(
            selected.expires_at.unwrap().timestamp(),
            now.timestamp() + 7200
        );
    }

    #[test]
    fn test_selection_tie_breaks_by_recency() {
        let now = at(0);
        let older = format!(
            "https://c/live/playlist_dvr.m3u8?expires={}",
            now.timestamp() + 7200
        );
        let newer = format!(
            "https://c/live/playlist_dvr.m3u8?v=2&expires={}",
            now.timestamp() + 7200
        );
        let candidates = [candidate(&older, 0), candidate(&newer, 10)];

        let selected =
            select_best(&candidates, &dvr_markers(), now, Duration::from_secs(1800)).unwrap();
        assert_eq!(selected.url, newer);
    }

    #[test]
    fn test_selection_falls_back_degraded_when_all_stale() {
        let now = at(0);
        let first = format!(
            "https://c/live/playlist_dvr.m3u8?expires={}",
            now.timestamp() + 60
        );
        let last = format!(
            "https://c/live/playlist_dvr.m3u8?v=2&expires={}",
            now.timestamp() + 120
        );
        let candidates = [candidate(&first, 0), candidate(&last, 9)];

        let selected =
            select_best(&candidates, &dvr_markers(), now, Duration::from_secs(1800)).unwrap();
        assert_eq!(selected.url, last);
        assert_eq!(selected.confidence, Confidence::Degraded);
    }

    #[test]
    fn test_expires_at_parses_query_parameter() {
        let url = "https://c/live/playlist_dvr.m3u8?token=T&expires=1770526800&token_path=%2Fabr%2F";
        assert_eq!(expires_at(url).unwrap().timestamp(), 1770526800);

        assert!(expires_at("https://c/live/playlist_dvr.m3u8").is_none());
        assert!(expires_at("https://c/live/playlist_dvr.m3u8?token=T").is_none());
        assert!(expires_at("https://c/p.m3u8?expires=soon").is_none());
    }
}
