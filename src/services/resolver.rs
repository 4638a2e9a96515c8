//! Per-channel stream URL resolution.
//!
//! One GET against the channel's player page, then an ordered set of
//! extraction heuristics over whatever the server happened to return.
//! Transport failures and unmatchable bodies are expected noise under an
//! unstable origin, so the result is an `Option`, never an error.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::listing::absolutize;

lazy_static! {
    /// Ordered extraction heuristics; the first one with a qualifying match
    /// wins. Each encodes a distinct structural assumption about where a
    /// playable URL can appear in a player page.
    static ref STREAM_PATTERNS: Vec<Regex> = vec![
        // m3u8 in a plain src attribute
        Regex::new(r#"(?i)src=["']([^"']*\.m3u8[^"']*)["']"#).unwrap(),
        // HLS.js-style configuration field
        Regex::new(r#"(?i)src\s*:\s*["']([^"']*\.m3u8[^"']*)["']"#).unwrap(),
        // Video.js <source> tag
        Regex::new(r#"(?i)<source[^>]+src=["']([^"']*\.m3u8[^"']*)["']"#).unwrap(),
        // any quoted m3u8 token
        Regex::new(r#"(?i)["']([^"']*\.m3u8[^"']*)["']"#).unwrap(),
        // unquoted bare URL
        Regex::new(r#"(?i)(https?://[^<>\s]+\.m3u8[^<>\s]*)"#).unwrap(),
        // data-attribute variant
        Regex::new(r#"(?i)data-src=["']([^"']*\.m3u8[^"']*)["']"#).unwrap(),
        // embedded frame source
        Regex::new(r#"(?i)<iframe[^>]+src=["']([^"']*)["'][^>]*>"#).unwrap(),
    ];

    /// Last-resort frame reference when no heuristic qualified.
    static ref IFRAME_SRC: Regex =
        Regex::new(r#"<iframe[^>]+src=["']([^"']+)["']"#).unwrap();
}

/// Resolves stream tokens to playable URLs via the per-channel player page.
///
/// The client is shared (cloned) across all concurrent resolution tasks and
/// carries the per-request timeout.
pub struct StreamResolver {
    client: Client,
    base: Url,
    exclusions: Vec<String>,
}

impl StreamResolver {
    pub fn new(client: Client, base: Url, exclusions: Vec<String>) -> Self {
        Self {
            client,
            base,
            exclusions,
        }
    }

    /// Player endpoint for a stream token.
    pub fn player_url(&self, token: &str) -> String {
        format!(
            "{}/player.php?stream={}",
            self.base.as_str().trim_end_matches('/'),
            token
        )
    }

    /// Single resolution attempt, no retries. Any transport failure,
    /// timeout, or non-success status yields `None`.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        let response = match self.client.get(self.player_url(token)).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(token, "player request failed: {}", err);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(token, status = %response.status(), "player page returned non-success");
            return None;
        }

        let body = response.text().await.ok()?;
        extract_stream_url(&body, &self.base, &self.exclusions)
    }
}

/// Scan a player page body for a playable stream URL.
///
/// Within the winning heuristic, candidates that fail the stream-likeness
/// filter or hit the exclusion list are skipped and scanning continues; the
/// iframe fallback at the end takes whatever frame reference exists.
pub fn extract_stream_url(body: &str, base: &Url, exclusions: &[String]) -> Option<String> {
    for pattern in STREAM_PATTERNS.iter() {
        for caps in pattern.captures_iter(body) {
            let Some(candidate) = caps.get(1) else {
                continue;
            };
            let candidate = candidate.as_str();
            let lower = candidate.to_ascii_lowercase();

            if !(lower.contains(".m3u8") || lower.contains("stream") || lower.starts_with("http")) {
                continue;
            }

            let url = absolutize(candidate, base);
            if is_excluded(&url, exclusions) {
                continue;
            }
            return Some(url);
        }
    }

    // Nothing qualified; fall back to any embedded frame.
    if let Some(src) = IFRAME_SRC.captures(body).and_then(|caps| caps.get(1)) {
        return Some(absolutize(src.as_str(), base));
    }

    None
}

fn is_excluded(url: &str, exclusions: &[String]) -> bool {
    let lower = url.to_ascii_lowercase();
    exclusions.iter().any(|fragment| lower.contains(fragment))
}
