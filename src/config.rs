use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://103.144.89.251";
pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_DELAY_SECS: f64 = 0.1;

/// Browser-like user agent; the middleware server rejects obvious bots.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Substrings that mark an extracted URL as a page asset rather than a
/// stream. Kept as data so the blocklist can be tuned without touching the
/// heuristic table.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["css", "js", "icon", "logo", "image"];

/// How unresolved channels appear in the M3U output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlaylistMode {
    /// Only channels with a resolved stream URL
    ResolvedOnly,
    /// Every channel; unresolved ones get a placeholder URL
    All,
}

/// Runtime configuration assembled from CLI flags.
///
/// All tunables are passed explicitly; nothing is read from the
/// environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    /// Local listing file; when present and readable, the listing fetch is
    /// skipped.
    pub html_file: Option<PathBuf>,
    pub json_out: PathBuf,
    pub m3u_out: PathBuf,
    pub mapping_file: PathBuf,
    /// Whether to resolve per-channel stream URLs over the network.
    pub fetch_urls: bool,
    /// Courtesy delay after the resolution pool drains, in seconds.
    pub delay_secs: f64,
    pub workers: usize,
    pub timeout_secs: u64,
    pub playlist_mode: PlaylistMode,
    pub user_agent: String,
    pub exclusions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            html_file: None,
            json_out: PathBuf::from("channels.json"),
            m3u_out: PathBuf::from("playlist.m3u"),
            mapping_file: PathBuf::from("channel_mapping.json"),
            fetch_urls: true,
            delay_secs: DEFAULT_DELAY_SECS,
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            playlist_mode: PlaylistMode::ResolvedOnly,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
