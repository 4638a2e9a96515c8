//! IPTV channel catalog scraper.
//!
//! Extracts channel metadata from an IPTV middleware listing page, resolves
//! each channel's live stream URL through its player endpoint, and writes a
//! JSON catalog plus an M3U playlist. Channels keep persistent catalog
//! numbers across runs via an on-disk name→number mapping.

mod config;
mod models;
mod services;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use crate::config::{Config, PlaylistMode};
use crate::models::{ChannelRecord, ResolvedChannel};
use crate::services::{catalog, fanout, listing, registry::ChannelRegistry, resolver::StreamResolver};

/// Scrape channel metadata and m3u8 stream URLs from an IPTV listing page
#[derive(Parser, Debug)]
#[command(name = "iptv-scraper", version, about)]
struct Args {
    /// Base URL of the streaming server
    #[arg(long, default_value = config::DEFAULT_BASE_URL)]
    url: String,

    /// Local listing HTML file (skips fetching the listing when it exists)
    #[arg(long)]
    html: Option<PathBuf>,

    /// Output JSON catalog path
    #[arg(long, default_value = "channels.json")]
    json: PathBuf,

    /// Output M3U playlist path
    #[arg(long, default_value = "playlist.m3u")]
    m3u: PathBuf,

    /// Persistent channel-number mapping file
    #[arg(long, default_value = "channel_mapping.json")]
    mapping: PathBuf,

    /// Skip resolving m3u8 URLs (metadata only)
    #[arg(long)]
    no_fetch: bool,

    /// Delay after the resolution pool drains, in seconds
    #[arg(long, default_value_t = config::DEFAULT_DELAY_SECS)]
    delay: f64,

    /// Number of concurrent resolution workers
    #[arg(long, default_value_t = config::DEFAULT_WORKERS)]
    workers: usize,

    /// Per-request timeout for resolution, in seconds
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// How unresolved channels appear in the playlist
    #[arg(long, value_enum, default_value_t = PlaylistMode::ResolvedOnly)]
    playlist_mode: PlaylistMode,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            base_url: args.url.trim_end_matches('/').to_string(),
            html_file: args.html,
            json_out: args.json,
            m3u_out: args.m3u,
            mapping_file: args.mapping,
            fetch_urls: !args.no_fetch,
            delay_secs: args.delay,
            workers: args.workers,
            timeout_secs: args.timeout,
            playlist_mode: args.playlist_mode,
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_scraper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from(Args::parse());
    run(config).await
}

/// Full pipeline: obtain listing → parse → assign numbers → save registry →
/// resolve → write artifacts.
///
/// The only fatal failure is an unobtainable listing; resolution failures
/// are recorded per channel and never affect the exit status.
async fn run(config: Config) -> Result<()> {
    let base = Url::parse(&config.base_url)
        .with_context(|| format!("invalid base URL {}", config.base_url))?;

    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .build()
        .context("failed to create HTTP client")?;

    let mut registry = ChannelRegistry::load(&config.mapping_file);

    let html = listing::obtain_listing(&client, &config.base_url, config.html_file.as_deref())
        .await
        .context("listing document is inaccessible")?;
    let html = listing::unwrap_view_source(&html);
    let records = listing::parse_listing(&html, &base);

    // Persistent numbers are assigned in listing order so brand-new names
    // claim slots deterministically; the registry snapshot goes to disk
    // before any network resolution starts.
    let numbered: Vec<(u32, ChannelRecord)> = records
        .into_iter()
        .map(|record| (registry.lookup_or_assign(&record.name), record))
        .collect();
    if let Err(err) = registry.save(&config.mapping_file) {
        warn!("could not save channel mapping: {:#}", err);
    }

    let resolved = if config.fetch_urls {
        info!("resolving stream URLs with {} workers", config.workers);
        let resolver = StreamResolver::new(client.clone(), base.clone(), config.exclusions.clone());
        let resolver = &resolver;
        let resolved = fanout::resolve_all(numbered, config.workers, |token| async move {
            resolver.resolve(&token).await
        })
        .await;

        if config.delay_secs > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(config.delay_secs)).await;
        }
        resolved
    } else {
        info!("resolution disabled, writing metadata only");
        numbered
            .into_iter()
            .map(|(number, record)| ResolvedChannel {
                number,
                name: record.name,
                stream_id: record.stream_token,
                logo: record.logo,
                m3u8_url: None,
            })
            .collect()
    };

    let catalog = catalog::build_catalog(resolved);
    catalog::save_json(&catalog, &config.json_out)?;
    catalog::save_m3u(&catalog, config.playlist_mode, &config.m3u_out)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <ul>
          <li class="All">
            <a class="channel" onclick="play('player.php?stream=10')">
              <img alt="A" src="/logos/a.png">
            </a>
          </li>
          <li class="All">
            <a class="channel" onclick="play('player.php?stream=20')">
              <img alt="B" src="/logos/b.png">
            </a>
          </li>
        </ul>
    "#;

    #[tokio::test]
    async fn end_to_end_with_resolution_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let listing_path = dir.path().join("listing.html");
        std::fs::write(&listing_path, LISTING).unwrap();

        let config = Config {
            html_file: Some(listing_path),
            json_out: dir.path().join("channels.json"),
            m3u_out: dir.path().join("playlist.m3u"),
            mapping_file: dir.path().join("channel_mapping.json"),
            fetch_urls: false,
            playlist_mode: PlaylistMode::All,
            ..Config::default()
        };
        run(config.clone()).await.unwrap();

        let catalog: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config.json_out).unwrap()).unwrap();
        assert_eq!(catalog["channels"][0]["number"], 1);
        assert_eq!(catalog["channels"][0]["name"], "A");
        assert_eq!(catalog["channels"][0]["stream_id"], "10");
        assert!(catalog["channels"][0]["m3u8_url"].is_null());
        assert_eq!(catalog["channels"][1]["number"], 2);
        assert_eq!(catalog["channels"][1]["name"], "B");

        let mapping: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config.mapping_file).unwrap()).unwrap();
        assert_eq!(mapping, serde_json::json!({"A": "1", "B": "2"}));

        let playlist = std::fs::read_to_string(&config.m3u_out).unwrap();
        assert!(playlist.starts_with("#EXTM3U\n"));
        assert!(playlist.contains("http://0.0.0.0/channel/1.m3u8"));
    }

    #[tokio::test]
    async fn rerun_keeps_existing_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let listing_path = dir.path().join("listing.html");
        std::fs::write(&listing_path, LISTING).unwrap();
        // "B" already known as 1; "A" is new and must get 2.
        std::fs::write(
            dir.path().join("channel_mapping.json"),
            r#"{"B": "1"}"#,
        )
        .unwrap();

        let config = Config {
            html_file: Some(listing_path),
            json_out: dir.path().join("channels.json"),
            m3u_out: dir.path().join("playlist.m3u"),
            mapping_file: dir.path().join("channel_mapping.json"),
            fetch_urls: false,
            ..Config::default()
        };
        run(config.clone()).await.unwrap();

        let catalog: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config.json_out).unwrap()).unwrap();
        assert_eq!(catalog["channels"][0]["name"], "B");
        assert_eq!(catalog["channels"][0]["number"], 1);
        assert_eq!(catalog["channels"][1]["name"], "A");
        assert_eq!(catalog["channels"][1]["number"], 2);
    }

    #[tokio::test]
    async fn missing_listing_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            // No local file and an unreachable server.
            base_url: "http://127.0.0.1:9".to_string(),
            json_out: dir.path().join("channels.json"),
            m3u_out: dir.path().join("playlist.m3u"),
            mapping_file: dir.path().join("channel_mapping.json"),
            fetch_urls: false,
            ..Config::default()
        };
        assert!(run(config).await.is_err());
    }
}
