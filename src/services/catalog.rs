//! Catalog assembly and output rendering.

use anyhow::{Context, Result};
use chrono::{FixedOffset, Utc};
use std::path::Path;
use tracing::info;

use crate::config::PlaylistMode;
use crate::models::{Catalog, CatalogMetadata, ResolvedChannel};

/// Fixed disclaimer embedded in every catalog.
pub const DISCLAIMER: &str =
    "We do not host or serve any content. All content belongs to their respective owners.";

/// Catalog timestamps use a fixed UTC+6 offset.
const TIMESTAMP_OFFSET_HOURS: i32 = 6;

/// Assemble the final catalog: channels sorted ascending by persistent
/// number (regardless of resolution completion order), plus metadata.
pub fn build_catalog(mut resolved: Vec<ResolvedChannel>) -> Catalog {
    resolved.sort_by_key(|channel| channel.number);

    Catalog {
        metadata: CatalogMetadata {
            created: created_timestamp(),
            disclaimer: DISCLAIMER.to_string(),
        },
        channels: resolved,
    }
}

fn created_timestamp() -> String {
    let offset = FixedOffset::east_opt(TIMESTAMP_OFFSET_HOURS * 3600).expect("static offset");
    Utc::now()
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S GMT+6")
        .to_string()
}

/// Render the catalog as an extended M3U playlist.
pub fn render_m3u(catalog: &Catalog, mode: PlaylistMode) -> String {
    let mut out = String::from("#EXTM3U\n");

    for channel in &catalog.channels {
        let url = match (&channel.m3u8_url, mode) {
            (Some(url), _) => url.clone(),
            (None, PlaylistMode::All) => placeholder_url(channel.number),
            (None, PlaylistMode::ResolvedOnly) => continue,
        };

        out.push_str(&format!(
            "#EXTINF:-1 tvg-logo=\"{}\", {}\n{}\n",
            channel.logo, channel.name, url
        ));
    }

    out
}

/// Stand-in URL for channels without a resolved stream, derived from the
/// persistent number so players still show the channel slot.
fn placeholder_url(number: u32) -> String {
    format!("http://0.0.0.0/channel/{}.m3u8", number)
}

/// Write the catalog JSON and log aggregate resolution counts.
pub fn save_json(catalog: &Catalog, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(catalog).context("failed to serialize catalog")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write catalog {}", path.display()))?;

    let working = catalog.working_count();
    info!("catalog saved: {}", path.display());
    info!(
        "total channels: {} (working: {}, failed: {})",
        catalog.channels.len(),
        working,
        catalog.channels.len() - working
    );
    Ok(())
}

/// Write the M3U playlist.
pub fn save_m3u(catalog: &Catalog, mode: PlaylistMode, path: &Path) -> Result<()> {
    std::fs::write(path, render_m3u(catalog, mode))
        .with_context(|| format!("failed to write playlist {}", path.display()))?;
    info!("playlist saved: {}", path.display());
    Ok(())
}
