//! Listing page acquisition and parsing.
//!
//! The listing document is untrusted markup from a third-party middleware
//! server. It sometimes arrives as a browser "view-source" debug capture
//! (line-numbered table cells with escaped, syntax-highlighted content);
//! [`unwrap_view_source`] normalizes that before parsing proper.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::ChannelRecord;

lazy_static! {
    /// Stream token embedded in the activation anchor's onclick attribute.
    static ref STREAM_TOKEN: Regex = Regex::new(r"stream=(\d+)").unwrap();

    // View-source capture structure
    static ref LINE_CONTENT: Regex =
        Regex::new(r#"(?s)<td class="line-content">(.*?)</td>"#).unwrap();
    static ref HIGHLIGHT_SPAN: Regex = Regex::new(r"<span[^>]*>").unwrap();
    static ref RESOURCE_LINK: Regex =
        Regex::new(r#"<a class="html-attribute-value html-resource-link"[^>]*>"#).unwrap();
    static ref BR_TAG: Regex = Regex::new(r"<br>\n?").unwrap();
}

/// Failure to obtain the listing document at all. This is the only fatal
/// error class in the pipeline.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to read listing file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch listing page")]
    Fetch(#[from] reqwest::Error),
}

/// Obtain the raw listing document: a readable local file wins, otherwise
/// the base URL is fetched.
pub async fn obtain_listing(
    client: &Client,
    base_url: &str,
    local: Option<&Path>,
) -> Result<String, ListingError> {
    if let Some(path) = local {
        if path.exists() {
            info!("loading listing from {}", path.display());
            return std::fs::read_to_string(path).map_err(|source| ListingError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
        warn!("listing file {} not found, fetching instead", path.display());
    }

    info!("fetching listing from {}", base_url);
    let response = client.get(base_url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Best-effort recovery of raw HTML from a browser view-source capture.
///
/// Detection is deliberately loose (a `line-number` class plus a table);
/// anything else passes through untouched. Escaped entities are decoded,
/// syntax-highlight spans and the view-source resource-link anchors are
/// stripped, and `<br>` separators become newlines.
pub fn unwrap_view_source(html: &str) -> String {
    if !(html.contains("line-number") && html.contains("<table>")) {
        return html.to_string();
    }

    let lines: Vec<&str> = LINE_CONTENT
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if lines.is_empty() {
        return html.to_string();
    }

    let mut raw = lines.join("\n");
    raw = raw
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&");
    raw = HIGHLIGHT_SPAN.replace_all(&raw, "").into_owned();
    raw = raw.replace("</span>", "");
    // Only the view-source formatting anchors; real <a> tags were escaped.
    raw = RESOURCE_LINK.replace_all(&raw, "").into_owned();
    raw = raw.replace("</a>", "");
    raw = BR_TAG.replace_all(&raw, "\n").into_owned();

    info!("unwrapped view-source capture ({} bytes)", raw.len());
    raw
}

/// Parse the listing document into channel records, in document order.
///
/// Channel entries are `<li>` elements carrying the `All` class token, with
/// an `<a class="channel">` activation anchor whose `onclick` embeds the
/// stream token. Entries without a recognizable token are non-channel noise
/// and are skipped silently; other per-entry problems never abort the parse.
pub fn parse_listing(html: &str, base: &Url) -> Vec<ChannelRecord> {
    let document = Html::parse_document(html);
    let item_selector = Selector::parse("li.All").expect("static selector");
    let anchor_selector = Selector::parse("a.channel").expect("static selector");
    let image_selector = Selector::parse("img").expect("static selector");

    let mut records = Vec::new();
    for item in document.select(&item_selector) {
        match parse_entry(&item, &anchor_selector, &image_selector, base) {
            Some(record) => records.push(record),
            None => debug!("skipping listing entry without a stream token"),
        }
    }

    info!("found {} channels in listing", records.len());
    records
}

fn parse_entry(
    item: &ElementRef,
    anchor_selector: &Selector,
    image_selector: &Selector,
    base: &Url,
) -> Option<ChannelRecord> {
    let anchor = item.select(anchor_selector).next()?;
    let onclick = anchor.value().attr("onclick")?;
    let token = STREAM_TOKEN.captures(onclick)?.get(1)?.as_str().to_string();

    let image = item.select(image_selector).next();
    let name = image
        .and_then(|img| img.value().attr("alt"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Channel {}", token));
    let logo = image
        .and_then(|img| img.value().attr("src"))
        .map(|src| absolutize(src, base))
        .unwrap_or_default();

    Some(ChannelRecord {
        name,
        logo,
        stream_token: token,
    })
}

/// Resolve a possibly-relative reference against the server base address.
pub fn absolutize(reference: &str, base: &Url) -> String {
    if reference.starts_with("http") {
        return reference.to_string();
    }
    base.join(reference)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| reference.to_string())
}
