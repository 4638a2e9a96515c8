use serde::{Deserialize, Serialize};

/// A channel entry parsed from the listing page, before resolution.
///
/// The stream token is the server's own numbering and shifts between runs;
/// it is only ever used to build the per-channel player request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub name: String,
    pub logo: String,
    pub stream_token: String,
}

/// A channel with its persistent catalog number and resolution outcome.
///
/// `m3u8_url` being `None` is a normal terminal state (the player page was
/// unreachable or had no recognizable stream URL), serialized as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChannel {
    pub number: u32,
    pub name: String,
    pub stream_id: String,
    pub logo: String,
    pub m3u8_url: Option<String>,
}

/// Metadata block written at the top of the catalog JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub created: String,
    pub disclaimer: String,
}

/// The final channel catalog, ordered ascending by persistent number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "_metadata")]
    pub metadata: CatalogMetadata,
    pub channels: Vec<ResolvedChannel>,
}

impl Catalog {
    /// Number of channels with a resolved stream URL.
    pub fn working_count(&self) -> usize {
        self.channels.iter().filter(|c| c.m3u8_url.is_some()).count()
    }
}
