//! Persistent channel-number registry.
//!
//! Maps channel display names to catalog numbers that never change across
//! runs, even as the server renumbers its own streams. New names get the
//! next number above the current maximum; names are never removed, so
//! numbers are never reused.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// Name → persistent-number mapping, loaded once at startup and mutated only
/// during the single-threaded parse phase. A second process writing the same
/// mapping file concurrently is not supported.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    map: HashMap<String, u32>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the mapping file. A missing or corrupt file is not an error:
    /// the registry starts empty and the problem is logged.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                info!("no existing channel mapping at {}, starting fresh", path.display());
                return Self::new();
            }
        };

        match parse_mapping(&raw) {
            Some(map) => {
                info!("loaded {} existing channel mappings", map.len());
                Self { map }
            }
            None => {
                warn!("could not parse channel mapping {}, starting fresh", path.display());
                Self::new()
            }
        }
    }

    /// Return the persistent number for `name`, assigning the next free one
    /// on first sight. Must be called in listing order before resolution, so
    /// that brand-new names claim numbers deterministically.
    pub fn lookup_or_assign(&mut self, name: &str) -> u32 {
        if let Some(&number) = self.map.get(name) {
            return number;
        }

        let next = self.map.values().copied().max().unwrap_or(0) + 1;
        self.map.insert(name.to_string(), next);
        next
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Write the full mapping snapshot. Values are encoded as decimal
    /// strings for compatibility with older mapping files.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot: BTreeMap<&str, String> = self
            .map
            .iter()
            .map(|(name, number)| (name.as_str(), number.to_string()))
            .collect();

        let json = serde_json::to_string_pretty(&snapshot)
            .context("failed to serialize channel mapping")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write channel mapping {}", path.display()))?;

        info!("channel mapping saved ({} channels)", self.map.len());
        Ok(())
    }
}

/// Parse the mapping file, tolerating values stored either as JSON numbers
/// or as decimal strings. Entries with an unusable value are skipped.
fn parse_mapping(raw: &str) -> Option<HashMap<String, u32>> {
    let object: serde_json::Map<String, Value> = serde_json::from_str(raw).ok()?;

    let mut map = HashMap::with_capacity(object.len());
    for (name, value) in object {
        let number = match &value {
            Value::String(s) => s.trim().parse::<u32>().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            _ => None,
        };
        match number {
            Some(number) => {
                map.insert(name, number);
            }
            None => warn!("skipping mapping entry {:?} with unusable value {}", name, value),
        }
    }
    Some(map)
}
