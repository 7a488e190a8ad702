//! Station feed ingestion.
//!
//! The station document is the GBFS-style `{"data": {"stations": [...]}}`
//! JSON published alongside the monthly trip exports. Only the identity and
//! coordinate fields are required; everything else the publisher includes is
//! ignored.

use anyhow::{Context, Result};
use serde::de::{self, Deserialize, Deserializer};

/// A fixed dock location, identified by its short code.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Station {
    pub short_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(deserialize_with = "deserialize_coord")]
    pub lon: f64,
    #[serde(deserialize_with = "deserialize_coord")]
    pub lat: f64,
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl Station {
    /// Human-facing label: the full name when the feed carries one, the
    /// short code otherwise.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.short_name)
    }
}

#[derive(serde::Deserialize)]
struct StationFeed {
    data: StationData,
}

#[derive(serde::Deserialize)]
struct StationData {
    stations: Vec<Station>,
}

/// Parses the `{data: {stations: [...]}}` station document.
pub fn parse_station_feed(bytes: &[u8]) -> Result<Vec<Station>> {
    let feed: StationFeed = serde_json::from_slice(bytes)
        .context("station feed is not a {data: {stations: [...]}} JSON document")?;
    Ok(feed.data.stations)
}

/// Coordinates arrive as JSON numbers in most exports but as quoted strings
/// in some older ones; accept both.
fn deserialize_coord<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
