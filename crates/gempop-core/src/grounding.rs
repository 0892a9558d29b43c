//! Grounding citation decoding and source extraction
//!
//! Gemini attaches `groundingChunks` to grounded answers. Each chunk carries
//! either a `web` record or a `maps` record; anything else is kept as
//! [`CitationChunk::Other`] so one odd entry never sinks the whole response.

use serde::Deserialize;
use serde_json::Value;

use crate::state::GroundingSource;

pub const WEB_FALLBACK_TITLE: &str = "Web Source";
pub const MAPS_FALLBACK_TITLE: &str = "Google Maps";

/// A link inside a citation chunk. Both fields are optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CitationLink {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl CitationLink {
    pub fn new(title: Option<&str>, uri: Option<&str>) -> Self {
        Self {
            title: title.map(str::to_string),
            uri: uri.map(str::to_string),
        }
    }

    fn to_source(&self, fallback_title: &str) -> Option<GroundingSource> {
        let uri = self.uri.as_deref().filter(|u| !u.trim().is_empty())?;
        let title = self
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(fallback_title);
        Some(GroundingSource {
            title: title.to_string(),
            uri: uri.to_string(),
        })
    }
}

/// One provider citation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationChunk {
    Web(CitationLink),
    Maps(CitationLink),
    Other,
}

#[derive(Deserialize)]
struct RawChunk {
    #[serde(default)]
    web: Option<CitationLink>,
    #[serde(default)]
    maps: Option<CitationLink>,
}

impl CitationChunk {
    /// Decode one raw chunk. Never fails; unknown shapes become `Other`.
    pub fn from_value(value: &Value) -> Self {
        match RawChunk::deserialize(value) {
            Ok(RawChunk { web: Some(link), .. }) => CitationChunk::Web(link),
            Ok(RawChunk { maps: Some(link), .. }) => CitationChunk::Maps(link),
            _ => CitationChunk::Other,
        }
    }
}

/// Normalize citation chunks into sources, preserving order.
///
/// Chunks without a usable uri are dropped. Duplicates are kept.
pub fn extract_sources(chunks: &[CitationChunk]) -> Vec<GroundingSource> {
    chunks
        .iter()
        .filter_map(|chunk| match chunk {
            CitationChunk::Web(link) => link.to_source(WEB_FALLBACK_TITLE),
            CitationChunk::Maps(link) => link.to_source(MAPS_FALLBACK_TITLE),
            CitationChunk::Other => None,
        })
        .collect()
}
