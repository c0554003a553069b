use serde::{Deserialize, Serialize};

/// Media type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    TvShow,
    LiveStream,
}

impl Default for MediaKind {
    fn default() -> Self {
        Self::Movie
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::TvShow => write!(f, "tvshow"),
            MediaKind::LiveStream => write!(f, "livestream"),
        }
    }
}

/// One metadata + URL pair read from an M3U file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEntry {
    pub name: String,
    pub url: String,
    pub logo: String,
    pub group_title: String,
    /// Valued attributes other than `tvg-logo` and `group-title`, keys lower-cased
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
}

impl ParsedEntry {
    /// Look up a raw attribute by (lower-case) key
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Season/episode info extracted from a display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TvShowInfo {
    pub show_name: String,
    pub season: u32,
    pub episode: u32,
}

/// A parsed entry enriched by the content classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEntry {
    #[serde(flatten)]
    pub entry: ParsedEntry,
    pub is_live_stream: bool,
    /// `None` means no season/episode marker was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tv_show_info: Option<TvShowInfo>,
}

impl ClassifiedEntry {
    /// Routing decision. Season and episode markers make a TV show; only
    /// entries without them fall through to the live-stream check.
    pub fn kind(&self) -> MediaKind {
        if self.tv_show_info.is_some() {
            MediaKind::TvShow
        } else if self.is_live_stream {
            MediaKind::LiveStream
        } else {
            MediaKind::Movie
        }
    }
}

/// Result of one parse call
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub entries: Vec<ParsedEntry>,
    /// Metadata lines dropped because they failed tokenization
    pub skipped: usize,
}
