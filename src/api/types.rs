//! Wire types for the directory API

use serde::Deserialize;

/// One page of channel search results
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub items: Vec<SearchItem>,

    /// Continuation token; absent on the last page
    #[serde(default)]
    pub next_page: Option<String>,
}

/// One entry in a search result page
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub id: String,

    #[serde(default)]
    pub title: String,
}

/// An unenriched reference to a channel surfaced by a search
#[derive(Debug, Clone)]
pub struct CandidateRef {
    pub channel_id: String,
    pub title: String,
}

impl From<SearchItem> for CandidateRef {
    fn from(item: SearchItem) -> Self {
        Self {
            channel_id: item.id,
            title: item.title,
        }
    }
}

/// Full channel detail returned by a detail fetch
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDetail {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub subscribers: u64,

    #[serde(default)]
    pub views: u64,

    #[serde(default)]
    pub videos: u64,

    /// Channel creation timestamp, RFC 3339
    #[serde(default)]
    pub created_at: String,
}

/// Error body shape returned by the directory API on failures
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,
}
