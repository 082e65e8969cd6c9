use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the feed-source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    #[serde(rename = "id")]
    pub source_id: i64,
    #[serde(rename = "rss_url")]
    pub feed_url: String,
}

impl FeedSource {
    pub fn new(source_id: i64, feed_url: impl Into<String>) -> Self {
        Self {
            source_id,
            feed_url: feed_url.into(),
        }
    }
}

/// Raw HTTP outcome of a feed request. Non-2xx statuses are still `Ok` at the
/// transport layer; only a missing response is an error.
#[derive(Debug, Clone)]
pub struct FeedResponse {
    pub status: u16,
    pub body: String,
}

impl FeedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single `<item>` from a channel.
#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Description HTML, entity-unescaped.
    pub description: String,
    /// `content:encoded` body, empty when absent.
    pub content: String,
    /// `pubDate` exactly as it appears in the feed.
    pub pub_date_raw: String,
    pub guid: String,
    /// The `<item>...</item>` element text as it appeared in the source document.
    pub raw_xml: String,
}

impl FeedItem {
    /// Publication timestamp normalized to UTC, `None` if missing or malformed.
    pub fn pub_date(&self) -> Option<DateTime<Utc>> {
        super::rss::parse_pub_date(&self.pub_date_raw)
    }
}

/// A parsed single-channel RSS document.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    /// Attributes of the root `<rss>` element (version, namespace declarations).
    pub root_attributes: Vec<(String, String)>,
    pub items: Vec<FeedItem>,
}
