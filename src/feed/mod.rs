pub mod http;
pub mod rss;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use types::FeedResponse;

/// Transport to an upstream feed.
///
/// `Ok` means a response arrived (whatever its status); `Err` means none did
/// (connect failure, timeout, body read error).
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<FeedResponse>;
}

/// A response body that is not a usable single-channel RSS document.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("document has no <channel> element")]
    MissingChannel,

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}
