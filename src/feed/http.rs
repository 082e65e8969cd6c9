use super::types::FeedResponse;
use super::FeedClient;
use crate::config::FetchConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// reqwest-backed feed transport with a per-request timeout.
pub struct HttpFeedClient {
    client: Client,
}

impl HttpFeedClient {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn get(&self, url: &str) -> Result<FeedResponse> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body from {} failed", url))?;

        Ok(FeedResponse { status, body })
    }
}
