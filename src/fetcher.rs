//! Incremental feed fetch: pull every source once, keep only items newer than
//! the source's watermark, write them as a batch and log the attempt.

use crate::feed::rss::{parse_channel, write_batch};
use crate::feed::types::{FeedItem, FeedSource};
use crate::feed::{FeedClient, FeedError};
use crate::store::{DataLake, RunLog, RunLogEntry};
use chrono::{DateTime, SubsecRound, Utc};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// `http_status` recorded when no response arrived at all.
pub const NO_RESPONSE: u16 = 0;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed {source_id} ({url}) returned a malformed document")]
    MalformedFeed {
        source_id: i64,
        url: String,
        #[source]
        source: FeedError,
    },

    #[error("failed to write batch {run_id}")]
    Batch {
        run_id: u64,
        #[source]
        source: io::Error,
    },
}

/// What one invocation added.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub entries: Vec<RunLogEntry>,
    pub batches: Vec<PathBuf>,
}

impl FetchReport {
    pub fn total_items(&self) -> u32 {
        self.entries.iter().map(|e| e.item_count).sum()
    }
}

/// Source of run timestamps.
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Fetcher<C> {
    client: C,
    clock: Clock,
}

impl<C: FeedClient> Fetcher<C> {
    pub fn new(client: C) -> Self {
        Self::with_clock(client, Utc::now)
    }

    /// Stamp runs with `clock` instead of the system time.
    pub fn with_clock(client: C, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self {
            client,
            clock: Box::new(clock),
        }
    }

    /// Process `sources` in order, appending one entry per source to `log`.
    ///
    /// A malformed feed stops the run: entries for earlier sources stay in
    /// `log`, the failing source gets no entry and its run_id is not used.
    pub async fn run(
        &self,
        sources: &[FeedSource],
        log: &mut RunLog,
        lake: &DataLake,
    ) -> Result<FetchReport, FetchError> {
        let mut next_run_id = log.next_run_id();
        let mut report = FetchReport::default();

        for source in sources {
            let run_id = next_run_id;
            let (entry, batch) = self.fetch_source(source, run_id, log, lake).await?;
            log.append(entry.clone());
            report.entries.push(entry);
            report.batches.extend(batch);
            next_run_id += 1;
        }

        Ok(report)
    }

    async fn fetch_source(
        &self,
        source: &FeedSource,
        run_id: u64,
        log: &RunLog,
        lake: &DataLake,
    ) -> Result<(RunLogEntry, Option<PathBuf>), FetchError> {
        let watermark = log.watermark(source.source_id);
        let response = self.client.get(&source.feed_url).await;
        let run_timestamp = (self.clock)().trunc_subsecs(0);

        let failed = |http_status: u16| RunLogEntry {
            run_id,
            source_id: source.source_id,
            run_timestamp,
            http_status,
            item_count: 0,
        };

        let response = match response {
            Ok(resp) if resp.is_success() => resp,
            Ok(resp) => {
                tracing::warn!(source_id = source.source_id, run_id, status = resp.status, "feed fetch failed");
                return Ok((failed(resp.status), None));
            }
            Err(e) => {
                tracing::warn!(source_id = source.source_id, run_id, error = %format!("{:#}", e), "feed unreachable");
                return Ok((failed(NO_RESPONSE), None));
            }
        };

        let channel = parse_channel(&response.body).map_err(|e| FetchError::MalformedFeed {
            source_id: source.source_id,
            url: source.feed_url.clone(),
            source: e,
        })?;

        tracing::debug!(source_id = source.source_id, %watermark, items = channel.items.len(), "comparing against watermark");

        let new_items = select_new(source.source_id, &channel.items, watermark);

        let batch = if new_items.is_empty() {
            tracing::info!(source_id = source.source_id, run_id, "no new items");
            None
        } else {
            let xml = write_batch(&channel.root_attributes, new_items.iter().copied());
            let path = lake
                .write_batch(run_id, &xml)
                .map_err(|e| FetchError::Batch { run_id, source: e })?;
            tracing::info!(
                source_id = source.source_id,
                run_id,
                items = new_items.len(),
                path = %path.display(),
                "wrote batch"
            );
            Some(path)
        };

        let entry = RunLogEntry {
            run_id,
            source_id: source.source_id,
            run_timestamp,
            http_status: response.status,
            item_count: new_items.len() as u32,
        };
        Ok((entry, batch))
    }
}

/// Items strictly newer than `watermark`. Items without a parseable `pubDate`
/// are skipped.
fn select_new(source_id: i64, items: &[FeedItem], watermark: DateTime<Utc>) -> Vec<&FeedItem> {
    items
        .iter()
        .filter(|item| match item.pub_date() {
            Some(published) => published > watermark,
            None => {
                tracing::warn!(source_id, guid = %item.guid, pub_date = %item.pub_date_raw, "skipping item with unparseable pubDate");
                false
            }
        })
        .collect()
}
