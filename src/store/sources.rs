use crate::feed::types::FeedSource;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Read the feed-source table (`id,rss_url`), preserving row order.
pub fn load_sources(path: &Path) -> Result<Vec<FeedSource>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open feed sources: {}", path.display()))?;
    let sources = reader
        .deserialize()
        .collect::<Result<Vec<FeedSource>, _>>()
        .with_context(|| format!("Failed to parse feed sources: {}", path.display()))?;

    let mut seen = HashSet::new();
    for source in &sources {
        if !seen.insert(source.source_id) {
            anyhow::bail!("duplicate feed source id {} in {}", source.source_id, path.display());
        }
    }
    Ok(sources)
}
