use super::fields::DescriptionFields;
use super::record::{read_jobs, write_jobs, JobRecord};
use crate::feed::rss::parse_channel;
use crate::feed::types::FeedItem;
use crate::store::DataLake;
use anyhow::{Context, Result};
use scraper::Html;
use std::path::{Path, PathBuf};

/// Visible text of an HTML fragment, one text node per line.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn job_from_item(file_name: &str, item: &FeedItem) -> JobRecord {
    let fields = DescriptionFields::extract(&item.description);
    JobRecord {
        file_name: file_name.to_string(),
        title: item.title.clone(),
        link: item.link.clone(),
        description: html_to_text(&item.description),
        content: item.content.clone(),
        publication_date: item.pub_date_raw.clone(),
        guid: item.guid.clone(),
        hourly_range: fields.hourly_range,
        budget: fields.budget,
        posted_on: fields.posted_on,
        category: fields.category,
        skills: fields.skills,
        country: fields.country,
        ..JobRecord::default()
    }
}

/// Flatten one batch file into job rows.
pub fn parse_batch(path: &Path) -> Result<Vec<JobRecord>> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch: {}", path.display()))?;
    let channel = parse_channel(&xml)
        .with_context(|| format!("Failed to parse batch: {}", path.display()))?;
    let file_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(channel.items.iter().map(|item| job_from_item(&file_name, item)).collect())
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub parsed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub rows: usize,
}

/// Parse every pending batch, append the rows to `table` and move the parsed
/// files aside. Batches that fail to parse stay in the lake.
pub fn ingest_lake(lake: &DataLake, table: &Path) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let mut new_rows = Vec::new();
    let mut consumed = Vec::new();

    for batch in lake.pending_batches()? {
        match parse_batch(&batch) {
            Ok(rows) => {
                tracing::debug!(batch = %batch.display(), rows = rows.len(), "parsed batch");
                new_rows.extend(rows);
                consumed.push(batch);
            }
            Err(e) => {
                tracing::warn!(batch = %batch.display(), error = %format!("{:#}", e), "skipping unparseable batch");
                report.failed.push(batch);
            }
        }
    }

    if consumed.is_empty() {
        return Ok(report);
    }

    let mut rows = if table.exists() { read_jobs(table)? } else { Vec::new() };
    report.rows = new_rows.len();
    rows.extend(new_rows);
    write_jobs(table, &rows)?;

    // Only move batches once their rows are safely in the table.
    for batch in consumed {
        report.parsed.push(lake.mark_parsed(&batch)?);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        let text = html_to_text("Cut <i>weekly</i> videos<br /><br /><b>Budget</b>: $300<br />");
        assert_eq!(text, "Cut\nweekly\nvideos\nBudget\n: $300");
    }

    #[test]
    fn test_job_from_item() {
        let item = FeedItem {
            title: "Shorts editor".to_string(),
            link: "https://example.com/j/1".to_string(),
            description: "Edit shorts<br /><b>Budget</b>: $250<br /><b>Country</b>: Brazil".to_string(),
            pub_date_raw: "Mon, 01 Jan 2024 00:00:00 +0000".to_string(),
            guid: "g1".to_string(),
            ..FeedItem::default()
        };
        let job = job_from_item("7", &item);
        assert_eq!(job.file_name, "7");
        assert_eq!(job.budget, "$250");
        assert_eq!(job.country, "Brazil");
        assert_eq!(job.publication_date, "Mon, 01 Jan 2024 00:00:00 +0000");
        assert!(job.description.starts_with("Edit shorts"));
        assert_eq!(job.rss_url_id, None);
    }
}
