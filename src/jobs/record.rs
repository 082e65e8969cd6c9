use super::fields::{parse_budget, HourlyRange};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One row of a job table. The trailing optional columns are filled in by
/// later stages and stay empty before them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Batch the job came from, i.e. the run_id.
    #[serde(rename = "File Name", default)]
    pub file_name: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Link", default)]
    pub link: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Content", default)]
    pub content: String,
    #[serde(rename = "Publication Date", default)]
    pub publication_date: String,
    #[serde(rename = "GUID", default)]
    pub guid: String,
    #[serde(rename = "Hourly Range", default)]
    pub hourly_range: String,
    #[serde(rename = "Budget", default)]
    pub budget: String,
    #[serde(rename = "Posted On", default)]
    pub posted_on: String,
    #[serde(rename = "Category", default)]
    pub category: String,
    #[serde(rename = "Skills", default)]
    pub skills: String,
    #[serde(rename = "Country", default)]
    pub country: String,
    #[serde(default)]
    pub rss_url_id: Option<i64>,
    #[serde(rename = "Hourly Average", default)]
    pub hourly_average: Option<f64>,
    #[serde(default)]
    pub initial_fit: Option<bool>,
    #[serde(default)]
    pub mean_score: Option<f64>,
    #[serde(default)]
    pub justifications: Option<String>,
}

impl JobRecord {
    pub fn run_id(&self) -> Option<u64> {
        self.file_name.trim().parse().ok()
    }

    pub fn hourly_range(&self) -> Option<HourlyRange> {
        HourlyRange::parse(&self.hourly_range)
    }

    pub fn budget_amount(&self) -> Option<f64> {
        parse_budget(&self.budget)
    }
}

pub fn read_jobs(path: &Path) -> Result<Vec<JobRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open job table: {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<JobRecord>, _>>()
        .with_context(|| format!("Failed to parse job table: {}", path.display()))
}

pub fn write_jobs(path: &Path, jobs: &[JobRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create job table: {}", path.display()))?;
    for job in jobs {
        writer.serialize(job)?;
    }
    writer.flush()?;
    Ok(())
}
