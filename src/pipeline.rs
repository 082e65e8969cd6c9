//! The stages behind each CLI subcommand. Every stage reads its input table
//! from disk and writes its output table, so stages can be rerun on their own.

use crate::config::Config;
use crate::feed::FeedClient;
use crate::fetcher::{FetchReport, Fetcher};
use crate::jobs::parse::{ingest_lake, IngestReport};
use crate::jobs::{read_jobs, write_jobs, JobRecord, ThresholdFilter};
use crate::llm::evaluate::Evaluator;
use crate::llm::screen::{Screener, DEFAULT_SCREEN_CRITERIA};
use crate::llm::ChatModel;
use crate::store::{load_sources, DataLake, RunLog, RunLogLock};
use anyhow::{Context, Result};

/// Fetch every source and append the results to the run log.
///
/// The log is saved even when a feed turns out to be malformed, so rows for
/// the sources processed before it are kept; the error is returned afterwards.
pub async fn fetch_feeds<C: FeedClient>(config: &Config, client: C) -> Result<FetchReport> {
    fetch_feeds_with(config, &Fetcher::new(client)).await
}

/// [`fetch_feeds`] with a caller-built fetcher, e.g. one with a fixed clock.
pub async fn fetch_feeds_with<C: FeedClient>(config: &Config, fetcher: &Fetcher<C>) -> Result<FetchReport> {
    let paths = &config.paths;
    let _lock = RunLogLock::acquire(&paths.run_log)?;

    let sources = load_sources(&paths.sources)?;
    let mut log = RunLog::load(&paths.run_log)?;
    let lake = DataLake::new(&paths.data_lake);
    tracing::info!(sources = sources.len(), prior_entries = log.len(), "starting fetch");

    let result = fetcher.run(&sources, &mut log, &lake).await;

    log.save(&paths.run_log)?;
    let report = result.context("fetch aborted")?;
    tracing::info!(entries = report.entries.len(), batches = report.batches.len(), "run log updated");
    Ok(report)
}

/// Move new lake batches into the job table.
pub fn parse_lake(config: &Config) -> Result<IngestReport> {
    let lake = DataLake::new(&config.paths.data_lake);
    ingest_lake(&lake, &config.paths.jobs)
}

/// Apply the hourly-rate / budget thresholds to the job table.
pub fn filter_jobs(config: &Config) -> Result<Vec<JobRecord>> {
    let jobs = read_jobs(&config.paths.jobs)?;
    let log = RunLog::load(&config.paths.run_log)?;
    let total = jobs.len();

    let kept = ThresholdFilter::from(&config.filter).apply(jobs, &log);
    write_jobs(&config.paths.filtered, &kept)?;
    tracing::info!(total, kept = kept.len(), "threshold filter applied");
    Ok(kept)
}

/// Keep the filtered jobs the model says fit the screening criteria.
pub async fn screen_jobs<M: ChatModel>(config: &Config, model: &M) -> Result<Vec<JobRecord>> {
    let jobs = read_jobs(&config.paths.filtered)?;
    let total = jobs.len();
    let criteria = config
        .llm
        .screen_criteria
        .as_deref()
        .unwrap_or(DEFAULT_SCREEN_CRITERIA);

    let kept = Screener::new(model, &config.llm.screen_model, criteria)
        .screen(jobs)
        .await;
    write_jobs(&config.paths.screened, &kept)?;
    tracing::info!(total, kept = kept.len(), "LLM screen applied");
    Ok(kept)
}

/// Score the screened jobs and write the best `top_n`.
pub async fn evaluate_jobs<M: ChatModel>(config: &Config, model: &M) -> Result<Vec<JobRecord>> {
    let llm = &config.llm;
    let jobs = read_jobs(&config.paths.screened)?;
    let evaluator = Evaluator::new(
        model,
        &llm.evaluate_model,
        &llm.evaluation_criteria,
        &llm.examples,
        llm.samples,
    );

    let top = evaluator.rank(jobs, llm.top_n).await;
    write_jobs(&config.paths.top, &top)?;
    tracing::info!(kept = top.len(), "evaluation complete");
    Ok(top)
}
