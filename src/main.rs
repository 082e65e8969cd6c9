use anyhow::Result;
use clap::{Parser, Subcommand};
use jobfeed::config::Config;
use jobfeed::feed::http::HttpFeedClient;
use jobfeed::fetcher::FetchReport;
use jobfeed::llm::client::OpenAiClient;
use jobfeed::pipeline;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobfeed")]
#[command(about = "Incremental RSS job-feed ingestion, filtering and LLM ranking")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, env = "JOBFEED_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every feed source and write new items to the data lake
    Fetch,
    /// Flatten data-lake batches into the job table
    Parse,
    /// Apply hourly-rate and budget thresholds
    Filter,
    /// Keep jobs the LLM says fit the screening criteria
    Screen,
    /// Score screened jobs with the LLM and keep the best
    Evaluate,
    /// All stages in order
    Run,
}

fn print_fetch(report: &FetchReport) {
    for entry in &report.entries {
        println!(
            "  run {:>5}  source {:>4}  HTTP {:>3}  {} new",
            entry.run_id, entry.source_id, entry.http_status, entry.item_count
        );
    }
    println!(
        "  Fetched {} new items into {} batches.",
        report.total_items(),
        report.batches.len()
    );
}

async fn fetch(config: &Config) -> Result<()> {
    let client = HttpFeedClient::new(&config.fetch)?;
    let report = pipeline::fetch_feeds(config, client).await?;
    print_fetch(&report);
    Ok(())
}

fn parse(config: &Config) -> Result<()> {
    let report = pipeline::parse_lake(config)?;
    println!(
        "  Parsed {} batches ({} rows) into {}.",
        report.parsed.len(),
        report.rows,
        config.paths.jobs.display()
    );
    for failed in &report.failed {
        println!("  Failed to parse {}", failed.display());
    }
    Ok(())
}

fn filter(config: &Config) -> Result<()> {
    let kept = pipeline::filter_jobs(config)?;
    println!("  {} jobs saved to {}.", kept.len(), config.paths.filtered.display());
    Ok(())
}

fn llm_client(config: &Config) -> Result<OpenAiClient> {
    Config::load_env_file();
    OpenAiClient::new(Config::openai_api_key()?, &config.llm)
}

async fn screen(config: &Config, model: &OpenAiClient) -> Result<()> {
    let kept = pipeline::screen_jobs(config, model).await?;
    println!("  LLM screened jobs saved to {}. Total jobs: {}", config.paths.screened.display(), kept.len());
    Ok(())
}

async fn evaluate(config: &Config, model: &OpenAiClient) -> Result<()> {
    let top = pipeline::evaluate_jobs(config, model).await?;
    for (rank, job) in top.iter().enumerate() {
        println!(
            "  {:>2}. [{:.1}] {}",
            rank + 1,
            job.mean_score.unwrap_or_default(),
            job.title
        );
    }
    println!("  Top jobs saved to {}.", config.paths.top.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobfeed=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Fetch => fetch(&config).await,
        Command::Parse => parse(&config),
        Command::Filter => filter(&config),
        Command::Screen => {
            let model = llm_client(&config)?;
            screen(&config, &model).await
        }
        Command::Evaluate => {
            let model = llm_client(&config)?;
            evaluate(&config, &model).await
        }
        Command::Run => {
            fetch(&config).await?;
            parse(&config)?;
            filter(&config)?;
            let model = llm_client(&config)?;
            screen(&config, &model).await?;
            evaluate(&config, &model).await
        }
    }
}
