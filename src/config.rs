use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Locations of every table and directory the pipeline reads or writes.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_sources")]
    pub sources: PathBuf,
    #[serde(default = "default_run_log")]
    pub run_log: PathBuf,
    #[serde(default = "default_data_lake")]
    pub data_lake: PathBuf,
    #[serde(default = "default_jobs")]
    pub jobs: PathBuf,
    #[serde(default = "default_filtered")]
    pub filtered: PathBuf,
    #[serde(default = "default_screened")]
    pub screened: PathBuf,
    #[serde(default = "default_top")]
    pub top: PathBuf,
}

fn default_sources() -> PathBuf { PathBuf::from("rss_urls.csv") }
fn default_run_log() -> PathBuf { PathBuf::from("feed_logs.csv") }
fn default_data_lake() -> PathBuf { PathBuf::from("data_lake") }
fn default_jobs() -> PathBuf { PathBuf::from("rss_feed.csv") }
fn default_filtered() -> PathBuf { PathBuf::from("filtered_jobs.csv") }
fn default_screened() -> PathBuf { PathBuf::from("llm_filtered_jobs.csv") }
fn default_top() -> PathBuf { PathBuf::from("top_jobs.csv") }

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            run_log: default_run_log(),
            data_lake: default_data_lake(),
            jobs: default_jobs(),
            filtered: default_filtered(),
            screened: default_screened(),
            top: default_top(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout() -> u64 { 30_000 }
fn default_user_agent() -> String { concat!("jobfeed/", env!("CARGO_PKG_VERSION")).to_string() }

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_hourly_threshold")]
    pub hourly_rate_threshold: f64,
    #[serde(default = "default_budget_threshold")]
    pub budget_threshold: f64,
}

fn default_hourly_threshold() -> f64 { 15.0 }
fn default_budget_threshold() -> f64 { 200.0 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            hourly_rate_threshold: default_hourly_threshold(),
            budget_threshold: default_budget_threshold(),
        }
    }
}

/// One worked example shown to the evaluator before the real job.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EvaluationExample {
    pub description: String,
    pub score: u8,
    pub justification: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_screen_model")]
    pub screen_model: String,
    #[serde(default = "default_evaluate_model")]
    pub evaluate_model: String,
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_ms: u64,
    /// System prompt for the yes/no screen. Falls back to the built-in criteria.
    #[serde(default)]
    pub screen_criteria: Option<String>,
    #[serde(default = "default_evaluation_criteria")]
    pub evaluation_criteria: String,
    /// Replies requested per job; scores are averaged.
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Few-shot examples. Empty means the built-in set.
    #[serde(default)]
    pub examples: Vec<EvaluationExample>,
}

fn default_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_screen_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_evaluate_model() -> String { "gpt-4".to_string() }
fn default_llm_timeout() -> u64 { 120_000 }
fn default_evaluation_criteria() -> String {
    "Relevance to my skills, industry focus, project type, and budget or hourly rate".to_string()
}
fn default_samples() -> usize { 1 }
fn default_top_n() -> usize { 7 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            screen_model: default_screen_model(),
            evaluate_model: default_evaluate_model(),
            request_timeout_ms: default_llm_timeout(),
            screen_criteria: None,
            evaluation_criteria: default_evaluation_criteria(),
            samples: default_samples(),
            top_n: default_top_n(),
            examples: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config TOML: {}", path.display()))?;
        Ok(config)
    }

    /// Export `KEY=value` pairs from `./.env`. Variables already set in the
    /// environment win over the file.
    pub fn load_env_file() {
        let Ok(content) = std::fs::read_to_string(ENV_FILE) else {
            return;
        };
        for (key, value) in content.lines().filter_map(parse_env_line) {
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
            }
        }
    }

    /// `OPENAI_API_KEY` from the environment. When unset, the key is asked for
    /// on the terminal and appended to `.env`.
    pub fn openai_api_key() -> Result<String> {
        if let Some(key) = std::env::var(API_KEY_VAR).ok().map(|k| sanitize_key(&k)).filter(|k| !k.is_empty()) {
            return Ok(key);
        }
        let key = ask("OpenAI API key")?;
        remember_env_var(API_KEY_VAR, &key);
        Ok(key)
    }
}

const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// One `.env` line as a key/value pair. Blank lines and `#` comments yield
/// `None`; surrounding quotes on the value are dropped.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start_matches('\u{feff}').trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    Some((key.trim(), value))
}

/// Read a non-empty line from stdin. The prompt goes to stderr so stdout stays
/// free for stage summaries.
fn ask(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input).context("failed to read from stdin")?;
    let value = sanitize_key(&input);
    if value.is_empty() {
        anyhow::bail!("{} is required", label);
    }
    Ok(value)
}

/// Keys pasted from browsers or Windows editors can carry a BOM, zero-width
/// spaces or a stray carriage return.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "").trim().to_string()
}

/// Set `key` for this process and append it to `.env` for the next run.
fn remember_env_var(key: &str, value: &str) {
    std::env::set_var(key, value);
    let mut contents = std::fs::read_to_string(ENV_FILE).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&format!("{}={}\n", key, value));
    if let Err(e) = std::fs::write(ENV_FILE, contents) {
        tracing::warn!(error = %e, "could not save {} to {}", key, ENV_FILE);
    }
}
