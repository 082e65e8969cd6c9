pub mod config;
pub mod feed;
pub mod fetcher;
pub mod jobs;
pub mod llm;
pub mod pipeline;
pub mod store;
