pub mod fields;
pub mod filter;
pub mod parse;
pub mod record;

pub use filter::ThresholdFilter;
pub use record::{read_jobs, write_jobs, JobRecord};
