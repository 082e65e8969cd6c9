pub mod lake;
pub mod run_log;
pub mod sources;

pub use lake::DataLake;
pub use run_log::{RunLog, RunLogEntry, RunLogLock};
pub use sources::load_sources;
