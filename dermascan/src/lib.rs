pub mod config;
pub mod error;
pub mod model;
pub mod preprocessing;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod verdict;

#[cfg(test)]
mod test_support;

// Re-export common types
pub use error::{PipelineError, PredictError, StoreError};
pub use storage::PredictionRecord;
pub use verdict::{Diagnosis, Verdict};
