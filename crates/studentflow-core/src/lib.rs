pub mod clustering;
pub mod columns;
pub mod config;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod publish;
pub mod spreadsheet;
pub mod transform;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{build_client, run, RunSummary, Step};
