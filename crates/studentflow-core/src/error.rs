// crates/studentflow-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP transfer failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Expected artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Input is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Table is empty after cleaning; nothing to send to the index")]
    EmptyAfterCleaning,

    #[error("Clustering failed: {0}")]
    Clustering(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Spreadsheet encoding failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
