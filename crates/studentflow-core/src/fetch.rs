use std::path::PathBuf;

use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub url: String,
    pub destination: PathBuf,
    pub status: u16,
    pub bytes: usize,
}

/// Download the source CSV and store it verbatim at [`PipelineConfig::raw_path`].
///
/// Transport failures and non-success statuses are returned as errors before
/// anything is written.
pub async fn fetch_source(client: &Client, config: &PipelineConfig) -> Result<FetchSummary> {
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let response = client
        .get(&config.source_url)
        .send()
        .await?
        .error_for_status()?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;

    let destination = config.raw_path();
    tokio::fs::write(&destination, &body).await?;

    info!(
        url = %config.source_url,
        path = %destination.display(),
        bytes = body.len(),
        "Downloaded source table"
    );

    Ok(FetchSummary {
        url: config.source_url.clone(),
        destination,
        status,
        bytes: body.len(),
    })
}
