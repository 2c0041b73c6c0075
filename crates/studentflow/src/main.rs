use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::to_string;
use studentflow_core::{
    build_client, fetch::fetch_source, publish::publish_step, run, transform::transform_step,
    PipelineConfig, Step,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Student records pipeline: fetch, enrich and index",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the source CSV into the data directory
    Fetch,
    /// Enrich the downloaded table and write the transformed spreadsheet
    Transform,
    /// Clean the transformed table and send it to the search index
    Publish,
    /// Run fetch, transform and publish in order
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("failed to read pipeline configuration")?;

    match cli.command {
        Command::Fetch => {
            let client = build_client()?;
            let summary = fetch_source(&client, &config)
                .await
                .with_context(|| format!("{} step failed", Step::Fetch))?;
            info!(summary = %to_string(&summary)?, "Step finished");
        }
        Command::Transform => {
            let today = config.today_or_now();
            let summary = transform_step(&config, today)
                .with_context(|| format!("{} step failed", Step::Transform))?;
            info!(summary = %to_string(&summary)?, "Step finished");
        }
        Command::Publish => {
            let client = build_client()?;
            let summary = publish_step(&client, &config)
                .await
                .with_context(|| format!("{} step failed", Step::Publish))?;
            info!(summary = %to_string(&summary)?, "Step finished");
        }
        Command::Run => {
            let client = build_client()?;
            let today = config.today_or_now();
            let summary = run(&client, &config, today)
                .await
                .context("pipeline run failed")?;
            info!(summary = %to_string(&summary)?, "Pipeline finished");
        }
    }

    Ok(())
}
