use std::fmt;

use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::fetch::{fetch_source, FetchSummary};
use crate::publish::{publish_step, PublishSummary};
use crate::transform::{transform_step, TransformSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Fetch,
    Transform,
    Publish,
}

impl Step {
    pub const ORDER: [Step; 3] = [Step::Fetch, Step::Transform, Step::Publish];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Fetch => "fetch",
            Step::Transform => "transform",
            Step::Publish => "publish",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub fetch: FetchSummary,
    pub transform: TransformSummary,
    pub publish: PublishSummary,
}

/// HTTP client shared by the fetch and publish steps.
pub fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(concat!("studentflow/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Run fetch, transform and publish in order. The first failing step ends the run.
pub async fn run(client: &Client, config: &PipelineConfig, today: NaiveDate) -> Result<RunSummary> {
    info!(step = %Step::Fetch, "Starting step");
    let fetch = fetch_source(client, config)
        .await
        .inspect_err(|err| log_failure(Step::Fetch, err))?;

    info!(step = %Step::Transform, %today, "Starting step");
    let transform =
        transform_step(config, today).inspect_err(|err| log_failure(Step::Transform, err))?;

    info!(step = %Step::Publish, "Starting step");
    let publish = publish_step(client, config)
        .await
        .inspect_err(|err| log_failure(Step::Publish, err))?;

    Ok(RunSummary {
        fetch,
        transform,
        publish,
    })
}

fn log_failure(step: Step, err: &PipelineError) {
    error!(step = %step, error = %err, "Step failed; halting run");
}
