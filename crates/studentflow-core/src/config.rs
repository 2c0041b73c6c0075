//! Pipeline configuration.
//!
//! Every step receives a [`PipelineConfig`] explicitly. Values come from the
//! environment (the binary loads `.env` first); anything unset falls back to
//! the defaults documented on each field.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::dates::parse_date;
use crate::error::{PipelineError, Result};

pub const DEFAULT_DATA_DIR: &str = "/opt/airflow/dados";
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/Uniao-brasileira-dos-Compositores/desafio-engenheiro-dados_airflow/main/aluno.csv";
pub const DEFAULT_INDEX_URL: &str = "http://localhost:8983/solr/alunos";
pub const DEFAULT_KMEANS_SEED: u64 = 42;
pub const DEFAULT_KMEANS_RESTARTS: usize = 10;

const RAW_FILE_NAME: &str = "aluno.csv";
const TRANSFORMED_FILE_NAME: &str = "arquivo_saida.xlsx";

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Directory holding the downloaded source and the transformed table.
    /// Default: `/opt/airflow/dados`.
    pub data_dir: PathBuf,
    /// Remote CSV fetched by the first step.
    pub source_url: String,
    /// Base URL of the search index core, e.g. `http://localhost:8983/solr/alunos`.
    pub index_url: String,
    /// Reference date for age computation. `None` means the local date when the step runs.
    pub today: Option<NaiveDate>,
    /// Seed for k-means++ initialisation. Default: 42.
    pub kmeans_seed: u64,
    /// Independent k-means runs; the lowest-inertia run wins. Default: 10.
    pub kmeans_restarts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            index_url: DEFAULT_INDEX_URL.to_string(),
            today: None,
            kmeans_seed: DEFAULT_KMEANS_SEED,
            kmeans_restarts: DEFAULT_KMEANS_RESTARTS,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. The first variable listed
    /// for a field that yields a non-empty value wins.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = first_set(&lookup, &["STUDENTFLOW_DATA_DIR", "AIRFLOW_DADOS_PATH"]) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = first_set(&lookup, &["STUDENTFLOW_SOURCE_URL", "CSV_URL"]) {
            config.source_url = url;
        }
        if let Some(url) = first_set(&lookup, &["STUDENTFLOW_INDEX_URL", "SOLR_URL"]) {
            config.index_url = url;
        }
        if let Some(raw) = first_set(&lookup, &["STUDENTFLOW_TODAY"]) {
            let date = parse_date(&raw).ok_or_else(|| {
                PipelineError::Config(format!("STUDENTFLOW_TODAY is not a date: {raw}"))
            })?;
            config.today = Some(date);
        }
        if let Some(raw) = first_set(&lookup, &["STUDENTFLOW_KMEANS_SEED"]) {
            config.kmeans_seed = raw.parse().map_err(|_| {
                PipelineError::Config(format!("STUDENTFLOW_KMEANS_SEED is not an integer: {raw}"))
            })?;
        }
        if let Some(raw) = first_set(&lookup, &["STUDENTFLOW_KMEANS_RESTARTS"]) {
            let restarts: usize = raw.parse().map_err(|_| {
                PipelineError::Config(format!(
                    "STUDENTFLOW_KMEANS_RESTARTS is not an integer: {raw}"
                ))
            })?;
            if restarts == 0 {
                return Err(PipelineError::Config(
                    "STUDENTFLOW_KMEANS_RESTARTS must be at least 1".to_string(),
                ));
            }
            config.kmeans_restarts = restarts;
        }

        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn raw_path(&self) -> PathBuf {
        self.data_dir.join(RAW_FILE_NAME)
    }

    pub fn transformed_path(&self) -> PathBuf {
        self.data_dir.join(TRANSFORMED_FILE_NAME)
    }

    pub fn index_update_url(&self) -> String {
        format!("{}/update/csv", self.index_url.trim_end_matches('/'))
    }

    pub fn today_or_now(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

fn first_set<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|&key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
