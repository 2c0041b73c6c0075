use std::path::{Path, PathBuf};

use polars::prelude::*;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::columns;
use crate::config::PipelineConfig;
use crate::dates::{from_epoch_days, parse_date, to_index_timestamp};
use crate::error::{PipelineError, Result};
use crate::spreadsheet::read_xlsx;

const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, Clone, Serialize)]
pub struct PublishSummary {
    pub source_path: PathBuf,
    pub url: String,
    pub status: u16,
    pub loaded_rows: usize,
    pub published_rows: usize,
    pub dropped_columns: Vec<String>,
}

pub fn load_transformed(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::NotFound {
            path: path.to_path_buf(),
        });
    }

    read_xlsx(path)
}

/// Clean the transformed table for indexing.
///
/// Blank strings count as missing. Columns with no values are dropped, then
/// every row with a missing value. A table left without data columns or rows
/// is an error. Each row is tagged with its position in
/// the loaded table as `id`, taken before rows are dropped.
pub fn prepare_for_index(df: &DataFrame) -> Result<DataFrame> {
    let df = blank_strings_to_null(df)?;
    let height = df.height();

    let kept: Vec<PlSmallStr> = df
        .get_columns()
        .iter()
        .filter(|column| column.null_count() < height)
        .map(|column| column.name().clone())
        .collect();
    if kept.is_empty() {
        return Err(PipelineError::EmptyAfterCleaning);
    }
    let mut cleaned = df.select(kept)?;

    let ids: Vec<String> = (0..height).map(|position| position.to_string()).collect();
    cleaned.with_column(Series::new(columns::ID.into(), ids))?;

    let mut cleaned = cleaned.drop_nulls::<String>(None)?;
    if cleaned.height() == 0 {
        return Err(PipelineError::EmptyAfterCleaning);
    }

    if cleaned.get_column_index(columns::DATA_DE_NASCIMENTO).is_some() {
        let timestamps = index_timestamps(cleaned.column(columns::DATA_DE_NASCIMENTO)?)?;
        cleaned.with_column(Series::new(columns::DATA_DE_NASCIMENTO.into(), timestamps))?;
    }

    Ok(cleaned)
}

/// Header plus one line per row, comma separated, without an index column.
pub fn to_csv(df: &mut DataFrame) -> Result<String> {
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(df)?;
    String::from_utf8(buffer)
        .map_err(|err| PipelineError::MalformedInput(format!("CSV output is not UTF-8: {err}")))
}

/// POST `body` to the index update handler and commit immediately.
pub async fn post_to_index(client: &Client, url: &str, body: String) -> Result<u16> {
    let response = client
        .post(url)
        .query(&[("commit", "true")])
        .header(CONTENT_TYPE, CSV_CONTENT_TYPE)
        .body(body)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.status().as_u16())
}

pub async fn publish_step(client: &Client, config: &PipelineConfig) -> Result<PublishSummary> {
    let source_path = config.transformed_path();
    let df = load_transformed(&source_path)?;
    let loaded_rows = df.height();

    let mut prepared = prepare_for_index(&df)?;
    let dropped_columns: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| prepared.get_column_index(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !dropped_columns.is_empty() {
        warn!(columns = ?dropped_columns, "Dropped columns without values");
    }

    let published_rows = prepared.height();
    let body = to_csv(&mut prepared)?;
    let url = config.index_update_url();
    let status = post_to_index(client, &url, body).await?;

    info!(
        url = %url,
        status,
        loaded_rows,
        published_rows,
        "Published records to index"
    );

    Ok(PublishSummary {
        source_path,
        url,
        status,
        loaded_rows,
        published_rows,
        dropped_columns,
    })
}

fn blank_strings_to_null(df: &DataFrame) -> Result<DataFrame> {
    let mut output = df.clone();
    for column in df.get_columns() {
        if column.dtype() != &DataType::String {
            continue;
        }
        let cleaned: Vec<Option<&str>> = column
            .str()?
            .into_iter()
            .map(|value| value.filter(|text| !text.trim().is_empty()))
            .collect();
        output.with_column(Series::new(column.name().clone(), cleaned))?;
    }
    Ok(output)
}

fn index_timestamps(column: &Column) -> Result<Vec<Option<String>>> {
    if column.dtype() == &DataType::String {
        return column
            .str()?
            .into_iter()
            .map(|value| {
                value
                    .map(|raw| {
                        parse_date(raw).map(to_index_timestamp).ok_or_else(|| {
                            PipelineError::MalformedInput(format!(
                                "'{raw}' is not a valid {}",
                                columns::DATA_DE_NASCIMENTO
                            ))
                        })
                    })
                    .transpose()
            })
            .collect();
    }

    let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|value| value.and_then(from_epoch_days).map(to_index_timestamp))
        .collect())
}
