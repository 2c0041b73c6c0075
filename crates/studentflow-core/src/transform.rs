use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::clustering::{status_labels, KMeans};
use crate::columns;
use crate::config::PipelineConfig;
use crate::dates::{age_in_years, birth_year, parse_date, to_epoch_days};
use crate::error::{PipelineError, Result};
use crate::spreadsheet::to_xlsx_bytes;

/// Second whitespace-delimited token of an address, e.g. the street name in "Rua Augusta 100".
static STREET_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s(\S+)\s").expect("valid regex"));

#[derive(Debug, Clone, Serialize)]
pub struct TransformSummary {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub today: NaiveDate,
    pub rows: usize,
    pub full_names: usize,
    pub status_counts: BTreeMap<String, usize>,
}

/// Read the downloaded CSV with every column kept as text.
pub fn load_raw(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = fs::read(path)?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|err| PipelineError::MalformedInput(format!("{}: {err}", path.display())))
}

/// Derive the enriched table from the raw source table.
///
/// The source age column is discarded and recomputed from the birth date
/// relative to `today`. Fails on the first missing column or unparseable
/// value; nothing partial is returned.
pub fn transform_frame(raw: &DataFrame, today: NaiveDate, kmeans: &KMeans) -> Result<DataFrame> {
    require_columns(raw, &columns::SOURCE_COLUMNS)?;

    let birth_dates = parse_birth_dates(raw)?;
    let ages: Vec<Option<i64>> = birth_dates
        .iter()
        .map(|date| date.map(|birth| age_in_years(birth, today)))
        .collect();
    let years: Vec<Option<i32>> = birth_dates.iter().map(|date| date.map(birth_year)).collect();
    let days: Vec<Option<i32>> = birth_dates.iter().map(|date| date.map(to_epoch_days)).collect();

    let mut df = raw.drop(columns::IDADE)?;
    df.with_column(
        Series::new(columns::DATA_DE_NASCIMENTO.into(), days).cast(&DataType::Date)?,
    )?;
    df.hstack_mut(&mut [
        Series::new(columns::IDADE_CORRETA.into(), ages).into(),
        Series::new(columns::ANO_DE_NASCIMENTO.into(), years).into(),
    ])?;

    for (from, to) in columns::RENAMES {
        df.rename(from, to.into())?;
    }

    let streets: Vec<Option<String>> = text_values(&df, columns::ENDERECO)?
        .iter()
        .map(|address| address.as_deref().and_then(street_token))
        .collect();
    df.with_column(Series::new(columns::RUA.into(), streets))?;

    let full_names = derive_full_names(&df)?;
    df.with_column(Series::new(columns::NOME_COMPLETO.into(), full_names))?;
    let mut df = df.drop(columns::NOME_DO_PAI)?.drop(columns::NOME_DA_MAE)?;

    let scores = parse_scores(&df)?;
    let labels = status_labels(&scores, kmeans)?;
    df.with_column(Series::new(columns::NOTA_MEDIA.into(), scores))?;
    df.with_column(Series::new(
        columns::STATUS_GERAL.into(),
        labels.iter().map(|label| label.as_str()).collect::<Vec<_>>(),
    ))?;

    Ok(df.select(columns::OUTPUT_COLUMNS)?)
}

/// Write the enriched table as an xlsx workbook. The file is staged next to
/// `path` and renamed into place, so readers never observe a half-written table.
pub fn write_transformed(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = to_xlsx_bytes(df)?;
    let staging = path.with_extension("xlsx.tmp");
    let written = fs::write(&staging, bytes);

    if let Err(err) = written {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }

    fs::rename(&staging, path)?;
    Ok(())
}

pub fn transform_step(config: &PipelineConfig, today: NaiveDate) -> Result<TransformSummary> {
    let source_path = config.raw_path();
    let raw = load_raw(&source_path)?;
    info!(path = %source_path.display(), rows = raw.height(), "Loaded source table");

    let kmeans = KMeans::for_status(config.kmeans_seed).with_restarts(config.kmeans_restarts);
    let df = transform_frame(&raw, today, &kmeans)?;

    let output_path = config.transformed_path();
    write_transformed(&df, &output_path)?;

    let summary = TransformSummary {
        source_path,
        output_path,
        today,
        rows: df.height(),
        full_names: df.height() - df.column(columns::NOME_COMPLETO)?.null_count(),
        status_counts: count_labels(&df)?,
    };
    info!(
        path = %summary.output_path.display(),
        rows = summary.rows,
        full_names = summary.full_names,
        "Wrote transformed table"
    );
    Ok(summary)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    match required
        .iter()
        .find(|name| df.get_column_index(name).is_none())
    {
        Some(missing) => Err(PipelineError::MissingColumn {
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

fn parse_birth_dates(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>> {
    text_values(df, columns::DATA_DE_NASCIMENTO)?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| match value.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_date(raw).map(Some).ok_or_else(|| {
                PipelineError::MalformedInput(format!(
                    "row {idx}: '{raw}' is not a valid {}",
                    columns::DATA_DE_NASCIMENTO
                ))
            }),
        })
        .collect()
}

fn parse_scores(df: &DataFrame) -> Result<Vec<f64>> {
    text_values(df, columns::NOTA_MEDIA)?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            let raw = value.as_deref().map(str::trim).unwrap_or_default();
            if raw.is_empty() {
                return Err(PipelineError::MalformedInput(format!(
                    "row {idx}: {} is empty",
                    columns::NOTA_MEDIA
                )));
            }
            raw.parse::<f64>().map_err(|_| {
                PipelineError::MalformedInput(format!(
                    "row {idx}: '{raw}' is not a valid {}",
                    columns::NOTA_MEDIA
                ))
            })
        })
        .collect()
}

fn street_token(address: &str) -> Option<String> {
    STREET_TOKEN
        .captures(address)
        .and_then(|caps| caps.get(1))
        .map(|token| token.as_str().to_string())
}

fn surname(name: &str) -> &str {
    name.split(' ').next_back().unwrap_or_default()
}

/// `"{Nome} {surname}"` when both parents share the same last name token.
fn derive_full_names(df: &DataFrame) -> Result<Vec<Option<String>>> {
    let names = text_values(df, columns::NOME)?;
    let fathers = text_values(df, columns::NOME_DO_PAI)?;
    let mothers = text_values(df, columns::NOME_DA_MAE)?;

    let full_names = names
        .iter()
        .zip(&fathers)
        .zip(&mothers)
        .map(|((name, father), mother)| {
            let (Some(name), Some(father), Some(mother)) = (name, father, mother) else {
                return None;
            };
            let shared = surname(father);
            (shared == surname(mother)).then(|| format!("{name} {shared}"))
        })
        .collect::<Vec<_>>();

    debug!(
        matched = full_names.iter().filter(|name| name.is_some()).count(),
        "Derived full names"
    );
    Ok(full_names)
}

fn count_labels(df: &DataFrame) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for label in df.column(columns::STATUS_GERAL)?.str()?.into_iter().flatten() {
        *counts.entry(label.to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}
