//! xlsx encoding of the enriched table.
//!
//! The first worksheet holds a header row followed by one row per record,
//! with no index column. Numbers are written as numeric cells, dates as
//! `YYYY-MM-DD` text and missing values as blank cells. Reading maps each
//! column back to a single polars dtype from the cells it contains.

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDate;
use polars::prelude::*;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::dates::{from_epoch_days, parse_date, to_epoch_days};
use crate::error::{PipelineError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Excel serial number of 1970-01-01 in the 1900 date system.
const EXCEL_UNIX_EPOCH: i64 = 25_569;

/// Encode `df` as an xlsx workbook held in memory.
pub fn to_xlsx_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (idx, column) in df.get_columns().iter().enumerate() {
        let col = u16::try_from(idx).map_err(|_| {
            PipelineError::MalformedInput(format!(
                "{} columns do not fit in a worksheet",
                df.width()
            ))
        })?;
        worksheet.write_string(0, col, column.name().as_str())?;
        write_cells(worksheet, col, column)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Read the first worksheet of the workbook at `path` into a frame.
pub fn read_xlsx(path: &Path) -> Result<DataFrame> {
    let malformed = |err: calamine::XlsxError| {
        PipelineError::MalformedInput(format!("{}: {err}", path.display()))
    };

    let mut workbook: Xlsx<_> = open_workbook(path).map_err(malformed)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            PipelineError::MalformedInput(format!("{}: workbook has no worksheet", path.display()))
        })?
        .map_err(malformed)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let body: Vec<&[Data]> = rows.collect();

    let columns = header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells: Vec<Option<&Data>> = body.iter().map(|row| row.get(idx)).collect();
            column_from_cells(&name.to_string(), &cells).map(Column::from)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DataFrame::new(columns)?)
}

fn write_cells(worksheet: &mut Worksheet, col: u16, column: &Column) -> Result<()> {
    let dtype = column.dtype();
    if dtype == &DataType::Date {
        let days = column.cast(&DataType::Int32)?;
        for (idx, value) in days.i32()?.into_iter().enumerate() {
            if let Some(date) = value.and_then(from_epoch_days) {
                let text = date.format(DATE_FORMAT).to_string();
                worksheet.write_string(row_number(idx)?, col, text)?;
            }
        }
    } else if dtype.is_integer() || dtype.is_float() {
        let numbers = column.cast(&DataType::Float64)?;
        for (idx, value) in numbers.f64()?.into_iter().enumerate() {
            if let Some(number) = value {
                worksheet.write_number(row_number(idx)?, col, number)?;
            }
        }
    } else {
        let texts = column.cast(&DataType::String)?;
        for (idx, value) in texts.str()?.into_iter().enumerate() {
            if let Some(text) = value {
                worksheet.write_string(row_number(idx)?, col, text)?;
            }
        }
    }
    Ok(())
}

fn row_number(idx: usize) -> Result<u32> {
    u32::try_from(idx + 1).map_err(|_| {
        PipelineError::MalformedInput(format!("row {idx} does not fit in a worksheet"))
    })
}

/// Numeric columns become Int64 when every value is integral, Float64
/// otherwise. Date cells become Date. Anything else, including a column
/// with no values at all, is read as text.
fn column_from_cells(name: &str, cells: &[Option<&Data>]) -> Result<Series> {
    let name = PlSmallStr::from(name);
    let present: Vec<&Data> = cells
        .iter()
        .flatten()
        .copied()
        .filter(|cell| !matches!(cell, Data::Empty))
        .collect();

    if !present.is_empty()
        && present
            .iter()
            .all(|cell| matches!(cell, Data::Int(_) | Data::Float(_)))
    {
        let numbers: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| cell.and_then(cell_number))
            .collect();
        if numbers.iter().flatten().all(|number| number.fract() == 0.0) {
            let integers: Vec<Option<i64>> = numbers
                .iter()
                .map(|number| number.map(|value| value as i64))
                .collect();
            return Ok(Series::new(name, integers));
        }
        return Ok(Series::new(name, numbers));
    }

    if !present.is_empty()
        && present
            .iter()
            .all(|cell| matches!(cell, Data::DateTime(_) | Data::DateTimeIso(_)))
    {
        let days: Vec<Option<i32>> = cells
            .iter()
            .map(|cell| cell.and_then(cell_date).map(to_epoch_days))
            .collect();
        return Ok(Series::new(name, days).cast(&DataType::Date)?);
    }

    let texts: Vec<Option<String>> = cells.iter().map(|cell| cell.and_then(cell_text)).collect();
    Ok(Series::new(name, texts))
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(value) => Some(*value as f64),
        Data::Float(value) => Some(*value),
        _ => None,
    }
}

fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(value) => {
            let days = value.as_f64().floor() as i64 - EXCEL_UNIX_EPOCH;
            i32::try_from(days).ok().and_then(from_epoch_days)
        }
        Data::DateTimeIso(raw) => parse_date(raw),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(text) => Some(text.clone()),
        Data::Float(value) if value.fract() == 0.0 => Some((*value as i64).to_string()),
        other => Some(other.to_string()),
    }
}
