//! CSV ingestion with per-column type inference.

use std::{fs::File, io::Read, path::Path};

use tracing::debug;

use super::{Column, ColumnKind, Dataset, Value};
use crate::error::DatasetError;

pub fn read_csv(path: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let ds = from_csv_reader(file)?;
    debug!(
        path = %path.display(),
        rows = ds.row_count(),
        columns = ds.column_count(),
        "loaded csv"
    );
    Ok(ds)
}

/// Parses delimited text. The header row names the columns, an empty cell is a
/// null, and each column gets the narrowest kind every non-null cell fits.
pub fn from_csv_reader<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Ok(Dataset::default());
    }

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record?;
        if record.len() != headers.len() {
            return Err(DatasetError::Ragged {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected: headers.len(),
                found: record.len(),
            });
        }
        for (i, field) in record.iter().enumerate() {
            let field = field.trim();
            raw[i].push(if field.is_empty() { None } else { Some(field.to_string()) });
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, cells)| infer_column(name, cells))
        .collect();

    // Every column received exactly one cell per record.
    Ok(Dataset { columns })
}

fn infer_column(name: String, cells: Vec<Option<String>>) -> Column {
    let present = || cells.iter().flatten();
    let has_null = cells.iter().any(Option::is_none);
    let all_null = present().next().is_none();

    let kind = if all_null {
        ColumnKind::Float64
    } else if present().all(|c| c.parse::<i64>().is_ok()) {
        // pandas cannot hold NaN in an int64 column
        if has_null { ColumnKind::Float64 } else { ColumnKind::Int64 }
    } else if present().all(|c| parse_float(c).is_some()) {
        ColumnKind::Float64
    } else if present().all(|c| parse_bool(c).is_some()) {
        ColumnKind::Bool
    } else {
        ColumnKind::Text
    };

    let values = cells
        .into_iter()
        .map(|cell| match cell {
            None => Value::Null,
            Some(c) => match kind {
                ColumnKind::Int64 => c.parse().map(Value::Int).unwrap_or(Value::Null),
                ColumnKind::Float64 => parse_float(&c).map(Value::Float).unwrap_or(Value::Null),
                ColumnKind::Bool => parse_bool(&c).map(Value::Bool).unwrap_or(Value::Null),
                ColumnKind::Text => Value::Text(c),
            },
        })
        .collect();

    Column { name, kind, values }
}

fn parse_float(s: &str) -> Option<f64> {
    match s.to_ascii_lowercase().as_str() {
        "nan" | "na" | "null" => Some(f64::NAN),
        _ => s.parse::<f64>().ok(),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
