//! Delimited-file loader for `Date`/`Price` price histories.
//!
//! The loader only parses and validates; the caller supplies the path or reader.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::debug;

use super::{InputError, Observation, TimeSeries};

/// Header of the timestamp column.
pub const DATE_COLUMN: &str = "Date";
/// Header of the value column.
pub const PRICE_COLUMN: &str = "Price";

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d-%b-%y", "%d-%b-%Y", "%b %d, %Y", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Errors returned while reading a price file.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to open price file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed delimited input: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column `{0}` is missing from the header")]
    MissingColumn(&'static str),
    #[error("row {row}: cannot parse date `{value}`")]
    InvalidDate { row: usize, value: String },
    #[error("row {row}: cannot parse price `{value}`")]
    InvalidPrice { row: usize, value: String },
    #[error(transparent)]
    InvalidInput(#[from] InputError),
}

/// Load a validated series from a delimited file on disk.
///
/// # Errors
///
/// Returns `LoaderError` if the file cannot be read, a row cannot be parsed, or the
/// resulting series violates the model's input invariants.
pub fn load_price_csv(path: impl AsRef<Path>) -> Result<TimeSeries, LoaderError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    debug!(path = %path.display(), "loading price series");
    read_price_csv(BufReader::new(file))
}

/// Read a validated series from any delimited source with `Date` and `Price` headers.
///
/// Extra columns are ignored. Row numbers in errors are one based and exclude the header.
///
/// # Errors
///
/// Returns `LoaderError` if the header lacks a required column, a row cannot be parsed,
/// or the resulting series violates the model's input invariants.
pub fn read_price_csv<R: Read>(reader: R) -> Result<TimeSeries, LoaderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let date_idx = column_index(&headers, DATE_COLUMN)?;
    let price_idx = column_index(&headers, PRICE_COLUMN)?;

    let mut observations = Vec::new();
    for (offset, record) in reader.records().enumerate() {
        let record = record?;
        let row = offset + 1;
        let raw_date = record.get(date_idx).unwrap_or_default();
        let raw_price = record.get(price_idx).unwrap_or_default();

        let timestamp = parse_date(raw_date).ok_or_else(|| LoaderError::InvalidDate {
            row,
            value: raw_date.to_string(),
        })?;
        let value = raw_price
            .parse::<f64>()
            .map_err(|_| LoaderError::InvalidPrice {
                row,
                value: raw_price.to_string(),
            })?;
        observations.push(Observation::new(timestamp, value));
    }

    debug!(rows = observations.len(), "parsed price rows");
    Ok(TimeSeries::new(observations)?)
}

/// Parse a calendar date in any of the accepted layouts.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|datetime| datetime.date())
        })
}

fn column_index(headers: &csv::StringRecord, name: &'static str) -> Result<usize, LoaderError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or(LoaderError::MissingColumn(name))
}
