//! # Reporting
//!
//! Console tables and row-oriented CSV output for a fitted change-point summary.
//! Writers are supplied by the caller; nothing here chooses a path.

use std::io::Write;

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use thiserror::Error;

use crate::input::TimeSeries;
use crate::models::changepoint::{ChangePointSummary, ParameterName, SummaryOptions};

/// Errors returned while writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode report row: {0}")]
    Csv(#[from] csv::Error),
}

/// One parameter row of the posterior summary table.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub parameter: &'static str,
    pub mean: f64,
    pub std: f64,
    pub lower: f64,
    pub upper: f64,
    pub r_hat: f64,
    pub ess: f64,
}

/// One key/value row of derived results.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedRow {
    pub quantity: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
struct SeriesRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Price")]
    price: f64,
    #[serde(rename = "Log_Returns")]
    log_return: Option<f64>,
}

/// Summary rows in parameter order.
#[must_use]
pub fn summary_rows(summary: &ChangePointSummary) -> Vec<SummaryRow> {
    ParameterName::ALL
        .iter()
        .map(|name| {
            let parameter = summary.parameter(*name);
            SummaryRow {
                parameter: name.as_str(),
                mean: parameter.mean,
                std: parameter.std_dev,
                lower: parameter.credible_low,
                upper: parameter.credible_high,
                r_hat: parameter.r_hat,
                ess: parameter.ess,
            }
        })
        .collect()
}

/// Derived scalars as key/value rows.
#[must_use]
pub fn derived_rows(summary: &ChangePointSummary) -> Vec<DerivedRow> {
    vec![
        DerivedRow {
            quantity: "percent_change",
            value: format!("{:.4}", summary.percent_change),
        },
        DerivedRow {
            quantity: "detected_index",
            value: summary.detected_index.to_string(),
        },
        DerivedRow {
            quantity: "detected_date",
            value: summary.detected_timestamp.format("%Y-%m-%d").to_string(),
        },
        DerivedRow {
            quantity: "max_r_hat",
            value: format!("{:.4}", summary.convergence.max_r_hat),
        },
        DerivedRow {
            quantity: "min_ess",
            value: format!("{:.1}", summary.convergence.min_ess),
        },
        DerivedRow {
            quantity: "converged",
            value: summary.is_converged().to_string(),
        },
    ]
}

/// Header of the summary table, with interval columns named after the credible mass.
#[must_use]
pub fn summary_header(credible_mass: f64) -> [String; 7] {
    let (low, high) = SummaryOptions {
        credible_mass,
        ..SummaryOptions::default()
    }
    .tail_probabilities();
    [
        "parameter".to_string(),
        "mean".to_string(),
        "std".to_string(),
        percent_label(low),
        percent_label(high),
        "r_hat".to_string(),
        "ess".to_string(),
    ]
}

/// Write the per-parameter summary as CSV.
///
/// # Errors
///
/// Returns `ReportError` if a row cannot be encoded or written.
pub fn write_summary_csv<W: Write>(summary: &ChangePointSummary, writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(summary_header(summary.credible_mass))?;
    for row in summary_rows(summary) {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write derived results as `quantity,value` CSV.
///
/// # Errors
///
/// Returns `ReportError` if a row cannot be encoded or written.
pub fn write_derived_csv<W: Write>(summary: &ChangePointSummary, writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in derived_rows(summary) {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the series with its log returns as `Date,Price,Log_Returns` CSV.
///
/// # Errors
///
/// Returns `ReportError` if a row cannot be encoded or written.
pub fn write_series_csv<W: Write>(series: &TimeSeries, writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (observation, log_return) in series.observations().iter().zip(series.log_returns()) {
        csv_writer.serialize(SeriesRow {
            date: observation.timestamp.format("%Y-%m-%d").to_string(),
            price: observation.value,
            log_return,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Render the parameter table and the derived-results table for a terminal.
///
/// R-hat cells are green within `max_r_hat` and red above it.
#[must_use]
pub fn render_summary_table(summary: &ChangePointSummary, max_r_hat: f64) -> String {
    let header = summary_header(summary.credible_mass);
    let mut parameters = make_table(&header.iter().map(String::as_str).collect::<Vec<_>>());
    for row in summary_rows(summary) {
        parameters.add_row(vec![
            Cell::new(row.parameter),
            Cell::new(format!("{:.4}", row.mean)),
            Cell::new(format!("{:.4}", row.std)),
            Cell::new(format!("{:.4}", row.lower)),
            Cell::new(format!("{:.4}", row.upper)),
            r_hat_cell(row.r_hat, max_r_hat),
            Cell::new(format!("{:.1}", row.ess)),
        ]);
    }

    let mut derived = make_table(&["quantity", "value"]);
    for row in derived_rows(summary) {
        derived.add_row(vec![Cell::new(row.quantity), Cell::new(row.value)]);
    }

    format!("{parameters}\n{derived}")
}

fn make_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(*h)).collect::<Vec<_>>());
    table
}

fn r_hat_cell(value: f64, threshold: f64) -> Cell {
    let cell = Cell::new(format!("{value:.4}"));
    if value > threshold {
        cell.fg(Color::Red).add_attribute(Attribute::Bold)
    } else {
        cell.fg(Color::Green)
    }
}

/// `0.025` becomes `2.5%`, `0.05` becomes `5%`.
fn percent_label(probability: f64) -> String {
    let formatted = format!("{:.4}", probability * 100.0);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}%")
}
