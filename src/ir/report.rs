//! Operations-report ingestion
//!
//! Reads a broker's exported CSV into string-keyed rows, the shape the
//! platform identifier and the apportionment engine consume. Callers that
//! already parsed a report elsewhere (spreadsheet import, UI upload) can
//! build the same rows in memory and skip this module.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::{debug, info};

/// One report row keyed by the column headers as exported
pub type ReportRow = HashMap<String, String>;

/// Read a CSV operations report into rows, skipping blank lines.
pub fn read_report_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ReportRow>> {
    let path = path.as_ref();
    info!("Reading operations report: {:?}", path);

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("Failed to open report file")?;

    let headers = reader
        .headers()
        .context("Failed to read report headers")?
        .clone();

    debug!("Report headers: {:?}", headers);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to read report record")?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let mut row = ReportRow::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), field.to_string());
        }
        rows.push(row);
    }

    debug!("Read {} report rows", rows.len());
    Ok(rows)
}
