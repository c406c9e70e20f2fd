//! CSV report of a sync run: one line per processed row.
use std::{
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use log::*;
use thiserror::Error;

use crate::sync_types::RowOutcome;

pub const DEFAULT_REPORT_DIR: &str = "logs";
pub const REPORT_HEADERS: [&str; 6] =
    ["Timestamp", "External ID", "Tracking Number", "Order Name", "Status", "Message"];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Could not write the report to {path}. {reason}")]
    Io { path: String, reason: String },
    #[error("Could not encode the report. {0}")]
    Csv(#[from] csv::Error),
}

pub fn report_file_name(timestamp: DateTime<Local>) -> String {
    format!("report_{}.csv", timestamp.format("%Y-%m-%d_%H-%M-%S"))
}

pub fn write_report<W: Write>(writer: W, outcomes: &[RowOutcome]) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(REPORT_HEADERS)?;
    for outcome in outcomes {
        csv_writer.write_record([
            outcome.timestamp.to_rfc3339().as_str(),
            outcome.external_id.as_str(),
            outcome.tracking_number.as_str(),
            outcome.order_name_or_na(),
            outcome.status.to_string().as_str(),
            outcome.message.as_str(),
        ])?;
    }
    csv_writer.flush().map_err(|e| ReportError::Csv(e.into()))?;
    Ok(())
}

/// Writes the report into `dir` (created if needed) and returns the path of the new file.
pub fn save_report<P: AsRef<Path>>(dir: P, outcomes: &[RowOutcome]) -> Result<PathBuf, ReportError> {
    let dir = dir.as_ref();
    let io_error = |e: std::io::Error| ReportError::Io { path: dir.display().to_string(), reason: e.to_string() };
    std::fs::create_dir_all(dir).map_err(io_error)?;
    let path = dir.join(report_file_name(Local::now()));
    let file = std::fs::File::create(&path).map_err(io_error)?;
    write_report(file, outcomes)?;
    info!("📄️ Report saved to {}", path.display());
    Ok(path)
}
