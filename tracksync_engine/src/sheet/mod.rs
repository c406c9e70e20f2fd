//! Reading the supplier sheet.
//!
//! The sheet is read either from a CSV export or straight from Google Sheets ([`google`]). Either way the first row
//! holds the headers. Which columns hold the external reference, the tracking
//! number and (optionally) the carrier is decided by a [`ColumnMapping`]. A column named in the mapping must exist.
//! Fields that are not named fall back to the alias lists below, tried in order, compared case-insensitively after
//! trimming. No other guessing takes place.
use std::{io::Read, path::Path};

use log::*;
use thiserror::Error;

use crate::sync_types::{ExternalOrderRef, SyncRow};

pub mod google;

pub const EXTERNAL_ID_ALIASES: [&str; 5] =
    ["AliExpress Order No", "Order Number", "Order No", "AliExpress Order ID", "AliExpress ID"];
pub const TRACKING_NUMBER_ALIASES: [&str; 4] = ["Tracking Number", "Tracking No", "Tracking", "Number"];
pub const CARRIER_ALIASES: [&str; 3] = ["Carrier", "Tracking Company", "Logistics Company"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SheetError {
    #[error("Could not read the sheet. {0}")]
    Io(String),
    #[error("Could not parse the sheet as CSV. {0}")]
    Csv(String),
    #[error("Google Sheets is not configured. {0}")]
    GoogleConfig(String),
    #[error("Could not authenticate with Google. {0}")]
    GoogleAuth(String),
    #[error("Could not read the Google sheet. {0}")]
    GoogleRequest(String),
    #[error("The configured {field} column '{column}' does not exist. Available columns: {available}")]
    ConfiguredColumnMissing { field: &'static str, column: String, available: String },
    #[error("Could not find a {field} column. Looked for: {candidates}. Available columns: {available}")]
    NoColumnFound { field: &'static str, candidates: String, available: String },
}

impl From<csv::Error> for SheetError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            Self::Io(e.to_string())
        } else {
            Self::Csv(e.to_string())
        }
    }
}

/// Explicit column names for each logical field. `None` means "use the alias list".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub external_id: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

/// The header names actually used for this sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub external_id: String,
    pub tracking_number: String,
    pub carrier: Option<String>,
}

impl ColumnMapping {
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedColumns, SheetError> {
        let external_id = find_column(headers, "external order id", self.external_id.as_deref(), &EXTERNAL_ID_ALIASES)?
            .ok_or_else(|| no_column("external order id", &EXTERNAL_ID_ALIASES, headers))?;
        let tracking_number =
            find_column(headers, "tracking number", self.tracking_number.as_deref(), &TRACKING_NUMBER_ALIASES)?
                .ok_or_else(|| no_column("tracking number", &TRACKING_NUMBER_ALIASES, headers))?;
        let carrier = find_column(headers, "carrier", self.carrier.as_deref(), &CARRIER_ALIASES)?;
        Ok(ResolvedColumns { external_id, tracking_number, carrier })
    }
}

fn same_header(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn find_column(
    headers: &[String],
    field: &'static str,
    configured: Option<&str>,
    aliases: &[&str],
) -> Result<Option<String>, SheetError> {
    if let Some(column) = configured {
        return headers.iter().find(|h| same_header(h, column)).cloned().map(Some).ok_or_else(|| {
            SheetError::ConfiguredColumnMissing { field, column: column.to_string(), available: headers.join(", ") }
        });
    }
    Ok(aliases.iter().find_map(|alias| headers.iter().find(|h| same_header(h, alias)).cloned()))
}

fn no_column(field: &'static str, aliases: &[&str], headers: &[String]) -> SheetError {
    SheetError::NoColumnFound { field, candidates: aliases.join(", "), available: headers.join(", ") }
}

/// One data row of the sheet, keyed by header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRow {
    pub line: usize,
    cells: Vec<(String, String)>,
}

impl SheetRow {
    pub fn new(line: usize, cells: Vec<(String, String)>) -> Self {
        Self { line, cells }
    }

    /// The trimmed value of the cell under `header`, or `None` if the column is absent or the cell is blank.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.iter().find(|(h, _)| h == header).map(|(_, v)| v.trim()).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SheetError> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader.headers()?.iter().map(str::to_string).collect::<Vec<String>>();
        let mut rows = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let record = record?;
            // Header is line 1
            let line = record.position().map(|p| p.line() as usize).unwrap_or(i + 2);
            let cells = headers.iter().cloned().zip(record.iter().map(str::to_string)).collect::<Vec<_>>();
            rows.push(SheetRow::new(line, cells));
        }
        debug!("📄️ Read {} rows with columns: {}", rows.len(), headers.join(", "));
        Ok(Self { headers, rows })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SheetError> {
        let file = std::fs::File::open(path.as_ref())
            .map_err(|e| SheetError::Io(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_reader(file)
    }

    /// Builds a sheet from rows of cell values, such as a Google Sheets range. Rows may be shorter than the header.
    pub fn from_values(values: Vec<Vec<String>>) -> Self {
        let mut values = values.into_iter();
        let headers = values.next().unwrap_or_default().into_iter().map(|h| h.trim().to_string()).collect::<Vec<_>>();
        let rows = values
            .enumerate()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|(i, cells)| SheetRow::new(i + 2, headers.iter().cloned().zip(cells).collect()))
            .collect::<Vec<_>>();
        debug!("📄️ Read {} rows with columns: {}", rows.len(), headers.join(", "));
        Self { headers, rows }
    }

    /// Extracts the engine's view of every row, using `mapping` to locate the columns.
    pub fn sync_rows(&self, mapping: &ColumnMapping) -> Result<Vec<SyncRow>, SheetError> {
        let columns = mapping.resolve(&self.headers)?;
        info!(
            "📄️ Using column '{}' for order references and '{}' for tracking numbers{}",
            columns.external_id,
            columns.tracking_number,
            columns.carrier.as_ref().map(|c| format!(" and '{c}' for carriers")).unwrap_or_default()
        );
        Ok(self.rows.iter().map(|row| columns.extract(row)).collect())
    }
}

impl ResolvedColumns {
    pub fn extract(&self, row: &SheetRow) -> SyncRow {
        SyncRow {
            line: row.line,
            external_id: ExternalOrderRef::new(row.get(&self.external_id).unwrap_or_default()),
            tracking_number: row.get(&self.tracking_number).map(str::to_string),
            carrier: self.carrier.as_deref().and_then(|c| row.get(c)).map(str::to_string),
        }
    }
}
