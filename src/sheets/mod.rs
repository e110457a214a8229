use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
pub mod fake;
mod google;

pub use google::GoogleSheets;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Failed to obtain access token: {0}")]
    Auth(String),
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status code {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid timestamp {0:?}")]
    Timestamp(String),
    #[error("No sheet titled {0:?}")]
    MissingSheet(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cell {
    pub value: String,
    pub note: String,
}

impl Cell {
    pub fn new(value: &str, note: &str) -> Self {
        Cell {
            value: value.to_string(),
            note: note.to_string(),
        }
    }
}

static EMPTY_CELL: Cell = Cell {
    value: String::new(),
    note: String::new(),
};

/// One sub-sheet of a spreadsheet, as fetched from the remote source.
///
/// Rows and columns are zero-based; anything outside the populated range
/// reads as an empty cell.
#[derive(Clone, Debug, Default)]
pub struct SheetGrid {
    pub id: i64,
    pub title: String,
    rows: Vec<Vec<Cell>>,
}

impl SheetGrid {
    pub fn new(id: i64, title: &str, rows: Vec<Vec<Cell>>) -> Self {
        SheetGrid {
            id,
            title: title.to_string(),
            rows,
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn value(&self, row: usize, column: usize) -> &str {
        &self.cell(row, column).value
    }

    pub fn note(&self, row: usize, column: usize) -> &str {
        &self.cell(row, column).note
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellField {
    Value,
    Note,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellWrite {
    pub row: usize,
    pub column: usize,
    pub field: CellField,
    pub text: String,
}

/// The remote spreadsheet service the schedules are read from and written to.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// When the document was last modified, truncated to whole seconds.
    async fn last_modified(&self, document_id: &str) -> Result<DateTime<Utc>, SheetsError>;

    /// Activity labels accepted by the validation rules of the given sub-sheet.
    async fn valid_activities(
        &self,
        document_id: &str,
        sheet_title: &str,
    ) -> Result<Vec<String>, SheetsError>;

    async fn sheet(&self, document_id: &str, title: &str) -> Result<SheetGrid, SheetsError>;

    /// Push all writes for one sub-sheet in a single batch.
    async fn write_cells(
        &self,
        document_id: &str,
        sheet_id: i64,
        writes: &[CellWrite],
    ) -> Result<(), SheetsError>;
}

pub fn parse_modified_time(raw: &str) -> Result<DateTime<Utc>, SheetsError> {
    /* Drop the fractional seconds (and the zone marker that follows them). */
    let trimmed = match raw.rfind('.') {
        Some(index) => &raw[..index],
        None => raw.trim_end_matches('Z'),
    };

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|time| time.and_utc())
        .map_err(|_| SheetsError::Timestamp(raw.to_string()))
}
