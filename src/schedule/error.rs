use thiserror::Error;

use crate::sheets::SheetsError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Another refresh of the same document is in flight.
    #[error("already updating schedule")]
    AlreadyUpdating,
    #[error(transparent)]
    Remote(#[from] SheetsError),
    /// The sheet was fetched but its cells are not laid out as expected.
    #[error("unexpected sheet layout: {0}")]
    Shape(String),
    #[error("failed to fetch availability for {}", .failed.join(", "))]
    Players { failed: Vec<String> },
    #[error(transparent)]
    Storage(#[from] StorageError),
}
