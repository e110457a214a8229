//! In-memory document source used by the tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::{Cell, CellWrite, DocumentSource, SheetGrid, SheetsError};

pub struct FakeSource {
    modified: Mutex<DateTime<Utc>>,
    activities: Mutex<Vec<String>>,
    sheets: Mutex<HashMap<String, SheetGrid>>,
    failing: Mutex<HashSet<String>>,
    fail_last_modified: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    pub week_fetches: AtomicUsize,
    pub writes: Mutex<Vec<(i64, CellWrite)>>,
}

pub fn timestamp(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 10, 8, hour, minute, 0).unwrap()
}

fn grid(id: i64, title: &str, rows: &[(usize, Vec<(usize, &str, &str)>)]) -> SheetGrid {
    let mut cells: Vec<Vec<Cell>> = Vec::new();
    for (row, columns) in rows {
        if cells.len() <= *row {
            cells.resize_with(row + 1, Vec::new);
        }
        for (column, value, note) in columns {
            if cells[*row].len() <= *column {
                cells[*row].resize_with(column + 1, Cell::default);
            }
            cells[*row][*column] = Cell::new(value, note);
        }
    }
    SheetGrid::new(id, title, cells)
}

/// A weekly schedule with 3 two-hour blocks starting at 4.
pub fn week_sheet() -> SheetGrid {
    let days = [
        "Monday, 10/07",
        "Tuesday, 10/08",
        "Wednesday, 10/09",
        "Thursday, 10/10",
        "Friday, 10/11",
        "Saturday, 10/12",
        "Sunday, 10/13",
    ];
    let mut rows = vec![(1, vec![(2, "4-6", ""), (5, "PST", "")])];
    for (index, day) in days.iter().enumerate() {
        let (first, second) = if index < 3 { ("Free", "Scrim") } else { ("Scrim", "Free") };
        let note = if index == 1 { "Inked" } else { "" };
        rows.push((
            index + 2,
            vec![
                (1, *day, ""),
                (2, first, ""),
                (3, second, note),
                (4, "Free", ""),
                /* Past the last block; must not widen the grid. */
                (5, "9pm", ""),
            ],
        ));
    }
    grid(1, "Weekly Schedule", &rows)
}

pub fn roster_sheet() -> SheetGrid {
    grid(
        2,
        "Team Availability",
        &[
            (3, vec![(1, "Tanks", ""), (2, "Taub", "")]),
            (4, vec![(2, "Moth", "")]),
            (5, vec![(1, "Supports", ""), (2, "Ana", "")]),
            (6, vec![(1, "", ""), (2, "", "")]),
            (7, vec![(1, "DPS", ""), (2, "Soldier", "")]),
        ],
    )
}

pub fn player_sheet(id: i64, name: &str, answer: &str) -> SheetGrid {
    let rows: Vec<(usize, Vec<(usize, &str, &str)>)> = (2..9)
        .map(|row| (row, vec![(2, answer, ""), (3, "Maybe", ""), (4, "no", "")]))
        .collect();
    grid(id, name, &rows)
}

impl FakeSource {
    pub fn new(modified: DateTime<Utc>) -> Self {
        let mut sheets = HashMap::new();
        for sheet in [
            week_sheet(),
            roster_sheet(),
            player_sheet(10, "Taub", "Yes"),
            player_sheet(11, "Moth", "No"),
            player_sheet(12, "Ana", "Yes"),
            player_sheet(13, "Soldier", ""),
        ] {
            sheets.insert(sheet.title.clone(), sheet);
        }

        FakeSource {
            modified: Mutex::new(modified),
            activities: Mutex::new(vec![
                "Free".to_string(),
                "Scrim".to_string(),
                "TBD".to_string(),
            ]),
            sheets: Mutex::new(sheets),
            failing: Mutex::new(HashSet::new()),
            fail_last_modified: Mutex::new(false),
            delay: Mutex::new(None),
            week_fetches: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_modified(&self, modified: DateTime<Utc>) {
        *self.modified.lock().unwrap() = modified;
    }

    pub fn set_sheet(&self, sheet: SheetGrid) {
        self.sheets.lock().unwrap().insert(sheet.title.clone(), sheet);
    }

    pub fn fail_sheet(&self, title: &str) {
        self.failing.lock().unwrap().insert(title.to_string());
    }

    pub fn fail_last_modified(&self, fail: bool) {
        *self.fail_last_modified.lock().unwrap() = fail;
    }

    /// Make every sheet fetch take this long, to hold a refresh in flight.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn week_fetches(&self) -> usize {
        self.week_fetches.load(Ordering::SeqCst)
    }
}

fn unavailable() -> SheetsError {
    SheetsError::Status {
        status: 503,
        body: "backend unavailable".to_string(),
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn last_modified(&self, _document_id: &str) -> Result<DateTime<Utc>, SheetsError> {
        if *self.fail_last_modified.lock().unwrap() {
            return Err(unavailable());
        }
        Ok(*self.modified.lock().unwrap())
    }

    async fn valid_activities(
        &self,
        _document_id: &str,
        _sheet_title: &str,
    ) -> Result<Vec<String>, SheetsError> {
        Ok(self.activities.lock().unwrap().clone())
    }

    async fn sheet(&self, _document_id: &str, title: &str) -> Result<SheetGrid, SheetsError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if title == "Weekly Schedule" {
            self.week_fetches.fetch_add(1, Ordering::SeqCst);
        }
        if self.failing.lock().unwrap().contains(title) {
            return Err(unavailable());
        }
        self.sheets
            .lock()
            .unwrap()
            .get(title)
            .cloned()
            .ok_or_else(|| SheetsError::MissingSheet(title.to_string()))
    }

    async fn write_cells(
        &self,
        _document_id: &str,
        sheet_id: i64,
        writes: &[CellWrite],
    ) -> Result<(), SheetsError> {
        let mut log = self.writes.lock().unwrap();
        for write in writes {
            log.push((sheet_id, write.clone()));
        }
        Ok(())
    }
}
