use chrono::{DateTime, Datelike, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::sheets::{Cell, SheetGrid};

use super::{ScheduleError, FIRST_BLOCK_COLUMN, FIRST_DAY_ROW};

/* ISO order; index 0 is Monday. */
const DAY_NAMES: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/* Header hours are written on a 12 hour clock and are all afternoon or evening. */
pub fn local_hour(label: u32) -> u32 {
    if label < 12 {
        label + 12
    } else {
        label
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Week {
    pub sheet_id: i64,
    pub date: String,
    pub days: [String; 7],
    /* Hour label of the first block, as written in the sheet header. */
    pub start_time: u32,
    pub block_length: u32,
    pub timezone: String,
    pub grid: [Vec<Cell>; 7],
}

impl Week {
    pub fn parse(sheet: &SheetGrid, valid_activities: &[String]) -> Result<Self, ScheduleError> {
        let header = sheet.value(FIRST_DAY_ROW - 1, FIRST_BLOCK_COLUMN);
        let (start, end) = header
            .split_once('-')
            .and_then(|(start, end)| {
                Some((start.trim().parse::<u32>().ok()?, end.trim().parse::<u32>().ok()?))
            })
            .ok_or_else(|| {
                ScheduleError::Shape(format!("block header {:?} is not an hour range", header))
            })?;
        if end <= start {
            return Err(ScheduleError::Shape(format!(
                "block header {:?} has no positive length",
                header
            )));
        }

        let first_day = sheet.value(FIRST_DAY_ROW, FIRST_BLOCK_COLUMN - 1);
        let date = first_day
            .split_once(", ")
            .map(|(_, date)| date.to_string())
            .ok_or_else(|| {
                ScheduleError::Shape(format!("day label {:?} has no date", first_day))
            })?;

        /* The grid is as wide as the run of valid activities on the first day. */
        let mut blocks = 0;
        while valid_activities
            .iter()
            .any(|activity| activity == sheet.value(FIRST_DAY_ROW, FIRST_BLOCK_COLUMN + blocks))
        {
            blocks += 1;
        }
        if blocks == 0 {
            return Err(ScheduleError::Shape(
                "no valid activities on the first day".to_string(),
            ));
        }

        let days: [String; 7] = std::array::from_fn(|day| {
            sheet
                .value(FIRST_DAY_ROW + day, FIRST_BLOCK_COLUMN - 1)
                .to_string()
        });
        let grid: [Vec<Cell>; 7] = std::array::from_fn(|day| {
            (0..blocks)
                .map(|block| {
                    sheet
                        .cell(FIRST_DAY_ROW + day, FIRST_BLOCK_COLUMN + block)
                        .clone()
                })
                .collect()
        });

        Ok(Week {
            sheet_id: sheet.id,
            date,
            days,
            start_time: start,
            block_length: end - start,
            timezone: sheet
                .value(FIRST_DAY_ROW - 1, FIRST_BLOCK_COLUMN + blocks)
                .to_string(),
            grid,
        })
    }

    pub fn blocks(&self) -> usize {
        self.grid[0].len()
    }

    pub fn activities_on(&self, day: usize) -> Vec<&str> {
        self.grid[day].iter().map(|cell| cell.value.as_str()).collect()
    }

    pub fn block_hour(&self, block: usize) -> u32 {
        self.start_time + block as u32 * self.block_length
    }

    /// Block that starts at the given header hour, if any.
    pub fn block_at(&self, hour: u32) -> Option<usize> {
        if self.block_length == 0
            || hour < self.start_time
            || (hour - self.start_time) % self.block_length != 0
        {
            return None;
        }
        let block = ((hour - self.start_time) / self.block_length) as usize;
        (block < self.blocks()).then_some(block)
    }

    /// Block starting at an hour of the day (0-23), for reminders.
    pub fn block_starting_at(&self, hour: u32) -> Option<usize> {
        (0..self.blocks()).find(|&block| local_hour(self.block_hour(block)) == hour)
    }

    fn sunday_first(&self) -> bool {
        self.days.first().is_some_and(|day| day.starts_with("Sunday"))
    }

    /// Grid row of a weekday, following the day order of the sheet.
    pub fn weekday_index(&self, weekday: Weekday) -> usize {
        if self.sunday_first() {
            weekday.num_days_from_sunday() as usize
        } else {
            weekday.num_days_from_monday() as usize
        }
    }

    pub fn weekday_at(&self, index: usize) -> Weekday {
        let iso = if self.sunday_first() { (index + 6) % 7 } else { index % 7 };
        DAY_NAMES[iso].1
    }

    /// Grid row for a day name; full names and prefixes of three or more letters match.
    pub fn day_index(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        if name.len() < 3 {
            return None;
        }

        DAY_NAMES
            .iter()
            .find(|(full, _)| full.starts_with(&name))
            .map(|(_, weekday)| self.weekday_index(*weekday))
    }

    pub fn today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> usize {
        self.weekday_index(now.weekday())
    }
}
