use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::sheets::{CellField, CellWrite, DocumentSource};

mod error;
mod player;
mod pool;
mod week;

pub use error::ScheduleError;
pub use player::{Availability, Player};
pub use pool::SchedulePool;
pub use week::Week;

pub const WEEK_SHEET: &str = "Weekly Schedule";
pub const ROSTER_SHEET: &str = "Team Availability";

/* Week and player sheets share one layout: a row per day, a column per block. */
pub const FIRST_DAY_ROW: usize = 2;
pub const FIRST_BLOCK_COLUMN: usize = 2;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScheduleData {
    pub week: Week,
    pub players: Vec<Player>,
    pub valid_activities: Vec<String>,
    /* None until the first successful refresh or restore. */
    pub last_modified: Option<DateTime<Utc>>,
}

/// What the persistent cache keeps of a schedule.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScheduleSnapshot {
    pub id: String,
    pub last_modified: DateTime<Utc>,
    pub players: Vec<Player>,
    pub week: Week,
    pub valid_activities: Vec<String>,
}

/// Which sub-sheet a batch of writes goes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteTarget {
    Week,
    Player(String),
}

/// A tracked schedule spreadsheet and everything parsed from it.
pub struct Schedule {
    id: String,
    source: Arc<dyn DocumentSource>,
    data: RwLock<ScheduleData>,
    updating: AtomicBool,
}

/// Holds the updating flag; clears it when dropped, whatever the outcome.
struct UpdateGuard<'a>(&'a AtomicBool);

impl<'a> UpdateGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| UpdateGuard(flag))
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub fn cell_write(day: usize, block: usize, field: CellField, text: &str) -> CellWrite {
    CellWrite {
        row: FIRST_DAY_ROW + day,
        column: FIRST_BLOCK_COLUMN + block,
        field,
        text: text.to_string(),
    }
}

impl Schedule {
    pub fn new(id: &str, source: Arc<dyn DocumentSource>) -> Self {
        Schedule {
            id: id.to_string(),
            source,
            data: RwLock::new(ScheduleData::default()),
            updating: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn link(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}", self.id)
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ScheduleData> {
        self.data.read().await
    }

    pub async fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.data.read().await.last_modified
    }

    /// Whether the local copy is at least as new as the remote document.
    ///
    /// Equal timestamps count as fresh. Nothing local is touched.
    pub async fn is_fresh(&self) -> Result<bool, ScheduleError> {
        let local = self.last_modified().await;

        self.is_current(local).await
    }

    /// Whether a copy taken at `local` is at least as new as the remote
    /// document.
    pub async fn is_current(&self, local: Option<DateTime<Utc>>) -> Result<bool, ScheduleError> {
        let remote = self.source.last_modified(&self.id).await?;

        Ok(matches!(local, Some(local) if remote <= local))
    }

    /// Re-read the whole document from the remote source.
    ///
    /// Fails with [`ScheduleError::AlreadyUpdating`] instead of waiting when a
    /// refresh is already running. Nothing becomes visible unless every part
    /// of the refresh succeeded.
    pub async fn update(&self) -> Result<(), ScheduleError> {
        let _guard = UpdateGuard::acquire(&self.updating).ok_or(ScheduleError::AlreadyUpdating)?;

        info!("[{}] Refreshing schedule", self.id);

        /* Read the timestamp first; content changed after this point makes the
         * next freshness check fail, which is what we want. */
        let last_modified = self.source.last_modified(&self.id).await?;
        let valid_activities = self.source.valid_activities(&self.id, WEEK_SHEET).await?;
        let week_sheet = self.source.sheet(&self.id, WEEK_SHEET).await?;
        let week = Week::parse(&week_sheet, &valid_activities)?;
        let players = self.fetch_players(week.blocks()).await?;

        let mut data = self.data.write().await;
        *data = ScheduleData {
            week,
            players,
            valid_activities,
            last_modified: Some(last_modified),
        };

        info!(
            "[{}] Schedule refreshed ({} players, {} blocks)",
            self.id,
            data.players.len(),
            data.week.blocks()
        );
        Ok(())
    }

    async fn fetch_players(&self, blocks: usize) -> Result<Vec<Player>, ScheduleError> {
        let roster_sheet = self.source.sheet(&self.id, ROSTER_SHEET).await?;
        let roster = player::roster(&roster_sheet);

        let mut tasks = JoinSet::new();
        for (index, (name, role)) in roster.into_iter().enumerate() {
            let source = self.source.clone();
            let id = self.id.clone();
            tasks.spawn(async move {
                let sheet = source.sheet(&id, &name).await;
                (index, name, sheet.map(|sheet| Player::parse(&sheet, &role, blocks)))
            });
        }

        let mut players = Vec::new();
        let mut failed = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((index, _, Ok(player))) => players.push((index, player)),
                Ok((_, name, Err(error))) => {
                    warn!("[{}] Failed to fetch availability of {}: {}", self.id, name, error);
                    failed.push(name);
                }
                Err(error) => {
                    warn!("[{}] Availability task failed: {}", self.id, error);
                    failed.push("<unknown>".to_string());
                }
            }
        }

        if !failed.is_empty() {
            failed.sort();
            return Err(ScheduleError::Players { failed });
        }

        /* Tasks finish in any order; keep the roster order. */
        players.sort_by_key(|(index, _)| *index);
        Ok(players.into_iter().map(|(_, player)| player).collect())
    }

    /// Push cell writes to the remote sheet and mirror them locally.
    ///
    /// Afterwards the local timestamp follows the remote one, so the bot's own
    /// edits do not make the schedule look stale.
    pub async fn write(
        &self,
        target: &WriteTarget,
        writes: &[CellWrite],
    ) -> Result<(), ScheduleError> {
        let sheet_id = {
            let data = self.data.read().await;
            match target {
                WriteTarget::Week => data.week.sheet_id,
                WriteTarget::Player(name) => data
                    .players
                    .iter()
                    .find(|player| &player.name == name)
                    .map(|player| player.sheet_id)
                    .ok_or_else(|| ScheduleError::Shape(format!("no player named {:?}", name)))?,
            }
        };

        self.source.write_cells(&self.id, sheet_id, writes).await?;

        let modified = self.source.last_modified(&self.id).await;

        let mut data = self.data.write().await;
        for write in writes {
            let (Some(day), Some(block)) = (
                write.row.checked_sub(FIRST_DAY_ROW),
                write.column.checked_sub(FIRST_BLOCK_COLUMN),
            ) else {
                continue;
            };
            if day >= 7 {
                continue;
            }

            match target {
                WriteTarget::Week => {
                    if let Some(cell) = data.week.grid[day].get_mut(block) {
                        match write.field {
                            CellField::Value => cell.value = write.text.clone(),
                            CellField::Note => cell.note = write.text.clone(),
                        }
                    }
                }
                WriteTarget::Player(name) => {
                    let player = data.players.iter_mut().find(|player| &player.name == name);
                    if let Some(slot) =
                        player.and_then(|player| player.availability[day].get_mut(block))
                    {
                        if write.field == CellField::Value {
                            *slot = Availability::parse(&write.text);
                        }
                    }
                }
            }
        }

        match modified {
            Ok(modified) => {
                if data.last_modified.map_or(true, |local| modified > local) {
                    data.last_modified = Some(modified);
                }
            }
            Err(error) => warn!("[{}] Failed to read modified time after write: {}", self.id, error),
        }

        Ok(())
    }

    pub async fn snapshot(&self) -> Option<ScheduleSnapshot> {
        let data = self.data.read().await;

        data.last_modified.map(|last_modified| ScheduleSnapshot {
            id: self.id.clone(),
            last_modified,
            players: data.players.clone(),
            week: data.week.clone(),
            valid_activities: data.valid_activities.clone(),
        })
    }

    pub async fn restore(&self, snapshot: ScheduleSnapshot) {
        let mut data = self.data.write().await;

        *data = ScheduleData {
            week: snapshot.week,
            players: snapshot.players,
            valid_activities: snapshot.valid_activities,
            last_modified: Some(snapshot.last_modified),
        };
    }
}
