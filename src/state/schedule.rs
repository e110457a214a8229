use std::sync::Arc;

use tracing::warn;

use crate::monitor::{documents_to_track, poll_interval, refresh};
use crate::schedule::{Schedule, ScheduleError, WriteTarget};
use crate::sheets::CellWrite;
use crate::storage::ScheduleStore;
use crate::team::Team;

use super::{BotState, TeamError};

impl BotState {
    /// Point the team of a channel at a spreadsheet and start tracking it.
    ///
    /// The team is saved even when the first load fails; the poller keeps
    /// retrying, so the outcome of the load is returned separately. A
    /// document no team uses any more stops being polled.
    pub async fn set_sheet(
        &self,
        guild_id: u64,
        channel_id: u64,
        document_id: &str,
        interval: Option<u64>,
    ) -> Result<(Team, Result<Arc<Schedule>, ScheduleError>), TeamError> {
        let team = match self.find_team_by_channel(guild_id, channel_id).await {
            Some(team) => team,
            None => self.guild_team(guild_id).await?,
        };

        let (team, previous) = self
            .update_team(team.id, |team| {
                if interval.is_some() {
                    team.update_interval = interval;
                }
                Ok(team.spreadsheet_id.replace(document_id.to_string()))
            })
            .await?;

        let documents = {
            let this = self.0.read().await;
            documents_to_track(&this.teams, this.config.default_update_interval)
        };
        let monitor = self.monitor().await;

        if let Some(previous) = previous.filter(|previous| previous != document_id) {
            match documents.get(&previous) {
                Some(minutes) => {
                    if let Err(e) = monitor.track(&previous, poll_interval(*minutes)).await {
                        warn!("[{}] Reload failed: {}", previous, e);
                    }
                }
                None => monitor.untrack(&previous),
            }
        }

        let minutes = documents
            .get(document_id)
            .copied()
            .or(team.update_interval)
            .unwrap_or(1);
        let loaded = monitor
            .track(document_id, poll_interval(minutes))
            .await;

        Ok((team, loaded))
    }

    /// Re-read a schedule on request and persist it.
    pub async fn refresh_schedule(&self, schedule: &Schedule) -> Result<(), ScheduleError> {
        let storage = self.storage().await;

        refresh(schedule, storage.as_ref()).await
    }

    /// Write cells to a schedule and persist the result.
    pub async fn write_schedule(
        &self,
        schedule: &Schedule,
        target: &WriteTarget,
        writes: &[CellWrite],
    ) -> Result<(), ScheduleError> {
        schedule.write(target, writes).await?;

        if let Some(snapshot) = schedule.snapshot().await {
            self.storage().await.cache_schedule(&snapshot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::schedule::cell_write;
    use crate::sheets::fake::timestamp;
    use crate::sheets::CellField;
    use crate::state::tests::bot;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_sheet_tracks_the_document() {
        let folder = tempfile::tempdir().unwrap();
        let (bot, source, _shutdown) = bot(&folder);

        let (team, loaded) = bot.set_sheet(100, 11, "doc", Some(2)).await.unwrap();

        assert!(team.is_guild());
        assert_eq!(team.spreadsheet_id.as_deref(), Some("doc"));
        assert_eq!(team.update_interval, Some(2));
        assert_eq!(loaded.unwrap().last_modified().await, Some(timestamp(12, 0)));
        assert_eq!(source.week_fetches(), 1);
        assert!(bot.monitor().await.is_polling("doc"));

        let (_, schedule) = bot.team_schedule(100, 11).await.unwrap();
        assert_eq!(schedule.id(), "doc");
    }

    #[tokio::test(start_paused = true)]
    async fn documents_nobody_uses_stop_polling() {
        let folder = tempfile::tempdir().unwrap();
        let (bot, _, _shutdown) = bot(&folder);
        bot.add_team(100, "Academy", 12).await.unwrap();
        let monitor = bot.monitor().await;

        bot.set_sheet(100, 11, "old", None).await.unwrap();
        bot.set_sheet(100, 12, "shared", Some(10)).await.unwrap();
        bot.set_sheet(100, 11, "shared", Some(3)).await.unwrap();

        assert!(!monitor.is_polling("old"));
        assert_eq!(monitor.polling_interval("shared"), Some(Duration::from_secs(3 * 60)));

        /* Academy still uses the shared document, at its own interval. */
        bot.set_sheet(100, 11, "other", None).await.unwrap();
        assert_eq!(monitor.polling_interval("shared"), Some(Duration::from_secs(10 * 60)));
        assert!(monitor.is_polling("other"));
    }

    #[tokio::test(start_paused = true)]
    async fn writes_reach_the_cache() {
        let folder = tempfile::tempdir().unwrap();
        let (bot, source, _shutdown) = bot(&folder);
        let (_, loaded) = bot.set_sheet(100, 11, "doc", None).await.unwrap();
        let schedule = loaded.unwrap();

        source.set_modified(timestamp(12, 10));
        bot.write_schedule(
            &schedule,
            &WriteTarget::Week,
            &[cell_write(2, 0, CellField::Value, "Scrim")],
        )
        .await
        .unwrap();

        let cached = bot.storage().await.cached_schedule("doc").unwrap().unwrap();
        assert_eq!(cached.week.grid[2][0].value, "Scrim");
        assert_eq!(cached.last_modified, timestamp(12, 10));
    }
}
