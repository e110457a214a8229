use async_trait::async_trait;
use serenity::all::ChannelId;
use tracing::warn;

use crate::reminders::Announcer;
use crate::schedule::Week;
use crate::team::ReminderConfig;

use super::BotState;

impl BotState {
    pub async fn discord_send_message(&self, channel_id: u64, message: &str) -> Result<(), String> {
        let this = self.0.read().await;
        let http = &this
            .discord
            .as_ref()
            .ok_or_else(|| "Not connected to Discord".to_string())?
            .http;

        let channel_id = ChannelId::new(channel_id);
        channel_id.say(http, message).await.map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[async_trait]
impl Announcer for BotState {
    async fn reminder_context(&self, team_id: u64) -> Option<(Week, ReminderConfig)> {
        let team = self.find_team(team_id).await?;
        let config = team.reminders.clone()?;
        let schedule = self.find_schedule_by_team(&team).await.ok()?;

        let data = schedule.read().await;
        data.last_modified?;
        Some((data.week.clone(), config))
    }

    async fn announce(&self, channel_id: u64, text: &str) {
        if let Err(e) = self.discord_send_message(channel_id, text).await {
            warn!("Failed to send reminder to {}: {}", channel_id, e);
        }
    }
}
