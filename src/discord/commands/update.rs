use tracing::{error, warn};

use crate::schedule::{Schedule, ScheduleError};
use crate::state::BotState;

use super::{CommandError, Invocation, Reply};

pub async fn run(bot: &BotState, at: &Invocation) -> Result<Reply, CommandError> {
    let (_, schedule) = bot.team_schedule(at.guild()?, at.channel_id).await?;
    if schedule.is_updating() {
        return Ok(Reply::text("Already updating."));
    }

    match schedule.is_fresh().await {
        Ok(true) => return Ok(Reply::text("Nothing to update.")),
        Ok(false) => {}
        Err(e) => {
            warn!("[{}] Freshness check failed: {}", schedule.id(), e);
            return Ok(Reply::text("Error checking if the sheet is updated. :("));
        }
    }

    let bot = bot.clone();
    Ok(Reply::Progress {
        message: "Updating...".to_string(),
        outcome: Box::pin(async move { finish(&bot, &schedule).await.to_string() }),
    })
}

async fn finish(bot: &BotState, schedule: &Schedule) -> &'static str {
    match bot.refresh_schedule(schedule).await {
        Ok(()) => "Finished updating. :)",
        Err(ScheduleError::AlreadyUpdating) => "Already updating.",
        Err(e) => {
            error!("[{}] Manual update failed: {}", schedule.id(), e);
            "Error updating. :("
        }
    }
}
