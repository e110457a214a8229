use tracing::warn;

use crate::monitor::MAX_INTERVAL_MINUTES;
use crate::state::BotState;

use super::{parse_channel_mention, CommandError, Invocation, Reply};

fn valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub async fn add_team(bot: &BotState, at: &Invocation, args: &[&str]) -> Result<Reply, CommandError> {
    let guild_id = at.guild()?;

    let (name, channel) = match args {
        [name, channel] => (*name, *channel),
        [_] => return Ok(Reply::text("Bad amount of args; no channel given!")),
        _ => return Ok(Reply::text("usage: !add_team <name> <#channel>")),
    };
    let Some(channel_id) = parse_channel_mention(channel) else {
        return Ok(Reply::text("Invalid channel."));
    };

    bot.add_team(guild_id, name, channel_id).await?;
    Ok(Reply::text("Added team."))
}

pub async fn add_channel(
    bot: &BotState,
    at: &Invocation,
    args: &[&str],
) -> Result<Reply, CommandError> {
    let guild_id = at.guild()?;
    if args.is_empty() {
        return Ok(Reply::text("No channels given!"));
    }

    let team = bot.find_team_by_channel(guild_id, at.channel_id).await;
    let Some(team) = team.filter(|team| !team.is_guild()) else {
        return Ok(Reply::text("No team in this channel."));
    };

    let mut channels = Vec::new();
    for arg in args {
        match parse_channel_mention(arg) {
            Some(channel_id) => channels.push(channel_id),
            None => return Ok(Reply::text(format!("Invalid channel {:?}.", arg))),
        }
    }

    bot.add_channels(team.id, &channels).await?;
    Ok(Reply::text("Added channels."))
}

pub async fn set_sheet(bot: &BotState, at: &Invocation, args: &[&str]) -> Result<Reply, CommandError> {
    let guild_id = at.guild()?;

    let (document_id, interval) = match args {
        [document_id] => (*document_id, None),
        [document_id, minutes] => match minutes.parse::<u64>() {
            Ok(minutes) if (1..=MAX_INTERVAL_MINUTES).contains(&minutes) => {
                (*document_id, Some(minutes))
            }
            _ => {
                return Ok(Reply::text(format!(
                    "Invalid interval {:?}; give a number of minutes.",
                    minutes
                )))
            }
        },
        _ => return Ok(Reply::text("usage: !set_sheet <spreadsheet id> [interval minutes]")),
    };
    if !valid_document_id(document_id) {
        return Ok(Reply::text("Invalid spreadsheet id."));
    }

    let (team, loaded) = bot
        .set_sheet(guild_id, at.channel_id, document_id, interval)
        .await?;

    Ok(match loaded {
        Ok(schedule) => Reply::text(format!(
            "Now tracking {} for {}.",
            schedule.link(),
            team.display_name()
        )),
        Err(e) => {
            warn!("[{}] First load for team {} failed: {}", document_id, team.id, e);
            Reply::text("Saved, but loading the spreadsheet failed. I will keep trying.")
        }
    })
}
