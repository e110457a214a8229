use crate::state::{BotState, TeamError};
use crate::team::{ReminderConfig, Team};

use super::{parse_channel_mention, CommandError, EmbedView, Invocation, Reply};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Activities,
    Channel,
    Role,
    Intervals,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Field::Activities => "activities",
            Field::Channel => "channel",
            Field::Role => "role",
            Field::Intervals => "intervals",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Change {
    Set,
    Add,
    Del,
}

impl Change {
    fn fields(self) -> &'static [Field] {
        match self {
            Change::Set => &[Field::Activities, Field::Channel, Field::Role],
            Change::Add | Change::Del => &[Field::Activities, Field::Intervals],
        }
    }
}

fn parse_field(name: &str, allowed: &[Field]) -> Result<Field, String> {
    allowed
        .iter()
        .copied()
        .find(|field| field.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            let options = allowed
                .iter()
                .map(|field| field.name())
                .collect::<Vec<_>>()
                .join(", ");
            format!("Invalid field {:?}, valid options: {}", name, options)
        })
}

/// `Scrim, Player VOD,` to `["Scrim", "Player VOD"]`.
fn split_list(args: &[&str]) -> Vec<String> {
    args.join(" ")
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn canonical_activities(items: &[String], valid: Option<&[String]>) -> Result<Vec<String>, String> {
    let Some(valid) = valid else {
        return Err("No schedule for this team; can't validate activities.".to_string());
    };

    items
        .iter()
        .map(|item| {
            valid
                .iter()
                .find(|activity| activity.eq_ignore_ascii_case(item))
                .cloned()
                .ok_or_else(|| format!("Invalid activity {:?}.", item))
        })
        .collect()
}

fn parse_intervals(items: &[String]) -> Result<Vec<u32>, String> {
    items
        .iter()
        .map(|item| item.parse().map_err(|_| format!("Invalid number {:?}", item)))
        .collect()
}

fn parse_role(role: &str) -> Option<String> {
    let id = role
        .strip_prefix("<@&")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(role);

    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("<@&{}>", id))
    } else {
        None
    }
}

fn add_missing<T: PartialEq>(list: &mut Vec<T>, items: Vec<T>) -> bool {
    let before = list.len();
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
    list.len() != before
}

fn remove_present<T: PartialEq>(list: &mut Vec<T>, items: &[T]) -> bool {
    let before = list.len();
    list.retain(|item| !items.contains(item));
    list.len() != before
}

/// Apply one change to a reminder config; true when anything changed.
fn apply(
    config: &mut ReminderConfig,
    change: Change,
    field: Field,
    items: &[String],
    valid: Option<&[String]>,
) -> Result<bool, String> {
    match (change, field) {
        (Change::Set, Field::Activities) => {
            let activities = canonical_activities(items, valid)?;
            let changed = activities != config.activities;
            config.activities = activities;
            Ok(changed)
        }
        (Change::Set, Field::Channel) => {
            let channel = match items {
                [mention] => parse_channel_mention(mention),
                _ => None,
            }
            .ok_or("Invalid channel mention.")?;
            Ok(config.announce_channel.replace(channel) != Some(channel))
        }
        (Change::Set, Field::Role) => {
            let role = match items {
                [role] => parse_role(role),
                _ => None,
            }
            .ok_or("Invalid role ID.")?;
            Ok(config.role_mention.replace(role.clone()) != Some(role))
        }
        (Change::Add, Field::Activities) => {
            let activities = canonical_activities(items, valid)?;
            Ok(add_missing(&mut config.activities, activities))
        }
        (Change::Del, Field::Activities) => {
            let before = config.activities.len();
            config
                .activities
                .retain(|activity| !items.iter().any(|item| item.eq_ignore_ascii_case(activity)));
            Ok(config.activities.len() != before)
        }
        (Change::Add, Field::Intervals) => {
            let changed = add_missing(&mut config.intervals, parse_intervals(items)?);
            config.intervals.sort_unstable();
            Ok(changed)
        }
        (Change::Del, Field::Intervals) => {
            let intervals = parse_intervals(items)?;
            Ok(remove_present(&mut config.intervals, &intervals))
        }
        (_, field) => Err(format!("Can't change {} this way.", field.name())),
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        return "None".to_string();
    }
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn config_embed(team: &Team, config: &ReminderConfig) -> EmbedView {
    let channel = config
        .announce_channel
        .map(|channel| format!("<#{}>", channel))
        .unwrap_or_else(|| "None".to_string());
    let role = config.role_mention.clone().unwrap_or_else(|| "None".to_string());

    EmbedView {
        title: format!("Reminders for {}", team.display_name()),
        link: None,
        footer: Some("Intervals are minutes before each activity".to_string()),
        fields: vec![
            ("Activities".to_string(), join(&config.activities), true),
            ("Channel".to_string(), channel, true),
            ("Role".to_string(), role, true),
            ("Intervals".to_string(), join(&config.intervals), true),
        ],
    }
}

async fn team_here(bot: &BotState, at: &Invocation) -> Result<Team, CommandError> {
    let guild_id = at.guild()?;

    Ok(bot
        .find_team_by_channel(guild_id, at.channel_id)
        .await
        .ok_or(TeamError::NoTeam)?)
}

/// Activities the team's schedule accepts, once it has loaded.
async fn valid_activities(bot: &BotState, team: &Team) -> Option<Vec<String>> {
    let schedule = bot.find_schedule_by_team(team).await.ok()?;
    let data = schedule.read().await;

    data.last_modified.map(|_| data.valid_activities.clone())
}

pub async fn show(bot: &BotState, at: &Invocation) -> Result<Reply, CommandError> {
    let team = team_here(bot, at).await?;

    Ok(match &team.reminders {
        Some(config) => Reply::Embed(config_embed(&team, config)),
        None => Reply::text("No reminder config for this team."),
    })
}

async fn change(
    bot: &BotState,
    at: &Invocation,
    args: &[&str],
    change: Change,
) -> Result<Reply, CommandError> {
    let team = team_here(bot, at).await?;

    let Some((name, values)) = args.split_first() else {
        return Ok(Reply::text("No field given!"));
    };
    let field = match parse_field(name, change.fields()) {
        Ok(field) => field,
        Err(message) => return Ok(Reply::text(message)),
    };
    let items = split_list(values);
    if items.is_empty() {
        return Ok(Reply::text("No values given!"));
    }
    if change == Change::Del && team.reminders.is_none() {
        return Ok(Reply::text("No reminder config set up."));
    }

    let valid = match field {
        Field::Activities => valid_activities(bot, &team).await,
        _ => None,
    };

    let (team, changed) = bot
        .update_team(team.id, |team| {
            let mut config = team.reminders.clone().unwrap_or_else(ReminderConfig::new);
            let changed = apply(&mut config, change, field, &items, valid.as_deref())?;
            if changed {
                team.reminders = Some(config);
            }
            Ok(changed)
        })
        .await?;

    if !changed {
        return Ok(Reply::text("Nothing to change."));
    }
    bot.reminders().await.register(&team);
    Ok(Reply::text(format!("Updated {}.", field.name())))
}

pub async fn set(bot: &BotState, at: &Invocation, args: &[&str]) -> Result<Reply, CommandError> {
    change(bot, at, args, Change::Set).await
}

pub async fn add(bot: &BotState, at: &Invocation, args: &[&str]) -> Result<Reply, CommandError> {
    change(bot, at, args, Change::Add).await
}

pub async fn del(bot: &BotState, at: &Invocation, args: &[&str]) -> Result<Reply, CommandError> {
    change(bot, at, args, Change::Del).await
}
