use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReminderConfig {
    pub activities: Vec<String>,
    pub announce_channel: Option<u64>,
    /* Full mention text, e.g. "<@&1234>". */
    pub role_mention: Option<String>,
    /* Minutes before an activity starts. */
    pub intervals: Vec<u32>,
}

impl ReminderConfig {
    /// A fresh config, reminding 15 and 45 minutes ahead.
    pub fn new() -> Self {
        ReminderConfig {
            intervals: vec![15, 45],
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Team {
    pub id: u64,
    pub guild_id: u64,
    /* Empty for the team that stands for the whole guild. */
    pub name: String,
    pub channels: Vec<u64>,
    pub spreadsheet_id: Option<String>,
    /* Minutes between freshness checks; the configured default when unset. */
    pub update_interval: Option<u64>,
    #[serde(default)]
    pub reminders: Option<ReminderConfig>,
}

impl Team {
    pub fn new(id: u64, guild_id: u64, name: &str, channels: Vec<u64>) -> Self {
        Team {
            id,
            guild_id,
            name: name.to_string(),
            channels,
            spreadsheet_id: None,
            update_interval: None,
            reminders: None,
        }
    }

    pub fn is_guild(&self) -> bool {
        self.name.is_empty()
    }

    pub fn display_name(&self) -> &str {
        if self.is_guild() {
            "this server"
        } else {
            &self.name
        }
    }
}

/// The named team owning the channel, falling back to the guild-wide team.
pub fn find_by_channel(teams: &[Team], guild_id: u64, channel_id: u64) -> Option<&Team> {
    let in_guild = || teams.iter().filter(move |team| team.guild_id == guild_id);

    in_guild()
        .find(|team| !team.is_guild() && team.channels.contains(&channel_id))
        .or_else(|| in_guild().find(|team| team.is_guild()))
}

/// The team a channel is already claimed by, if any, anywhere in the guild.
pub fn channel_owner(teams: &[Team], guild_id: u64, channel_id: u64) -> Option<&Team> {
    teams
        .iter()
        .find(|team| team.guild_id == guild_id && !team.is_guild() && team.channels.contains(&channel_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams() -> Vec<Team> {
        vec![
            Team::new(1, 100, "", vec![]),
            Team::new(2, 100, "Academy", vec![11, 12]),
            Team::new(3, 200, "Main", vec![21]),
        ]
    }

    #[test]
    fn named_team_wins_over_guild_team() {
        let teams = teams();

        assert_eq!(find_by_channel(&teams, 100, 12).map(|t| t.id), Some(2));
        assert_eq!(find_by_channel(&teams, 100, 13).map(|t| t.id), Some(1));
    }

    #[test]
    fn guild_without_guild_team_has_no_fallback() {
        let teams = teams();

        assert_eq!(find_by_channel(&teams, 200, 21).map(|t| t.id), Some(3));
        assert!(find_by_channel(&teams, 200, 22).is_none());
        assert!(find_by_channel(&teams, 300, 21).is_none());
    }

    #[test]
    fn channel_owner_ignores_guild_team() {
        let teams = teams();

        assert_eq!(channel_owner(&teams, 100, 11).map(|t| t.id), Some(2));
        assert!(channel_owner(&teams, 100, 13).is_none());
    }
}
