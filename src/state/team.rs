use std::sync::Arc;

use thiserror::Error;

use crate::schedule::Schedule;
use crate::storage::StorageError;
use crate::team::{self, Team};

use super::BotState;

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("No team in this channel or server.")]
    NoTeam,
    #[error("No spreadsheet for this team.")]
    NoSpreadsheet,
    #[error("{0}")]
    Rejected(String),
    #[error("Error saving team: {0}")]
    Storage(#[from] StorageError),
}

impl BotState {
    pub async fn find_team_by_channel(&self, guild_id: u64, channel_id: u64) -> Option<Team> {
        let this = self.0.read().await;

        team::find_by_channel(&this.teams, guild_id, channel_id).cloned()
    }

    pub async fn find_team(&self, team_id: u64) -> Option<Team> {
        let this = self.0.read().await;

        this.teams.iter().find(|team| team.id == team_id).cloned()
    }

    pub async fn find_schedule_by_team(&self, team: &Team) -> Result<Arc<Schedule>, TeamError> {
        let document_id = team.spreadsheet_id.as_ref().ok_or(TeamError::NoSpreadsheet)?;
        let this = self.0.read().await;

        this.pool.get(document_id).ok_or(TeamError::NoSpreadsheet)
    }

    /// The team of a channel together with its schedule.
    pub async fn team_schedule(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(Team, Arc<Schedule>), TeamError> {
        let team = self
            .find_team_by_channel(guild_id, channel_id)
            .await
            .ok_or(TeamError::NoTeam)?;
        let schedule = self.find_schedule_by_team(&team).await?;

        Ok((team, schedule))
    }

    pub async fn add_team(
        &self,
        guild_id: u64,
        name: &str,
        channel_id: u64,
    ) -> Result<Team, TeamError> {
        let mut this = self.0.write().await;

        if this
            .teams
            .iter()
            .any(|team| team.guild_id == guild_id && team.name.eq_ignore_ascii_case(name))
        {
            return Err(TeamError::Rejected(format!("Team {:?} already exists.", name)));
        }
        if let Some(owner) = team::channel_owner(&this.teams, guild_id, channel_id) {
            return Err(TeamError::Rejected(format!(
                "Channel already occupied by {:?}.",
                owner.name
            )));
        }

        let id = this.teams.iter().map(|team| team.id).max().unwrap_or(0) + 1;
        let team = Team::new(id, guild_id, name, vec![channel_id]);
        this.storage.save_team(&team)?;
        this.teams.push(team.clone());

        Ok(team)
    }

    /// The guild-wide team, created on first use.
    pub async fn guild_team(&self, guild_id: u64) -> Result<Team, TeamError> {
        let mut this = self.0.write().await;

        if let Some(team) = this
            .teams
            .iter()
            .find(|team| team.guild_id == guild_id && team.is_guild())
        {
            return Ok(team.clone());
        }

        let id = this.teams.iter().map(|team| team.id).max().unwrap_or(0) + 1;
        let team = Team::new(id, guild_id, "", vec![]);
        this.storage.save_team(&team)?;
        this.teams.push(team.clone());

        Ok(team)
    }

    pub async fn add_channels(&self, team_id: u64, channels: &[u64]) -> Result<Team, TeamError> {
        let mut this = self.0.write().await;

        let index = this
            .teams
            .iter()
            .position(|team| team.id == team_id)
            .ok_or(TeamError::NoTeam)?;
        let mut team = this.teams[index].clone();

        for channel_id in channels {
            if team.channels.contains(channel_id) {
                return Err(TeamError::Rejected(format!("<#{}> already added.", channel_id)));
            }
            if let Some(owner) = team::channel_owner(&this.teams, team.guild_id, *channel_id) {
                return Err(TeamError::Rejected(format!(
                    "<#{}> already occupied by {:?}.",
                    channel_id, owner.name
                )));
            }
            team.channels.push(*channel_id);
        }

        this.storage.save_team(&team)?;
        this.teams[index] = team.clone();

        Ok(team)
    }

    /// Change a team and persist it; nothing changes when `change` rejects.
    pub async fn update_team<R>(
        &self,
        team_id: u64,
        change: impl FnOnce(&mut Team) -> Result<R, String>,
    ) -> Result<(Team, R), TeamError> {
        let mut this = self.0.write().await;

        let index = this
            .teams
            .iter()
            .position(|team| team.id == team_id)
            .ok_or(TeamError::NoTeam)?;
        let mut team = this.teams[index].clone();

        let result = change(&mut team).map_err(TeamError::Rejected)?;
        this.storage.save_team(&team)?;
        this.teams[index] = team.clone();

        Ok((team, result))
    }
}
