use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::team::Team;

use super::{Storage, StorageError};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "version")]
enum StoredTeam {
    #[serde(rename = "1")]
    V1(Team),
}

impl Storage {
    pub fn load_all_teams(&self) -> Result<Vec<Team>, StorageError> {
        let mut teams = Vec::new();

        for key in self.keys("team")? {
            match self.read("team", &key) {
                Ok(StoredTeam::V1(team)) => teams.push(team),
                Err(e) => warn!("Skipping team {}: {}", key, e),
            }
        }

        teams.sort_by_key(|team| team.id);
        Ok(teams)
    }

    pub fn save_team(&self, team: &Team) -> Result<(), StorageError> {
        self.write("team", &team.id.to_string(), &StoredTeam::V1(team.clone()))
    }
}
