use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::team::Team;

use super::{poll_interval, Monitor, MAX_INTERVAL_MINUTES};

/// Every document referenced by a team, with the shortest interval any of
/// those teams asked for (in minutes).
pub fn documents_to_track(teams: &[Team], default_interval: u64) -> BTreeMap<String, u64> {
    let mut documents = BTreeMap::new();

    for team in teams {
        let Some(document_id) = &team.spreadsheet_id else {
            continue;
        };
        let interval = team
            .update_interval
            .unwrap_or(default_interval)
            .clamp(1, MAX_INTERVAL_MINUTES);

        documents
            .entry(document_id.clone())
            .and_modify(|current: &mut u64| *current = (*current).min(interval))
            .or_insert(interval);
    }

    documents
}

impl Monitor {
    /// Bring every team's schedule up at startup.
    ///
    /// A document that fails to load is logged and keeps being polled; it
    /// never stops the others.
    pub async fn load_all_teams(&self, teams: &[Team], default_interval: u64) {
        let documents = documents_to_track(teams, default_interval);
        info!("Loading {} schedule(s)", documents.len());

        for (document_id, interval) in documents {
            if let Err(e) = self
                .track(&document_id, poll_interval(interval))
                .await
            {
                warn!("[{}] Initial load failed: {}", document_id, e);
            }
        }

        info!("Tracking schedules: {}", self.pool.ids().join(", "));
    }
}
