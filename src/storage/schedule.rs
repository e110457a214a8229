use serde::{Deserialize, Serialize};

use crate::schedule::{ScheduleSnapshot, Week};

use super::{Storage, StorageError};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "version")]
enum StoredSchedule {
    #[serde(rename = "1")]
    V1(ScheduleSnapshot),
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "version")]
enum StoredWeek {
    #[serde(rename = "1")]
    V1(Week),
}

/// Durable copy of parsed schedules, so a restart can skip re-parsing a
/// document that has not changed.
pub trait ScheduleStore: Send + Sync {
    fn cache_schedule(&self, snapshot: &ScheduleSnapshot) -> Result<(), StorageError>;

    fn cached_schedule(&self, document_id: &str)
        -> Result<Option<ScheduleSnapshot>, StorageError>;
}

impl ScheduleStore for Storage {
    fn cache_schedule(&self, snapshot: &ScheduleSnapshot) -> Result<(), StorageError> {
        self.write(
            "schedule",
            &snapshot.id,
            &StoredSchedule::V1(snapshot.clone()),
        )
    }

    fn cached_schedule(
        &self,
        document_id: &str,
    ) -> Result<Option<ScheduleSnapshot>, StorageError> {
        match self.read("schedule", document_id) {
            Ok(StoredSchedule::V1(snapshot)) => Ok(Some(snapshot)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Storage {
    pub fn save_default_week(&self, document_id: &str, week: &Week) -> Result<(), StorageError> {
        self.write("week", document_id, &StoredWeek::V1(week.clone()))
    }

    pub fn default_week(&self, document_id: &str) -> Result<Option<Week>, StorageError> {
        match self.read("week", document_id) {
            Ok(StoredWeek::V1(week)) => Ok(Some(week)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
