use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::sheets::DocumentSource;

use super::Schedule;

/// Process-wide registry of schedules, keyed by document id.
///
/// Schedules are created on first use and live as long as the pool; every
/// lookup of an id returns the same instance.
pub struct SchedulePool {
    source: Arc<dyn DocumentSource>,
    schedules: Mutex<HashMap<String, Arc<Schedule>>>,
}

impl SchedulePool {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        SchedulePool {
            source,
            schedules: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, document_id: &str) -> Option<Arc<Schedule>> {
        self.schedules
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(document_id)
            .cloned()
    }

    /// Returns the schedule and whether this call created it.
    pub fn get_or_create(&self, document_id: &str) -> (Arc<Schedule>, bool) {
        let mut schedules = self
            .schedules
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(schedule) = schedules.get(document_id) {
            return (schedule.clone(), false);
        }

        let schedule = Arc::new(Schedule::new(document_id, self.source.clone()));
        schedules.insert(document_id.to_string(), schedule.clone());
        (schedule, true)
    }

    pub fn ids(&self) -> Vec<String> {
        self.schedules
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}
