use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Timelike, Utc};
use tokio::sync::{watch, Notify};
use tracing::{debug, info};

use crate::schedule::Week;
use crate::team::{ReminderConfig, Team};

/* Sleep at most this long, so wall-clock jumps are noticed. */
const MAX_SLEEP: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Job {
    pub team_id: u64,
    pub minutes_before: u32,
}

/// Pending reminder checks, ordered by when they fire.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BTreeMap<DateTime<Utc>, Vec<Job>>,
}

/// First moment after `now` that lies `minutes_before` ahead of a full hour.
pub fn next_fire<Tz: TimeZone>(now: &DateTime<Tz>, minutes_before: u32) -> DateTime<Tz> {
    let lead = chrono::Duration::minutes(minutes_before as i64);
    let shifted = now.clone() + lead;

    let into_hour = chrono::Duration::seconds((shifted.minute() * 60 + shifted.second()) as i64)
        + chrono::Duration::nanoseconds(shifted.nanosecond() as i64);
    shifted - into_hour + chrono::Duration::hours(1) - lead
}

/// The announcement for an activity starting at `starts_at`, if the team
/// wants one.
pub fn announcement(
    week: &Week,
    config: &ReminderConfig,
    starts_at: &DateTime<FixedOffset>,
    minutes_before: u32,
) -> Option<String> {
    let block = week.block_starting_at(starts_at.hour())?;
    let activity = week.grid[week.today(starts_at)].get(block)?.value.as_str();

    if !config.activities.iter().any(|wanted| wanted == activity) {
        return None;
    }

    let text = format!("{} in {} minutes", activity, minutes_before);
    Some(match &config.role_mention {
        Some(role) => format!("{} {}", role, text),
        None => text,
    })
}

impl Scheduler {
    pub fn add(&mut self, job: Job, now: DateTime<Utc>) {
        self.queue
            .entry(next_fire(&now, job.minutes_before))
            .or_default()
            .push(job);
    }

    pub fn remove_team(&mut self, team_id: u64) {
        for jobs in self.queue.values_mut() {
            jobs.retain(|job| job.team_id != team_id);
        }
        self.queue.retain(|_, jobs| !jobs.is_empty());
    }

    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.queue.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.queue.values().map(Vec::len).sum()
    }

    /// Take every job due at `now`, re-queueing each for its next hour.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, Job)> {
        let later = match now.checked_add_signed(chrono::Duration::nanoseconds(1)) {
            Some(later) => self.queue.split_off(&later),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.queue, later);

        let mut fired = Vec::new();
        for (at, jobs) in due {
            for job in jobs {
                self.queue
                    .entry(next_fire(&at, job.minutes_before))
                    .or_default()
                    .push(job);
                fired.push((at, job));
            }
        }
        fired
    }
}

/// Where reminders read their input from and send their output to.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Current week and reminder settings of a team, if it has both.
    async fn reminder_context(&self, team_id: u64) -> Option<(Week, ReminderConfig)>;

    async fn announce(&self, channel_id: u64, text: &str);
}

pub struct Reminders {
    scheduler: Mutex<Scheduler>,
    changed: Notify,
    offset: FixedOffset,
}

impl Reminders {
    pub fn new(offset: FixedOffset) -> Self {
        Reminders {
            scheduler: Mutex::new(Scheduler::default()),
            changed: Notify::new(),
            offset,
        }
    }

    fn scheduler(&self) -> std::sync::MutexGuard<'_, Scheduler> {
        self.scheduler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the jobs of a team with the ones its configuration asks for.
    pub fn register(&self, team: &Team) {
        {
            let mut scheduler = self.scheduler();
            scheduler.remove_team(team.id);

            if let Some(config) = &team.reminders {
                let now = Utc::now();
                for minutes_before in &config.intervals {
                    scheduler.add(
                        Job {
                            team_id: team.id,
                            minutes_before: *minutes_before,
                        },
                        now,
                    );
                }
            }
        }

        self.changed.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.scheduler().len()
    }

    /// Fire jobs as they come due, until shutdown.
    pub async fn run(&self, announcer: &dyn Announcer, mut shutdown: watch::Receiver<bool>) {
        info!("Reminder scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let wait = self
                .scheduler()
                .next_fire()
                .map(|at| (at - Utc::now()).to_std().unwrap_or_default().min(MAX_SLEEP))
                .unwrap_or(MAX_SLEEP);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.changed.notified() => continue,
                _ = shutdown.changed() => break,
            }

            let due = self.scheduler().pop_due(Utc::now());
            for (at, job) in due {
                self.fire(announcer, at, job).await;
            }
        }

        info!("Reminder scheduler stopped");
    }

    pub async fn fire(&self, announcer: &dyn Announcer, at: DateTime<Utc>, job: Job) {
        let Some((week, config)) = announcer.reminder_context(job.team_id).await else {
            debug!("Team {} has nothing to remind about", job.team_id);
            return;
        };
        let Some(channel) = config.announce_channel else {
            return;
        };

        let starts_at = (at + chrono::Duration::minutes(job.minutes_before as i64))
            .with_timezone(&self.offset);
        if let Some(text) = announcement(&week, &config, &starts_at, job.minutes_before) {
            info!("Sending reminder for team {}: {}", job.team_id, text);
            announcer.announce(channel, &text).await;
        }
    }
}
