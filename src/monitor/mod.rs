use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::schedule::{Schedule, ScheduleError, SchedulePool};
use crate::storage::ScheduleStore;

mod load;

pub use load::documents_to_track;

/* One week, in minutes. */
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);
/* Consecutive failures tolerated before the interval starts growing. */
const FAILURES_BEFORE_BACKOFF: u32 = 3;

struct Poller {
    interval: Duration,
    handle: JoinHandle<()>,
}

/// Keeps every tracked schedule in sync with its remote document, one
/// polling task per document.
pub struct Monitor {
    pool: Arc<SchedulePool>,
    store: Arc<dyn ScheduleStore>,
    shutdown: watch::Receiver<bool>,
    pollers: Mutex<HashMap<String, Poller>>,
}

/// A poll interval from minutes, kept between a minute and a week.
pub fn poll_interval(minutes: u64) -> Duration {
    Duration::from_secs(minutes.clamp(1, MAX_INTERVAL_MINUTES).saturating_mul(60))
}

/// How long to sleep before the next check, given the failures so far.
pub fn poll_delay(interval: Duration, failures: u32) -> Duration {
    if failures < FAILURES_BEFORE_BACKOFF {
        return interval;
    }

    let exponent = (failures - FAILURES_BEFORE_BACKOFF + 1).min(16);
    interval
        .saturating_mul(1 << exponent)
        .min(MAX_BACKOFF.max(interval))
}

/// Re-read the schedule if the remote copy is newer, and persist the result.
///
/// Returns whether a refresh happened.
pub async fn refresh_if_stale(
    schedule: &Schedule,
    store: &dyn ScheduleStore,
) -> Result<bool, ScheduleError> {
    if schedule.is_fresh().await? {
        return Ok(false);
    }

    refresh(schedule, store).await?;
    Ok(true)
}

/// Unconditionally re-read the schedule and persist the result.
pub async fn refresh(schedule: &Schedule, store: &dyn ScheduleStore) -> Result<(), ScheduleError> {
    schedule.update().await?;

    if let Some(snapshot) = schedule.snapshot().await {
        store.cache_schedule(&snapshot)?;
    }
    Ok(())
}

async fn poll(
    schedule: Arc<Schedule>,
    store: Arc<dyn ScheduleStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "[{}] Monitoring schedule every {} minute(s)",
        schedule.id(),
        interval.as_secs() / 60
    );

    let mut failures = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_delay(interval, failures)) => {}
            _ = shutdown.changed() => break,
        }

        match refresh_if_stale(&schedule, store.as_ref()).await {
            Ok(true) => {
                info!("[{}] Background refresh finished", schedule.id());
                failures = 0;
            }
            Ok(false) => failures = 0,
            /* A manual update got there first. */
            Err(ScheduleError::AlreadyUpdating) => {}
            Err(error) => {
                failures += 1;
                warn!(
                    "[{}] Background refresh failed ({} in a row): {}",
                    schedule.id(),
                    failures,
                    error
                );
            }
        }
    }

    info!("[{}] Stopped monitoring schedule", schedule.id());
}

impl Monitor {
    pub fn new(
        pool: Arc<SchedulePool>,
        store: Arc<dyn ScheduleStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Monitor {
            pool,
            store,
            shutdown,
            pollers: Mutex::new(HashMap::new()),
        }
    }

    /// Make sure a document is loaded and being polled.
    ///
    /// The poller is started even when the initial load fails, so the
    /// schedule catches up once the remote source is reachable again.
    pub async fn track(
        &self,
        document_id: &str,
        interval: Duration,
    ) -> Result<Arc<Schedule>, ScheduleError> {
        let (schedule, _) = self.pool.get_or_create(document_id);

        let loaded = if schedule.last_modified().await.is_none() {
            self.load(&schedule).await
        } else {
            Ok(())
        };

        self.ensure_poller(&schedule, interval);
        loaded.map(|_| schedule)
    }

    /// Fill a schedule from the persistent cache when it is still current,
    /// from the remote document otherwise.
    async fn load(&self, schedule: &Schedule) -> Result<(), ScheduleError> {
        if let Some(snapshot) = self.store.cached_schedule(schedule.id())? {
            if schedule.is_current(Some(snapshot.last_modified)).await? {
                schedule.restore(snapshot).await;
                info!("[{}] Loaded schedule from cache", schedule.id());
                return Ok(());
            }
            info!("[{}] Cached schedule is outdated", schedule.id());
        }

        refresh(schedule, self.store.as_ref()).await
    }

    fn ensure_poller(&self, schedule: &Arc<Schedule>, interval: Duration) {
        let mut pollers = self
            .pollers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(poller) = pollers.get(schedule.id()) {
            if !poller.handle.is_finished() && poller.interval == interval {
                return;
            }
            poller.handle.abort();
        }

        let handle = tokio::spawn(poll(
            schedule.clone(),
            self.store.clone(),
            interval,
            self.shutdown.clone(),
        ));
        pollers.insert(schedule.id().to_string(), Poller { interval, handle });
    }

    /// Stop polling a document; the caller knows no team uses it any more.
    pub fn untrack(&self, document_id: &str) {
        let poller = self
            .pollers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(document_id);

        if let Some(poller) = poller {
            poller.handle.abort();
            info!("[{}] Stopped tracking schedule", document_id);
        }
    }

    #[cfg(test)]
    pub fn polling_interval(&self, document_id: &str) -> Option<Duration> {
        self.pollers
            .lock()
            .unwrap()
            .get(document_id)
            .filter(|poller| !poller.handle.is_finished())
            .map(|poller| poller.interval)
    }

    pub fn is_polling(&self, document_id: &str) -> bool {
        self.pollers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(document_id)
            .is_some_and(|poller| !poller.handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::schedule::ScheduleSnapshot;
    use crate::sheets::fake::{timestamp, FakeSource};
    use crate::storage::StorageError;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        snapshots: Mutex<HashMap<String, ScheduleSnapshot>>,
        writes: AtomicUsize,
    }

    impl MemoryStore {
        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    impl ScheduleStore for MemoryStore {
        fn cache_schedule(&self, snapshot: &ScheduleSnapshot) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.snapshots
                .lock()
                .unwrap()
                .insert(snapshot.id.clone(), snapshot.clone());
            Ok(())
        }

        fn cached_schedule(
            &self,
            document_id: &str,
        ) -> Result<Option<ScheduleSnapshot>, StorageError> {
            Ok(self.snapshots.lock().unwrap().get(document_id).cloned())
        }
    }

    const MINUTE: Duration = Duration::from_secs(60);

    fn monitor(
        source: &Arc<FakeSource>,
        store: &Arc<MemoryStore>,
    ) -> (Monitor, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool = Arc::new(SchedulePool::new(source.clone()));
        (Monitor::new(pool, store.clone(), shutdown_rx), shutdown_tx)
    }

    async fn snapshot_at(source: &Arc<FakeSource>, hour: u32) -> ScheduleSnapshot {
        let scratch = Schedule::new("doc", source.clone());
        scratch.update().await.unwrap();
        let mut snapshot = scratch.snapshot().await.unwrap();
        snapshot.last_modified = timestamp(hour, 0);
        snapshot
    }

    #[tokio::test(start_paused = true)]
    async fn cold_start_fetches_and_caches() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let (monitor, _shutdown) = monitor(&source, &store);

        let schedule = monitor.track("doc", MINUTE).await.unwrap();

        assert_eq!(source.week_fetches(), 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(schedule.last_modified().await, Some(timestamp(12, 0)));
        assert_eq!(
            store.cached_schedule("doc").unwrap().unwrap().last_modified,
            timestamp(12, 0)
        );
        assert!(monitor.is_polling("doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn warm_start_uses_the_cache() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let mut snapshot = snapshot_at(&source, 12).await;
        snapshot.players.truncate(1);
        store.snapshots.lock().unwrap().insert("doc".to_string(), snapshot.clone());
        let fetches_before = source.week_fetches();
        let (monitor, _shutdown) = monitor(&source, &store);

        let schedule = monitor.track("doc", MINUTE).await.unwrap();

        assert_eq!(source.week_fetches(), fetches_before);
        assert_eq!(store.writes(), 0);
        assert_eq!(schedule.snapshot().await.unwrap(), snapshot);
    }

    #[tokio::test(start_paused = true)]
    async fn outdated_cache_is_refreshed() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let snapshot = snapshot_at(&source, 11).await;
        store.snapshots.lock().unwrap().insert("doc".to_string(), snapshot);
        let fetches_before = source.week_fetches();
        let (monitor, _shutdown) = monitor(&source, &store);

        let schedule = monitor.track("doc", MINUTE).await.unwrap();

        assert_eq!(source.week_fetches(), fetches_before + 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(schedule.last_modified().await, Some(timestamp(12, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn outdated_cache_is_not_served_when_refresh_fails() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let snapshot = snapshot_at(&source, 11).await;
        store.snapshots.lock().unwrap().insert("doc".to_string(), snapshot);
        let (monitor, _shutdown) = monitor(&source, &store);

        source.fail_sheet("Ana");
        assert!(monitor.track("doc", MINUTE).await.is_err());
        let schedule = monitor.pool.get("doc").unwrap();
        assert_eq!(schedule.last_modified().await, None);

        source.fail_last_modified(true);
        assert!(monitor.track("doc", MINUTE).await.is_err());
        assert_eq!(schedule.last_modified().await, None);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_follows_interval_changes() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let (monitor, _shutdown) = monitor(&source, &store);

        monitor.track("doc", MINUTE).await.unwrap();
        monitor.track("doc", MINUTE * 10).await.unwrap();
        assert_eq!(monitor.polling_interval("doc"), Some(MINUTE * 10));

        monitor.untrack("doc");
        assert!(!monitor.is_polling("doc"));
        source.set_modified(timestamp(13, 0));
        tokio::time::sleep(MINUTE * 20).await;
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_refreshes_once_per_remote_change() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let (monitor, _shutdown) = monitor(&source, &store);
        let schedule = monitor.track("doc", MINUTE).await.unwrap();

        /* Nothing changed remotely: the first tick only checks. */
        tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;
        assert_eq!(source.week_fetches(), 1);
        assert_eq!(store.writes(), 1);

        source.set_modified(timestamp(12, 30));
        tokio::time::sleep(MINUTE).await;
        assert_eq!(source.week_fetches(), 2);
        assert_eq!(store.writes(), 2);
        assert_eq!(schedule.last_modified().await, Some(timestamp(12, 30)));

        tokio::time::sleep(MINUTE).await;
        assert_eq!(source.week_fetches(), 2);
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_survives_remote_failures() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let (monitor, _shutdown) = monitor(&source, &store);
        let schedule = monitor.track("doc", MINUTE).await.unwrap();

        source.fail_last_modified(true);
        tokio::time::sleep(MINUTE * 2 + Duration::from_secs(1)).await;
        assert!(monitor.is_polling("doc"));
        assert_eq!(schedule.last_modified().await, Some(timestamp(12, 0)));

        source.fail_last_modified(false);
        source.set_modified(timestamp(13, 0));
        tokio::time::sleep(MINUTE).await;
        assert_eq!(schedule.last_modified().await, Some(timestamp(13, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_initial_load_keeps_polling() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let (monitor, _shutdown) = monitor(&source, &store);

        source.fail_last_modified(true);
        assert!(monitor.track("doc", MINUTE).await.is_err());
        assert!(monitor.is_polling("doc"));

        source.fail_last_modified(false);
        tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_pollers() {
        let source = Arc::new(FakeSource::new(timestamp(12, 0)));
        let store = Arc::new(MemoryStore::default());
        let (monitor, shutdown) = monitor(&source, &store);
        monitor.track("doc", MINUTE).await.unwrap();

        shutdown.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!monitor.is_polling("doc"));
        source.set_modified(timestamp(13, 0));
        tokio::time::sleep(MINUTE * 3).await;
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn backoff_grows_after_repeated_failures() {
        assert_eq!(poll_delay(MINUTE, 0), MINUTE);
        assert_eq!(poll_delay(MINUTE, 2), MINUTE);
        assert_eq!(poll_delay(MINUTE, 3), MINUTE * 2);
        assert_eq!(poll_delay(MINUTE, 4), MINUTE * 4);
        assert_eq!(poll_delay(MINUTE, 30), MAX_BACKOFF);
        assert_eq!(poll_delay(MINUTE * 90, 5), MINUTE * 90);
    }
}
