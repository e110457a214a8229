use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serenity::all::Context;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};

use crate::config::Config;
use crate::monitor::Monitor;
use crate::reminders::Reminders;
use crate::schedule::SchedulePool;
use crate::sheets::DocumentSource;
use crate::storage::Storage;
use crate::team::Team;

mod discord;
mod schedule;
mod team;

pub use team::TeamError;

struct BotStorage {
    startup: AtomicBool,
    config: Config,
    storage: Arc<Storage>,
    pool: Arc<SchedulePool>,
    monitor: Arc<Monitor>,
    reminders: Arc<Reminders>,
    shutdown: watch::Receiver<bool>,
    teams: Vec<Team>,
    discord: Option<Context>,
}

pub struct BotState(Arc<RwLock<BotStorage>>);

impl Clone for BotState {
    fn clone(&self) -> Self {
        BotState(self.0.clone())
    }
}

impl BotState {
    pub fn new(
        config: Config,
        source: Arc<dyn DocumentSource>,
        storage: Storage,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let storage = Arc::new(storage);
        let pool = Arc::new(SchedulePool::new(source));
        let monitor = Arc::new(Monitor::new(pool.clone(), storage.clone(), shutdown.clone()));
        let reminders = Arc::new(Reminders::new(config.utc_offset));

        BotState(Arc::new(RwLock::new(BotStorage {
            startup: AtomicBool::new(true),
            config,
            storage,
            pool,
            monitor,
            reminders,
            shutdown,
            teams: Vec::new(),
            discord: None,
        })))
    }

    pub async fn set_discord(&self, ctx: Context) {
        let mut this = self.0.write().await;

        this.discord = Some(ctx);
    }

    pub async fn set_if_startup(&self) -> bool {
        let this = self.0.read().await;

        this.startup.swap(false, Ordering::Relaxed)
    }

    pub async fn config(&self) -> Config {
        self.0.read().await.config.clone()
    }

    pub async fn storage(&self) -> Arc<Storage> {
        self.0.read().await.storage.clone()
    }

    pub async fn monitor(&self) -> Arc<Monitor> {
        self.0.read().await.monitor.clone()
    }

    pub async fn reminders(&self) -> Arc<Reminders> {
        self.0.read().await.reminders.clone()
    }

    /// Load every team, bring their schedules up to date and start sending
    /// reminders.
    pub async fn start(&self) {
        let (storage, monitor, reminders, default_interval, shutdown) = {
            let this = self.0.read().await;
            (
                this.storage.clone(),
                this.monitor.clone(),
                this.reminders.clone(),
                this.config.default_update_interval,
                this.shutdown.clone(),
            )
        };

        let teams = match storage.load_all_teams() {
            Ok(teams) => teams,
            Err(e) => {
                error!("Failed to load teams: {}", e);
                Vec::new()
            }
        };
        info!("Loaded {} team(s)", teams.len());

        for team in &teams {
            reminders.register(team);
        }
        info!("Scheduled {} reminder(s)", reminders.pending());
        self.0.write().await.teams = teams.clone();

        monitor.load_all_teams(&teams, default_interval).await;

        let bot = self.clone();
        tokio::spawn(async move {
            reminders.run(&bot, shutdown).await;
        });
    }
}
