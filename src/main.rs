use std::sync::Arc;

use serenity::all::GatewayIntents;
use serenity::Client;
use tokio::sync::watch;
use tracing::{error, info};

mod config;
mod discord;
mod monitor;
mod reminders;
mod schedule;
mod sheets;
mod state;
mod storage;
mod team;

#[tokio::main]
async fn main() {
    /* Load, if it exists, from the .env file. This mostly makes development easier. */
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().expect("Invalid configuration");
    let source = Arc::new(sheets::GoogleSheets::new(&config));
    let storage =
        storage::Storage::new(&config.storage_folder).expect("Failed to open storage folder");

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let discord_token = config.discord_token.clone();
    let bot = state::BotState::new(config, source, storage, shutdown_rx);

    let mut discord_client = Client::builder(&discord_token, intents)
        .event_handler(bot)
        .await
        .expect("Error creating client");
    let shard_manager = discord_client.shard_manager.clone();

    tokio::select! {
        result = discord_client.start() => {
            if let Err(why) = result {
                error!("Client error: {why:?}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    shard_manager.shutdown_all().await;
}
