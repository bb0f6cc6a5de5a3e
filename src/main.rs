use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;

use bioguard::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting BioGuard v{}", env!("CARGO_PKG_VERSION"));

    // =================================================================
    // CONFIGURATION
    // =================================================================

    let settings = Settings::from_env()?;
    let telegram_config = TelegramConfig::from_env()?;

    // =================================================================
    // PLATFORM CONNECTION
    // =================================================================

    let mut telegram = TelegramConnection::new(telegram_config);
    telegram
        .connect()
        .await
        .context("failed to connect to Telegram")?;

    let receiver = telegram
        .get_update_receiver()
        .context("no update receiver after connect")?;

    // One connection serves both the read side and enforcement.
    let platform = Arc::new(telegram);

    // =================================================================
    // BOT CORE
    // =================================================================

    let store = Arc::new(MemoryStore::new());
    let bot = ModerationBot::new(&settings, store, platform.clone(), platform)?;

    info!("BioGuard is up; press Ctrl+C to stop");

    tokio::select! {
        result = bot.run(receiver) => {
            if let Err(e) = result {
                error!("Bot loop failed: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("BioGuard stopped");
    Ok(())
}
