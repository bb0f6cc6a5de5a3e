// src/config/mod.rs - Process-level settings loaded from the environment

use anyhow::{Context, Result};
use log::info;
use std::env;

use crate::types::{GroupId, UserId};

/// Settings read once at startup. The Telegram credentials live in
/// `platforms::telegram::TelegramConfig`; this covers everything else.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bot owner, the only user allowed to /broadcast.
    pub owner_id: UserId,
    /// Optional chat that receives moderation reports.
    pub log_channel: Option<GroupId>,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        let owner_id = env::var("OWNER_ID")
            .context("OWNER_ID environment variable not set")?
            .parse::<UserId>()
            .context("OWNER_ID must be a numeric user id")?;

        let log_channel = match env::var("LOG_CHANNEL") {
            Ok(raw) => Some(
                raw.parse::<GroupId>()
                    .context("LOG_CHANNEL must be a numeric chat id")?,
            ),
            Err(_) => None,
        };

        if let Some(channel) = log_channel {
            info!("Moderation reports will be sent to chat {}", channel);
        }

        Ok(Self {
            owner_id,
            log_channel,
        })
    }
}
