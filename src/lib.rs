//! # BioGuard
//!
//! A Telegram group moderation bot written in Rust. It inspects group
//! messages, sender bios and new members for disallowed links and
//! mentions, escalates per-user warnings, and mutes or bans offenders
//! once a configurable limit is crossed. Group admins and a per-group
//! whitelist are exempt.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bioguard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let mut telegram = TelegramConnection::new(TelegramConfig::from_env()?);
//!     telegram.connect().await?;
//!     let receiver = telegram.get_update_receiver().unwrap();
//!
//!     let platform = Arc::new(telegram);
//!     let bot = ModerationBot::new(
//!         &settings,
//!         Arc::new(MemoryStore::new()),
//!         platform.clone(),
//!         platform,
//!     )?;
//!     bot.run(receiver).await
//! }
//! ```

pub mod bot;
pub mod config;
pub mod platforms;
pub mod storage;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::ModerationBot;
    pub use crate::config::Settings;
    pub use crate::platforms::{
        telegram::{TelegramConfig, TelegramConnection},
        ChatPlatform, EnforceError, Enforcer, InboundUpdate, PlatformConnection,
    };
    pub use crate::storage::{MemoryStore, Storage, StoreError};
    pub use crate::types::{
        ConfigPatch, GroupConfig, GroupId, ModerationEvent, Outcome, Penalty, UserId,
    };
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
