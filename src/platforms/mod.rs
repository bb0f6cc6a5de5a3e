use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::{GroupId, MessageId, UserId, UserProfile};

pub mod telegram;

/// Inbound update delivered by a platform connection.
#[derive(Debug, Clone)]
pub enum InboundUpdate {
    /// A group message with optional text/caption content.
    GroupMessage {
        group: GroupId,
        user: UserId,
        message_id: MessageId,
        text: String,
        /// True when the update arrived from a private chat rather than
        /// a group; commands like /broadcast are private-only.
        private: bool,
        /// Message id being replied to, used by reply-based commands.
        reply_to_user: Option<UserId>,
    },
    /// Users added to a group.
    NewMembers {
        group: GroupId,
        users: Vec<UserId>,
    },
}

/// Errors from enforcement and deletion calls against the platform.
#[derive(Debug, Error)]
pub enum EnforceError {
    /// The bot lacks the right to perform the action. Terminal for the
    /// attempt; callers surface it and never retry in a loop.
    #[error("missing permission")]
    PermissionDenied,
    /// Network or platform failure after the client's own transient
    /// retry policy was exhausted.
    #[error("platform error: {0}")]
    Platform(String),
}

/// Read-side platform capabilities the moderation core needs.
///
/// Admin status is queried live per event, never cached, since it can
/// change between events.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn is_admin(&self, group: GroupId, user: UserId) -> Result<bool>;

    async fn user_profile(&self, user: UserId) -> Result<UserProfile>;

    async fn send_message(&self, chat: GroupId, text: &str) -> Result<()>;
}

/// Enforcement capabilities. The escalation engine is the only caller;
/// it never touches platform state through any other path.
#[async_trait]
pub trait Enforcer: Send + Sync {
    async fn mute(&self, group: GroupId, user: UserId) -> Result<(), EnforceError>;

    async fn ban(&self, group: GroupId, user: UserId) -> Result<(), EnforceError>;

    async fn delete_content(
        &self,
        group: GroupId,
        message_id: MessageId,
    ) -> Result<(), EnforceError>;
}

/// Trait defining the lifecycle of a platform connection feeding updates
/// into the bot.
#[async_trait]
pub trait PlatformConnection: Send + Sync {
    /// Connect to the platform and start receiving updates.
    async fn connect(&mut self) -> Result<()>;

    /// Get the platform identifier (e.g., "telegram").
    fn platform_name(&self) -> &str;

    /// Check if the connection is healthy.
    async fn is_connected(&self) -> bool;

    /// Get a receiver for incoming updates.
    fn get_update_receiver(&self) -> Option<broadcast::Receiver<InboundUpdate>>;

    /// Gracefully disconnect.
    async fn disconnect(&mut self) -> Result<()>;
}
