// src/types/mod.rs - Core moderation types shared across the bot systems

use serde::{Deserialize, Serialize};

/// Telegram-style numeric chat identifier (negative for groups).
pub type GroupId = i64;
/// Telegram-style numeric user identifier.
pub type UserId = i64;
/// Message identifier within a group, used for content deletion.
pub type MessageId = i64;

/// Moderation mode for a group. Only warn-based escalation is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Warn,
}

/// Enforcement action applied once a user exhausts their warning budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    Mute,
    Ban,
}

impl std::fmt::Display for Penalty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Penalty::Mute => write!(f, "mute"),
            Penalty::Ban => write!(f, "ban"),
        }
    }
}

/// Effective per-group moderation configuration.
///
/// Groups without a stored record resolve to `GroupConfig::default()`;
/// records are created lazily on the first configuration write and are
/// never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub mode: PolicyMode,
    pub warning_limit: i64,
    pub penalty: Penalty,
    pub anti_link_enabled: bool,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Warn,
            warning_limit: 3,
            penalty: Penalty::Mute,
            anti_link_enabled: true,
        }
    }
}

impl GroupConfig {
    /// Apply a partial update, leaving unspecified fields untouched.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(limit) = patch.warning_limit {
            self.warning_limit = limit;
        }
        if let Some(penalty) = patch.penalty {
            self.penalty = penalty;
        }
        if let Some(enabled) = patch.anti_link_enabled {
            self.anti_link_enabled = enabled;
        }
    }
}

/// Partial configuration update. Only the populated fields are written,
/// so concurrent updates to different fields never clobber each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub mode: Option<PolicyMode>,
    pub warning_limit: Option<i64>,
    pub penalty: Option<Penalty>,
    pub anti_link_enabled: Option<bool>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.warning_limit.is_none()
            && self.penalty.is_none()
            && self.anti_link_enabled.is_none()
    }
}

/// Minimal profile data the engine needs for bio and join checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub bio: String,
    pub handle: Option<String>,
    pub display_name: String,
}

/// Closed set of inbound events the escalation engine evaluates.
///
/// All variants share one ledger key space per (group, user): a warning
/// accumulated through a bio check counts toward the same limit as one
/// accumulated through message text.
#[derive(Debug, Clone)]
pub enum ModerationEvent {
    /// A group message; the offending content can be deleted.
    Message {
        group: GroupId,
        user: UserId,
        message_id: MessageId,
        text: String,
    },
    /// Per-message check of the sender's profile bio. Nothing to delete.
    BioCheck {
        group: GroupId,
        user: UserId,
        bio: String,
    },
    /// One-shot check when a member joins: bio plus handle.
    Join {
        group: GroupId,
        user: UserId,
        bio: String,
        handle: Option<String>,
    },
}

impl ModerationEvent {
    pub fn group(&self) -> GroupId {
        match self {
            ModerationEvent::Message { group, .. }
            | ModerationEvent::BioCheck { group, .. }
            | ModerationEvent::Join { group, .. } => *group,
        }
    }

    pub fn user(&self) -> UserId {
        match self {
            ModerationEvent::Message { user, .. }
            | ModerationEvent::BioCheck { user, .. }
            | ModerationEvent::Join { user, .. } => *user,
        }
    }

    /// Text blob the pattern matcher classifies for this event class.
    pub fn text(&self) -> String {
        match self {
            ModerationEvent::Message { text, .. } => text.clone(),
            ModerationEvent::BioCheck { bio, .. } => bio.clone(),
            ModerationEvent::Join { bio, handle, .. } => match handle {
                Some(handle) => format!("{} @{}", bio, handle),
                None => bio.clone(),
            },
        }
    }

    /// Message id to delete when this event class supports deletion.
    pub fn deletable(&self) -> Option<MessageId> {
        match self {
            ModerationEvent::Message { message_id, .. } => Some(*message_id),
            ModerationEvent::BioCheck { .. } | ModerationEvent::Join { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModerationEvent::Message { .. } => "message",
            ModerationEvent::BioCheck { .. } => "bio",
            ModerationEvent::Join { .. } => "join",
        }
    }
}

/// Penalty being applied, named in outcomes and permission errors.
/// Delete failures are reported through `Outcome::DeleteFailed` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforceAction {
    Mute,
    Ban,
}

impl From<Penalty> for EnforceAction {
    fn from(penalty: Penalty) -> Self {
        match penalty {
            Penalty::Mute => EnforceAction::Mute,
            Penalty::Ban => EnforceAction::Ban,
        }
    }
}

impl std::fmt::Display for EnforceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnforceAction::Mute => write!(f, "mute"),
            EnforceAction::Ban => write!(f, "ban"),
        }
    }
}

/// Tagged outcome of reviewing one event. The dispatcher renders these
/// as chat replies and log-channel reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Admin or whitelisted sender; no processing happened.
    Exempt,
    /// Anti-link checking is disabled for the group.
    PolicyDisabled,
    /// No disallowed pattern found; any stale warnings were cleared.
    Clean,
    /// Violation below the limit.
    Warned { count: i64, limit: i64 },
    /// Warning budget exhausted and the penalty was applied.
    Enforced { penalty: Penalty },
    /// The platform refused an enforcement action. The ledger keeps the
    /// escalated count so the next violation re-attempts enforcement.
    PermissionDenied { action: EnforceAction },
    /// Deleting the offending message failed; counting still proceeded.
    DeleteFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let cfg = GroupConfig::default();
        assert_eq!(cfg.warning_limit, 3);
        assert_eq!(cfg.penalty, Penalty::Mute);
        assert!(cfg.anti_link_enabled);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut cfg = GroupConfig::default();
        cfg.apply(&ConfigPatch {
            warning_limit: Some(5),
            ..Default::default()
        });
        assert_eq!(cfg.warning_limit, 5);
        assert_eq!(cfg.penalty, Penalty::Mute);
        assert!(cfg.anti_link_enabled);
    }

    #[test]
    fn join_event_text_includes_handle() {
        let event = ModerationEvent::Join {
            group: -100,
            user: 7,
            bio: "hello".to_string(),
            handle: Some("spammer".to_string()),
        };
        assert_eq!(event.text(), "hello @spammer");
        assert!(event.deletable().is_none());
    }
}
