// src/bot/dispatcher.rs - Routes inbound updates to the escalation engine
// and renders outcomes as chat replies and log-channel reports

use anyhow::Result;
use log::{debug, error, warn};
use std::sync::Arc;

use crate::bot::engine::EscalationEngine;
use crate::platforms::ChatPlatform;
use crate::types::{GroupId, MessageId, ModerationEvent, Outcome, Penalty, UserId};

/// Concurrency boundary between the platform feed and the engine.
///
/// One inbound group message fans out into two engine events (message
/// text, then sender bio) which run sequentially so ledger calls for the
/// same (group, user) key stay ordered. Different updates run in
/// independent tasks spawned by the bot loop.
pub struct EventDispatcher {
    engine: Arc<EscalationEngine>,
    platform: Arc<dyn ChatPlatform>,
    log_channel: Option<GroupId>,
}

impl EventDispatcher {
    pub fn new(
        engine: Arc<EscalationEngine>,
        platform: Arc<dyn ChatPlatform>,
        log_channel: Option<GroupId>,
    ) -> Self {
        Self {
            engine,
            platform,
            log_channel,
        }
    }

    /// Moderate one group message: the message text itself, then the
    /// sender's bio. A failed bio lookup skips the bio check but never
    /// blocks the message check.
    pub async fn handle_group_message(
        &self,
        group: GroupId,
        user: UserId,
        message_id: MessageId,
        text: String,
    ) -> Result<()> {
        // One profile fetch serves both the display name and the bio check.
        let profile = match self.platform.user_profile(user).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Profile lookup failed for user {}: {}", user, e);
                None
            }
        };
        let display_name = profile
            .as_ref()
            .map(|p| p.display_name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user.to_string());

        let mut events = vec![ModerationEvent::Message {
            group,
            user,
            message_id,
            text,
        }];
        if let Some(profile) = profile {
            events.push(ModerationEvent::BioCheck {
                group,
                user,
                bio: profile.bio,
            });
        }

        // Message text and bio are judged as one update: the counter
        // resets only when both are clean, so clean chatter never
        // forgives a violating bio (or vice versa).
        match self.engine.review_update(&events).await {
            Ok(outcome_sets) => {
                for (event, outcomes) in events.iter().zip(outcome_sets.iter()) {
                    for outcome in outcomes {
                        self.render(event, outcome, &display_name).await;
                    }
                }
            }
            Err(e) => error!(
                "Failed to review update from user {} in group {}: {}",
                user, group, e
            ),
        }

        Ok(())
    }

    /// Moderate newly joined members: one bio-plus-handle check each.
    pub async fn handle_new_members(&self, group: GroupId, users: &[UserId]) -> Result<()> {
        for &user in users {
            let profile = match self.platform.user_profile(user).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!("Skipping join check for user {}: {}", user, e);
                    continue;
                }
            };

            let event = ModerationEvent::Join {
                group,
                user,
                bio: profile.bio,
                handle: profile.handle,
            };
            self.review_and_render(&event, &profile.display_name).await;
        }
        Ok(())
    }

    async fn review_and_render(&self, event: &ModerationEvent, display_name: &str) {
        match self.engine.review(event).await {
            Ok(outcomes) => {
                for outcome in &outcomes {
                    self.render(event, outcome, display_name).await;
                }
            }
            // Store or platform failure: the event failed cleanly, no
            // partial ledger state. Log and move on; the engine does not
            // retry.
            Err(e) => error!(
                "Failed to review {} event for user {} in group {}: {}",
                event.kind(),
                event.user(),
                event.group(),
                e
            ),
        }
    }

    async fn render(&self, event: &ModerationEvent, outcome: &Outcome, display_name: &str) {
        let group = event.group();
        let user = event.user();
        let reason = match event {
            ModerationEvent::Message { .. } => "link or mention in message",
            ModerationEvent::BioCheck { .. } => "link or mention in bio",
            ModerationEvent::Join { .. } => "link or mention in bio/handle",
        };

        match outcome {
            Outcome::Exempt | Outcome::PolicyDisabled | Outcome::Clean => {
                debug!("{:?} for user {} in group {}", outcome, user, group);
            }
            Outcome::Warned { count, limit } => {
                let text = format!(
                    "🚨 Warning Issued 🚨\n\n\
                     👤 User: {} [{}]\n\
                     ❌ Reason: {}\n\
                     ⚠️ Warning: {}/{}",
                    display_name, user, reason, count, limit
                );
                self.reply(group, &text).await;
                self.report(&format!(
                    "📢 Violation\nGroup: {}\nUser: {} ({})\nWarning: {}/{}\nReason: {}",
                    group, display_name, user, count, limit, reason
                ))
                .await;
            }
            Outcome::Enforced { penalty } => {
                let applied = match penalty {
                    Penalty::Mute => "🔇 muted",
                    Penalty::Ban => "🔨 banned",
                };
                let text = format!("{} [{}] has been {}.", display_name, user, applied);
                self.reply(group, &text).await;
                self.report(&format!(
                    "⚡ Enforced {}\nGroup: {}\nUser: {} ({})",
                    penalty, group, display_name, user
                ))
                .await;
            }
            Outcome::PermissionDenied { action } => {
                self.reply(
                    group,
                    &format!("I don't have permission to {} users here.", action),
                )
                .await;
            }
            Outcome::DeleteFailed => {
                self.reply(group, "Please grant me delete permission.").await;
            }
        }
    }

    async fn reply(&self, group: GroupId, text: &str) {
        if let Err(e) = self.platform.send_message(group, text).await {
            error!("Failed to send reply to group {}: {}", group, e);
        }
    }

    /// Best-effort report to the configured log channel.
    async fn report(&self, text: &str) {
        let Some(channel) = self.log_channel else {
            return;
        };
        let stamped = format!("{}\nAt: {}", text, chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
        if let Err(e) = self.platform.send_message(channel, &stamped).await {
            error!("Failed to send log report: {}", e);
        }
    }
}
