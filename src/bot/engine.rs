// src/bot/engine.rs - Violation detection and escalation state machine

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;

use crate::bot::ledger::ViolationLedger;
use crate::bot::patterns::PatternMatcher;
use crate::bot::policy::PolicyStore;
use crate::platforms::{ChatPlatform, EnforceError, Enforcer};
use crate::types::{EnforceAction, ModerationEvent, Outcome, Penalty};

/// The escalation state machine.
///
/// Per (group, user) pair the state is implicit in the counter value
/// relative to the group's warning limit: Clean (absent/zero), Warned(n)
/// for 1 <= n < limit, and Enforced, which immediately resets back to
/// Clean. The engine never mutates platform state directly; it only
/// calls the injected `Enforcer` and ledger.
pub struct EscalationEngine {
    policy: Arc<PolicyStore>,
    ledger: Arc<ViolationLedger>,
    platform: Arc<dyn ChatPlatform>,
    enforcer: Arc<dyn Enforcer>,
    matcher: PatternMatcher,
}

impl EscalationEngine {
    pub fn new(
        policy: Arc<PolicyStore>,
        ledger: Arc<ViolationLedger>,
        platform: Arc<dyn ChatPlatform>,
        enforcer: Arc<dyn Enforcer>,
        matcher: PatternMatcher,
    ) -> Self {
        Self {
            policy,
            ledger,
            platform,
            enforcer,
            matcher,
        }
    }

    /// Review one inbound event and return the outcomes it produced, in
    /// order. A returned error means the event failed cleanly: no ledger
    /// mutation is left half-applied and nothing was reset.
    pub async fn review(&self, event: &ModerationEvent) -> Result<Vec<Outcome>> {
        self.review_scoped(event, true).await
    }

    /// Review the sub-checks derived from one inbound update as a single
    /// decision. The counter resets only when every sub-check is clean;
    /// a clean message never forgives a violating bio in the same update
    /// (or vice versa). Returns one outcome list per event, in order.
    pub async fn review_update(&self, events: &[ModerationEvent]) -> Result<Vec<Vec<Outcome>>> {
        let update_clean = !events.iter().any(|event| self.matcher.matches(&event.text()));

        let mut outcome_sets = Vec::with_capacity(events.len());
        for event in events {
            outcome_sets.push(self.review_scoped(event, update_clean).await?);
        }
        Ok(outcome_sets)
    }

    async fn review_scoped(
        &self,
        event: &ModerationEvent,
        reset_on_clean: bool,
    ) -> Result<Vec<Outcome>> {
        let group = event.group();
        let user = event.user();

        // Exemptions short-circuit before any matcher or ledger work.
        // Admin status is queried live; it can change between events.
        let admin = self
            .platform
            .is_admin(group, user)
            .await
            .context("admin check failed")?;
        if admin || self.policy.is_whitelisted(group, user).await? {
            debug!("{} event from exempt user {} in {}", event.kind(), user, group);
            return Ok(vec![Outcome::Exempt]);
        }

        let cfg = self.policy.config(group).await?;
        if !cfg.anti_link_enabled {
            return Ok(vec![Outcome::PolicyDisabled]);
        }

        if !self.matcher.matches(&event.text()) {
            // Forgiveness on compliance: clean content clears any stale
            // warnings rather than letting them decay over time. Skipped
            // when a sibling sub-check of the same update violated.
            if reset_on_clean {
                self.ledger.reset(group, user).await?;
            }
            return Ok(vec![Outcome::Clean]);
        }

        info!(
            "Violation in group {} by user {} ({} event)",
            group,
            user,
            event.kind()
        );

        let mut outcomes = Vec::new();

        // Deletion is attempted before counting; failure is reported but
        // blocks neither counting nor enforcement.
        if let Some(message_id) = event.deletable() {
            if let Err(e) = self.enforcer.delete_content(group, message_id).await {
                warn!(
                    "Failed to delete message {} in group {}: {}",
                    message_id, group, e
                );
                outcomes.push(Outcome::DeleteFailed);
            }
        }

        let count = self.ledger.increment(group, user).await?;

        if count < cfg.warning_limit {
            outcomes.push(Outcome::Warned {
                count,
                limit: cfg.warning_limit,
            });
            return Ok(outcomes);
        }

        // At or above the limit. A non-positive limit enforces on the
        // very first violation.
        let action = EnforceAction::from(cfg.penalty);
        let applied = match cfg.penalty {
            Penalty::Mute => self.enforcer.mute(group, user).await,
            Penalty::Ban => self.enforcer.ban(group, user).await,
        };

        match applied {
            Ok(()) => {
                self.ledger.reset(group, user).await?;
                info!("Applied {} to user {} in group {}", action, user, group);
                outcomes.push(Outcome::Enforced {
                    penalty: cfg.penalty,
                });
            }
            Err(EnforceError::PermissionDenied) => {
                // Keep the escalated count so the next violation
                // re-attempts enforcement instead of restarting from zero.
                warn!(
                    "No permission to {} user {} in group {}",
                    action, user, group
                );
                outcomes.push(Outcome::PermissionDenied { action });
            }
            Err(EnforceError::Platform(e)) => {
                return Err(anyhow::anyhow!("{} failed for user {}: {}", action, user, e));
            }
        }

        Ok(outcomes)
    }
}
