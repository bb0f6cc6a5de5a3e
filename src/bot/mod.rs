use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use crate::config::Settings;
use crate::platforms::{ChatPlatform, Enforcer, InboundUpdate};
use crate::storage::Storage;

pub mod broadcast;
pub mod commands;
pub mod dispatcher;
pub mod engine;
pub mod ledger;
pub mod patterns;
pub mod policy;

use commands::{CommandContext, CommandSystem};
use dispatcher::EventDispatcher;
use engine::EscalationEngine;
use ledger::ViolationLedger;
use patterns::PatternMatcher;
use policy::PolicyStore;

/// Core bot engine wiring the policy store, ledger, escalation engine,
/// dispatcher and command surface together. All dependencies are
/// injected once at construction; nothing is reached through globals.
pub struct ModerationBot {
    dispatcher: Arc<EventDispatcher>,
    commands: Arc<CommandSystem>,
}

impl ModerationBot {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn Storage>,
        platform: Arc<dyn ChatPlatform>,
        enforcer: Arc<dyn Enforcer>,
    ) -> Result<Self> {
        let policy = Arc::new(PolicyStore::new(store.clone()));
        let ledger = Arc::new(ViolationLedger::new(store.clone()));

        let engine = Arc::new(EscalationEngine::new(
            policy.clone(),
            ledger.clone(),
            platform.clone(),
            enforcer,
            PatternMatcher::new()?,
        ));

        let dispatcher = Arc::new(EventDispatcher::new(
            engine,
            platform.clone(),
            settings.log_channel,
        ));

        let commands = Arc::new(CommandSystem::new(
            policy,
            ledger,
            platform,
            store,
            settings.owner_id,
        ));

        Ok(Self {
            dispatcher,
            commands,
        })
    }

    /// Consume inbound updates until the channel closes. Each update is
    /// processed in its own task; there is no global ordering across
    /// different (group, user) keys.
    pub async fn run(&self, mut receiver: Receiver<InboundUpdate>) -> Result<()> {
        info!("Moderation bot started");

        loop {
            match receiver.recv().await {
                Ok(update) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let commands = Arc::clone(&self.commands);
                    tokio::spawn(async move {
                        Self::handle_update(dispatcher, commands, update).await;
                    });
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Update receiver lagged by {} updates", n);
                }
                Err(RecvError::Closed) => {
                    info!("Update receiver closed");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_update(
        dispatcher: Arc<EventDispatcher>,
        commands: Arc<CommandSystem>,
        update: InboundUpdate,
    ) {
        match update {
            InboundUpdate::GroupMessage {
                group,
                user,
                message_id,
                text,
                private,
                reply_to_user,
            } => {
                let ctx = CommandContext {
                    chat: group,
                    user,
                    private,
                    reply_to_user,
                };
                match commands.process_command(&ctx, &text).await {
                    Ok(true) => return,
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Command handling failed in chat {}: {}", group, e);
                        return;
                    }
                }

                // Private non-command chatter is not moderated.
                if private {
                    return;
                }

                if let Err(e) = dispatcher
                    .handle_group_message(group, user, message_id, text)
                    .await
                {
                    warn!("Failed to moderate message in group {}: {}", group, e);
                }
            }
            InboundUpdate::NewMembers { group, users } => {
                if let Err(e) = dispatcher.handle_new_members(group, &users).await {
                    warn!("Failed to check new members in group {}: {}", group, e);
                }
            }
        }
    }
}
