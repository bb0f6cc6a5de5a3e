// src/bot/commands.rs - Chat command surface (/config, /free, /broadcast, ...)

use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::bot::broadcast;
use crate::bot::ledger::ViolationLedger;
use crate::bot::policy::PolicyStore;
use crate::platforms::ChatPlatform;
use crate::storage::Storage;
use crate::types::{ConfigPatch, GroupId, Penalty, UserId};

const HELP_TEXT: &str = "🛠️ Commands\n\n\
/config – show group settings\n\
/config limit <n> – warnings before the penalty\n\
/config penalty <mute|ban> – enforcement action\n\
/config antilink <on|off> – toggle link checks\n\
/free – whitelist a user (reply or id)\n\
/unfree – remove from whitelist\n\
/freelist – list whitelisted users\n\
/broadcast <text> – send to all groups (owner, private chat)\n\
/ping – check bot latency";

const START_TEXT: &str = "✨ Welcome! ✨\n\n\
🛡️ I protect groups from users posting links or carrying links in their bio.\n\n\
Use /help to see all available commands.";

/// Where a command came from, as extracted from the inbound update.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    /// Chat the command was issued in (group, or the private chat id).
    pub chat: GroupId,
    pub user: UserId,
    pub private: bool,
    /// Sender of the replied-to message, for reply-based targeting.
    pub reply_to_user: Option<UserId>,
}

/// Handles the admin/owner command surface. Reports whether it handled
/// the text so the caller can fall through to moderation otherwise.
pub struct CommandSystem {
    policy: Arc<PolicyStore>,
    ledger: Arc<ViolationLedger>,
    platform: Arc<dyn ChatPlatform>,
    store: Arc<dyn Storage>,
    owner_id: UserId,
}

impl CommandSystem {
    pub fn new(
        policy: Arc<PolicyStore>,
        ledger: Arc<ViolationLedger>,
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn Storage>,
        owner_id: UserId,
    ) -> Self {
        Self {
            policy,
            ledger,
            platform,
            store,
            owner_id,
        }
    }

    /// Process a possible command. Returns Ok(true) when the text was a
    /// recognized command (handled, even if refused), Ok(false) when the
    /// text is not a command at all.
    pub async fn process_command(&self, ctx: &CommandContext, text: &str) -> Result<bool> {
        let Some(rest) = text.strip_prefix('/') else {
            return Ok(false);
        };
        let mut parts = rest.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(false);
        };
        // Commands in groups may carry the bot handle: /config@SomeBot
        let command = command.split('@').next().unwrap_or(command).to_lowercase();
        let args: Vec<&str> = parts.collect();

        match command.as_str() {
            "start" => self.reply(ctx, START_TEXT).await?,
            "help" => self.reply(ctx, HELP_TEXT).await?,
            "ping" => self.ping(ctx).await?,
            "config" => self.config(ctx, &args).await?,
            "free" => self.free(ctx, &args).await?,
            "unfree" => self.unfree(ctx, &args).await?,
            "freelist" => self.freelist(ctx).await?,
            "broadcast" => self.broadcast(ctx, &args).await?,
            _ => return Ok(false),
        }

        Ok(true)
    }

    async fn ping(&self, ctx: &CommandContext) -> Result<()> {
        let start = Instant::now();
        self.reply(ctx, "🏓 Pinging...").await?;
        let elapsed = start.elapsed().as_millis();
        self.reply(ctx, &format!("🏓 Pong! {}ms", elapsed)).await
    }

    async fn config(&self, ctx: &CommandContext, args: &[&str]) -> Result<()> {
        if ctx.private {
            return self.reply(ctx, "This command works in groups.").await;
        }

        if args.is_empty() {
            let cfg = self.policy.config(ctx.chat).await?;
            let text = format!(
                "⚙️ Group settings\n\n\
                 Warning limit: {}\n\
                 Penalty: {}\n\
                 Anti-link: {}",
                cfg.warning_limit,
                cfg.penalty,
                if cfg.anti_link_enabled { "on" } else { "off" }
            );
            return self.reply(ctx, &text).await;
        }

        if !self.ensure_admin(ctx).await? {
            return Ok(());
        }

        match parse_config_patch(args) {
            Ok(patch) => {
                self.policy.update(ctx.chat, patch).await?;
                info!(
                    "Config updated in group {} by admin {}: {:?}",
                    ctx.chat, ctx.user, patch
                );
                self.reply(ctx, "✅ Settings updated.").await
            }
            Err(usage) => self.reply(ctx, &usage).await,
        }
    }

    async fn free(&self, ctx: &CommandContext, args: &[&str]) -> Result<()> {
        if ctx.private {
            return self.reply(ctx, "This command works in groups.").await;
        }
        if !self.ensure_admin(ctx).await? {
            return Ok(());
        }

        let Some(target) = resolve_target(ctx, args) else {
            return self
                .reply(ctx, "Reply to a user or pass their id: /free <user-id>")
                .await;
        };

        self.policy.add_whitelist(ctx.chat, target).await?;
        // Whitelisting is an explicit admin reset of the warning budget.
        self.ledger.reset(ctx.chat, target).await?;
        info!(
            "User {} whitelisted in group {} by admin {}",
            target, ctx.chat, ctx.user
        );
        self.reply(ctx, &format!("✅ User {} is now whitelisted.", target))
            .await
    }

    async fn unfree(&self, ctx: &CommandContext, args: &[&str]) -> Result<()> {
        if ctx.private {
            return self.reply(ctx, "This command works in groups.").await;
        }
        if !self.ensure_admin(ctx).await? {
            return Ok(());
        }

        let Some(target) = resolve_target(ctx, args) else {
            return self
                .reply(ctx, "Reply to a user or pass their id: /unfree <user-id>")
                .await;
        };

        self.policy.remove_whitelist(ctx.chat, target).await?;
        self.reply(
            ctx,
            &format!("✅ User {} removed from the whitelist.", target),
        )
        .await
    }

    async fn freelist(&self, ctx: &CommandContext) -> Result<()> {
        if ctx.private {
            return self.reply(ctx, "This command works in groups.").await;
        }

        let members = self.policy.list_whitelist(ctx.chat).await?;
        if members.is_empty() {
            return self.reply(ctx, "No whitelisted users in this group.").await;
        }

        let mut text = String::from("📋 Whitelisted users:\n");
        for user in members {
            text.push_str(&format!("• {}\n", user));
        }
        self.reply(ctx, &text).await
    }

    async fn broadcast(&self, ctx: &CommandContext, args: &[&str]) -> Result<()> {
        if !ctx.private {
            return self.reply(ctx, "Use /broadcast in a private chat.").await;
        }
        if ctx.user != self.owner_id {
            warn!("Broadcast refused for non-owner {}", ctx.user);
            return self.reply(ctx, "❌ You are not authorized.").await;
        }
        if args.is_empty() {
            return self.reply(ctx, "Usage: /broadcast <text>").await;
        }

        let text = args.join(" ");
        let report = broadcast::broadcast(&self.store, &self.platform, &text).await?;
        self.reply(
            ctx,
            &format!(
                "✅ Broadcast done\nSuccess: {}\nFailed: {}",
                report.success, report.failed
            ),
        )
        .await
    }

    async fn ensure_admin(&self, ctx: &CommandContext) -> Result<bool> {
        if self.platform.is_admin(ctx.chat, ctx.user).await? {
            return Ok(true);
        }
        self.reply(ctx, "Only group admins can do that.").await?;
        Ok(false)
    }

    async fn reply(&self, ctx: &CommandContext, text: &str) -> Result<()> {
        self.platform.send_message(ctx.chat, text).await
    }
}

/// Parse `/config <field> <value>` arguments into a partial update.
fn parse_config_patch(args: &[&str]) -> Result<ConfigPatch, String> {
    let usage = "Usage: /config limit <n> | penalty <mute|ban> | antilink <on|off>".to_string();
    if args.len() != 2 {
        return Err(usage);
    }

    let mut patch = ConfigPatch::default();
    match (args[0].to_lowercase().as_str(), args[1].to_lowercase().as_str()) {
        ("limit", value) => {
            let limit: i64 = value.parse().map_err(|_| usage.clone())?;
            patch.warning_limit = Some(limit);
        }
        ("penalty", "mute") => patch.penalty = Some(Penalty::Mute),
        ("penalty", "ban") => patch.penalty = Some(Penalty::Ban),
        ("antilink", "on") => patch.anti_link_enabled = Some(true),
        ("antilink", "off") => patch.anti_link_enabled = Some(false),
        _ => return Err(usage),
    }
    Ok(patch)
}

fn resolve_target(ctx: &CommandContext, args: &[&str]) -> Option<UserId> {
    if let Some(arg) = args.first() {
        if let Ok(id) = arg.parse::<UserId>() {
            return Some(id);
        }
    }
    ctx.reply_to_user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::UserProfile;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    const GROUP: GroupId = -1001;
    const ADMIN: UserId = 1;
    const MEMBER: UserId = 7;
    const OWNER: UserId = 99;

    struct FakePlatform {
        admins: HashSet<(GroupId, UserId)>,
        sent: Mutex<Vec<(GroupId, String)>>,
    }

    #[async_trait]
    impl ChatPlatform for FakePlatform {
        async fn is_admin(&self, group: GroupId, user: UserId) -> Result<bool> {
            Ok(self.admins.contains(&(group, user)))
        }

        async fn user_profile(&self, _user: UserId) -> Result<UserProfile> {
            Ok(UserProfile::default())
        }

        async fn send_message(&self, chat: GroupId, text: &str) -> Result<()> {
            self.sent.lock().await.push((chat, text.to_string()));
            Ok(())
        }
    }

    struct Harness {
        commands: CommandSystem,
        store: Arc<MemoryStore>,
        platform: Arc<FakePlatform>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let storage: Arc<dyn Storage> = store.clone();
        let platform = Arc::new(FakePlatform {
            admins: vec![(GROUP, ADMIN)].into_iter().collect(),
            sent: Mutex::new(Vec::new()),
        });
        let commands = CommandSystem::new(
            Arc::new(PolicyStore::new(storage.clone())),
            Arc::new(ViolationLedger::new(storage.clone())),
            platform.clone(),
            storage,
            OWNER,
        );
        Harness {
            commands,
            store,
            platform,
        }
    }

    fn group_ctx(user: UserId) -> CommandContext {
        CommandContext {
            chat: GROUP,
            user,
            private: false,
            reply_to_user: None,
        }
    }

    fn private_ctx(user: UserId) -> CommandContext {
        CommandContext {
            chat: user,
            user,
            private: true,
            reply_to_user: None,
        }
    }

    #[test]
    fn parses_config_arguments() {
        assert_eq!(
            parse_config_patch(&["limit", "5"]).unwrap().warning_limit,
            Some(5)
        );
        assert_eq!(
            parse_config_patch(&["penalty", "ban"]).unwrap().penalty,
            Some(Penalty::Ban)
        );
        assert_eq!(
            parse_config_patch(&["antilink", "off"])
                .unwrap()
                .anti_link_enabled,
            Some(false)
        );
        assert!(parse_config_patch(&["limit", "lots"]).is_err());
        assert!(parse_config_patch(&["limit"]).is_err());
        assert!(parse_config_patch(&[]).is_err());
    }

    #[tokio::test]
    async fn non_command_text_is_not_handled() {
        let h = harness();
        assert!(!h
            .commands
            .process_command(&group_ctx(MEMBER), "just chatting")
            .await
            .unwrap());
        assert!(!h
            .commands
            .process_command(&group_ctx(MEMBER), "/unknowncmd")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn admin_can_update_config() {
        let h = harness();
        assert!(h
            .commands
            .process_command(&group_ctx(ADMIN), "/config limit 5")
            .await
            .unwrap());

        let cfg = h.store.load_config(GROUP).await.unwrap().unwrap();
        assert_eq!(cfg.warning_limit, 5);
    }

    #[tokio::test]
    async fn bot_handle_suffix_is_stripped() {
        let h = harness();
        assert!(h
            .commands
            .process_command(&group_ctx(ADMIN), "/config@BioGuardBot penalty ban")
            .await
            .unwrap());

        let cfg = h.store.load_config(GROUP).await.unwrap().unwrap();
        assert_eq!(cfg.penalty, Penalty::Ban);
    }

    #[tokio::test]
    async fn non_admin_cannot_update_config() {
        let h = harness();
        h.commands
            .process_command(&group_ctx(MEMBER), "/config limit 1")
            .await
            .unwrap();

        assert!(h.store.load_config(GROUP).await.unwrap().is_none());
        let sent = h.platform.sent.lock().await;
        assert!(sent.iter().any(|(_, text)| text.contains("Only group admins")));
    }

    #[tokio::test]
    async fn free_whitelists_and_resets_warnings() {
        let h = harness();
        h.store.increment_warnings(GROUP, MEMBER).await.unwrap();
        h.store.increment_warnings(GROUP, MEMBER).await.unwrap();

        h.commands
            .process_command(&group_ctx(ADMIN), &format!("/free {}", MEMBER))
            .await
            .unwrap();

        assert!(h.store.whitelist_contains(GROUP, MEMBER).await.unwrap());
        // Warning budget was reset by the whitelist add.
        assert_eq!(h.store.increment_warnings(GROUP, MEMBER).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn free_targets_replied_user() {
        let h = harness();
        let ctx = CommandContext {
            reply_to_user: Some(MEMBER),
            ..group_ctx(ADMIN)
        };
        h.commands.process_command(&ctx, "/free").await.unwrap();
        assert!(h.store.whitelist_contains(GROUP, MEMBER).await.unwrap());
    }

    #[tokio::test]
    async fn unfree_removes_whitelist_entry() {
        let h = harness();
        h.store.insert_whitelist(GROUP, MEMBER).await.unwrap();

        h.commands
            .process_command(&group_ctx(ADMIN), &format!("/unfree {}", MEMBER))
            .await
            .unwrap();
        assert!(!h.store.whitelist_contains(GROUP, MEMBER).await.unwrap());
    }

    #[tokio::test]
    async fn freelist_shows_members() {
        let h = harness();
        h.store.insert_whitelist(GROUP, 5).await.unwrap();
        h.store.insert_whitelist(GROUP, 6).await.unwrap();

        h.commands
            .process_command(&group_ctx(MEMBER), "/freelist")
            .await
            .unwrap();

        let sent = h.platform.sent.lock().await;
        let listing = &sent.last().unwrap().1;
        assert!(listing.contains("• 5"));
        assert!(listing.contains("• 6"));
    }

    #[tokio::test]
    async fn broadcast_is_owner_only_and_private_only() {
        let h = harness();
        h.store.increment_warnings(GROUP, MEMBER).await.unwrap();

        h.commands
            .process_command(&private_ctx(MEMBER), "/broadcast hi all")
            .await
            .unwrap();
        {
            let sent = h.platform.sent.lock().await;
            assert!(sent.iter().any(|(_, text)| text.contains("not authorized")));
        }

        h.commands
            .process_command(&private_ctx(OWNER), "/broadcast hi all")
            .await
            .unwrap();
        let sent = h.platform.sent.lock().await;
        assert!(sent.iter().any(|(chat, text)| *chat == GROUP && text == "hi all"));
        assert!(sent
            .iter()
            .any(|(_, text)| text.contains("Success: 1") && text.contains("Failed: 0")));
    }

    #[tokio::test]
    async fn config_without_args_shows_defaults() {
        let h = harness();
        h.commands
            .process_command(&group_ctx(MEMBER), "/config")
            .await
            .unwrap();
        let sent = h.platform.sent.lock().await;
        let shown = &sent.last().unwrap().1;
        assert!(shown.contains("Warning limit: 3"));
        assert!(shown.contains("Penalty: mute"));
        assert!(shown.contains("Anti-link: on"));
    }
}
