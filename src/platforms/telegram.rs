use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Duration};
use url::Url;

use crate::platforms::{ChatPlatform, EnforceError, Enforcer, InboundUpdate, PlatformConnection};
use crate::types::{GroupId, MessageId, UserId, UserProfile};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_SECONDS: u64 = 30;

/// Telegram Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: MessageId,
    chat: TgChat,
    from: Option<TgUser>,
    text: Option<String>,
    caption: Option<String>,
    #[serde(default)]
    new_chat_members: Vec<TgUser>,
    reply_to_message: Option<Box<TgMessage>>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
    #[serde(rename = "type")]
    chat_type: String,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: UserId,
}

#[derive(Debug, Deserialize)]
struct TgChatInfo {
    bio: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChatMember {
    status: String,
}

#[derive(Debug, Serialize)]
struct MutePermissions {
    can_send_messages: bool,
    can_send_other_messages: bool,
    can_add_web_page_previews: bool,
}

/// Configuration for the Telegram Bot API connection
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
}

impl TelegramConfig {
    /// Load Telegram configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN environment variable not set")?;

        let api_base =
            env::var("TELEGRAM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        info!("Loaded Telegram config (api base: {})", api_base);

        Ok(Self {
            bot_token,
            api_base,
        })
    }
}

/// Telegram Bot API connection: long-polls getUpdates into a broadcast
/// channel and implements the read/enforcement capabilities against the
/// same HTTP client.
pub struct TelegramConnection {
    config: TelegramConfig,
    update_sender: Option<broadcast::Sender<InboundUpdate>>,
    is_connected: Arc<RwLock<bool>>,
    http_client: reqwest::Client,
}

impl TelegramConnection {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            update_sender: None,
            is_connected: Arc::new(RwLock::new(false)),
            http_client: reqwest::Client::new(),
        }
    }

    fn method_url(config: &TelegramConfig, method: &str) -> Result<Url, EnforceError> {
        let raw = format!("{}/bot{}/{}", config.api_base, config.bot_token, method);
        Url::parse(&raw).map_err(|e| EnforceError::Platform(format!("bad API url: {}", e)))
    }

    /// Invoke a Bot API method. Retries once on a 429 rate limit,
    /// honoring the server-provided retry_after; a 403 or "not enough
    /// rights" refusal maps to `EnforceError::PermissionDenied`.
    async fn invoke<T: DeserializeOwned>(
        client: &reqwest::Client,
        config: &TelegramConfig,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, EnforceError> {
        let url = Self::method_url(config, method)?;

        let mut rate_limited_once = false;
        loop {
            let response = client
                .post(url.clone())
                .json(&params)
                .send()
                .await
                .map_err(|e| EnforceError::Platform(format!("{} request failed: {}", method, e)))?;

            let envelope: ApiResponse<T> = response
                .json()
                .await
                .map_err(|e| EnforceError::Platform(format!("{} bad response: {}", method, e)))?;

            if envelope.ok {
                return envelope.result.ok_or_else(|| {
                    EnforceError::Platform(format!("{} returned ok without a result", method))
                });
            }

            let description = envelope.description.unwrap_or_else(|| "unknown".to_string());
            let code = envelope.error_code.unwrap_or(0);

            if code == 429 && !rate_limited_once {
                let wait = envelope
                    .parameters
                    .and_then(|p| p.retry_after)
                    .unwrap_or(1);
                warn!("{} rate limited, retrying after {}s", method, wait);
                sleep(Duration::from_secs(wait)).await;
                rate_limited_once = true;
                continue;
            }

            let lowered = description.to_lowercase();
            if code == 403
                || lowered.contains("not enough rights")
                || lowered.contains("chat_admin_required")
                || lowered.contains("can't be deleted")
            {
                debug!("{} refused by platform: {}", method, description);
                return Err(EnforceError::PermissionDenied);
            }

            return Err(EnforceError::Platform(format!(
                "{} error {}: {}",
                method, code, description
            )));
        }
    }

    fn convert_message(message: TgMessage) -> Option<InboundUpdate> {
        let private = message.chat.chat_type == "private";

        if !message.new_chat_members.is_empty() && !private {
            return Some(InboundUpdate::NewMembers {
                group: message.chat.id,
                users: message.new_chat_members.into_iter().map(|u| u.id).collect(),
            });
        }

        let user = message.from.as_ref()?.id;
        let text = message
            .text
            .or(message.caption)
            .unwrap_or_default();

        Some(InboundUpdate::GroupMessage {
            group: message.chat.id,
            user,
            message_id: message.message_id,
            text,
            private,
            reply_to_user: message
                .reply_to_message
                .and_then(|reply| reply.from.map(|u| u.id)),
        })
    }

    async fn poll_updates(
        client: &reqwest::Client,
        config: &TelegramConfig,
        offset: i64,
    ) -> Result<Vec<TgUpdate>, EnforceError> {
        Self::invoke(
            client,
            config,
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": LONG_POLL_SECONDS,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }
}

#[async_trait]
impl PlatformConnection for TelegramConnection {
    async fn connect(&mut self) -> Result<()> {
        info!("Connecting to Telegram Bot API...");

        // getMe doubles as a connectivity and token check.
        let me: serde_json::Value = Self::invoke(
            &self.http_client,
            &self.config,
            "getMe",
            json!({}),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Telegram API connection failed: {}", e))?;

        if let Some(username) = me.get("username").and_then(|v| v.as_str()) {
            info!("Connected to Telegram as @{}", username);
        }

        let (tx, _) = broadcast::channel(1000);
        self.update_sender = Some(tx.clone());
        *self.is_connected.write().await = true;

        let update_sender = tx;
        let is_connected = Arc::clone(&self.is_connected);
        let config = self.config.clone();
        let http_client = self.http_client.clone();

        tokio::spawn(async move {
            info!("Telegram update poller started");
            let mut offset: i64 = 0;
            let mut backoff = Duration::from_secs(1);

            loop {
                if !*is_connected.read().await {
                    info!("Telegram connection marked as disconnected, stopping poller");
                    break;
                }

                match Self::poll_updates(&http_client, &config, offset).await {
                    Ok(updates) => {
                        backoff = Duration::from_secs(1);
                        debug!("Polled {} Telegram updates", updates.len());

                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            let Some(message) = update.message else {
                                continue;
                            };
                            if let Some(inbound) = Self::convert_message(message) {
                                if let Err(e) = update_sender.send(inbound) {
                                    warn!("Failed to broadcast Telegram update: {}", e);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("Failed to poll Telegram updates: {}", e);
                        backoff = std::cmp::min(backoff * 2, Duration::from_secs(60));
                        warn!("Backing off polling for {:?}", backoff);
                        sleep(backoff).await;
                    }
                }
            }

            warn!("Telegram update poller stopped");
        });

        info!("Telegram connection established");
        Ok(())
    }

    fn platform_name(&self) -> &str {
        "telegram"
    }

    async fn is_connected(&self) -> bool {
        *self.is_connected.read().await
    }

    fn get_update_receiver(&self) -> Option<broadcast::Receiver<InboundUpdate>> {
        self.update_sender.as_ref().map(|sender| sender.subscribe())
    }

    async fn disconnect(&mut self) -> Result<()> {
        *self.is_connected.write().await = false;
        self.update_sender = None;
        info!("Disconnected from Telegram");
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for TelegramConnection {
    async fn is_admin(&self, group: GroupId, user: UserId) -> Result<bool> {
        let member: TgChatMember = Self::invoke(
            &self.http_client,
            &self.config,
            "getChatMember",
            json!({ "chat_id": group, "user_id": user }),
        )
        .await
        .map_err(|e| anyhow::anyhow!("admin lookup failed: {}", e))?;

        Ok(member.status == "creator" || member.status == "administrator")
    }

    async fn user_profile(&self, user: UserId) -> Result<UserProfile> {
        let chat: TgChatInfo = Self::invoke(
            &self.http_client,
            &self.config,
            "getChat",
            json!({ "chat_id": user }),
        )
        .await
        .map_err(|e| anyhow::anyhow!("profile lookup failed: {}", e))?;

        let display_name = match (&chat.first_name, &chat.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => user.to_string(),
        };

        Ok(UserProfile {
            bio: chat.bio.unwrap_or_default(),
            handle: chat.username,
            display_name,
        })
    }

    async fn send_message(&self, chat: GroupId, text: &str) -> Result<()> {
        let _: TgMessage = Self::invoke(
            &self.http_client,
            &self.config,
            "sendMessage",
            json!({
                "chat_id": chat,
                "text": text,
                "disable_web_page_preview": true,
            }),
        )
        .await
        .map_err(|e| anyhow::anyhow!("sendMessage failed: {}", e))?;

        debug!("Sent Telegram message to {}", chat);
        Ok(())
    }
}

#[async_trait]
impl Enforcer for TelegramConnection {
    async fn mute(&self, group: GroupId, user: UserId) -> Result<(), EnforceError> {
        let _: bool = Self::invoke(
            &self.http_client,
            &self.config,
            "restrictChatMember",
            json!({
                "chat_id": group,
                "user_id": user,
                "permissions": MutePermissions {
                    can_send_messages: false,
                    can_send_other_messages: false,
                    can_add_web_page_previews: false,
                },
            }),
        )
        .await?;

        info!("Muted user {} in group {}", user, group);
        Ok(())
    }

    async fn ban(&self, group: GroupId, user: UserId) -> Result<(), EnforceError> {
        let _: bool = Self::invoke(
            &self.http_client,
            &self.config,
            "banChatMember",
            json!({ "chat_id": group, "user_id": user }),
        )
        .await?;

        info!("Banned user {} from group {}", user, group);
        Ok(())
    }

    async fn delete_content(
        &self,
        group: GroupId,
        message_id: MessageId,
    ) -> Result<(), EnforceError> {
        let _: bool = Self::invoke(
            &self.http_client,
            &self.config,
            "deleteMessage",
            json!({ "chat_id": group, "message_id": message_id }),
        )
        .await?;

        debug!("Deleted message {} in group {}", message_id, group);
        Ok(())
    }
}
