// src/bot/broadcast.rs - Best-effort fan-out to every known group

use log::{info, warn};
use std::sync::Arc;

use crate::platforms::ChatPlatform;
use crate::storage::{Storage, StoreError};

/// Aggregate result of a broadcast. Per-target failures are isolated;
/// the counts are the only accounting callers get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub success: usize,
    pub failed: usize,
}

/// Send a message to every group the store has seen. One target failing
/// never aborts delivery to the rest.
pub async fn broadcast(
    store: &Arc<dyn Storage>,
    platform: &Arc<dyn ChatPlatform>,
    text: &str,
) -> Result<BroadcastReport, StoreError> {
    let groups = store.known_groups().await?;
    let mut report = BroadcastReport {
        success: 0,
        failed: 0,
    };

    for group in groups {
        match platform.send_message(group, text).await {
            Ok(()) => report.success += 1,
            Err(e) => {
                warn!("Broadcast to group {} failed: {}", group, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Broadcast done: {} delivered, {} failed",
        report.success, report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::{GroupId, UserId, UserProfile};
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct FlakyPlatform {
        refuse: GroupId,
        delivered: Mutex<Vec<GroupId>>,
    }

    #[async_trait]
    impl ChatPlatform for FlakyPlatform {
        async fn is_admin(&self, _group: GroupId, _user: UserId) -> Result<bool> {
            Ok(false)
        }

        async fn user_profile(&self, _user: UserId) -> Result<UserProfile> {
            Ok(UserProfile::default())
        }

        async fn send_message(&self, chat: GroupId, _text: &str) -> Result<()> {
            if chat == self.refuse {
                anyhow::bail!("kicked from group");
            }
            self.delivered.lock().await.push(chat);
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_rest() {
        let memory = MemoryStore::new();
        memory.increment_warnings(-1, 7).await.unwrap();
        memory.increment_warnings(-2, 7).await.unwrap();
        memory.increment_warnings(-3, 7).await.unwrap();
        let store: Arc<dyn Storage> = Arc::new(memory);

        let platform: Arc<dyn ChatPlatform> = Arc::new(FlakyPlatform {
            refuse: -2,
            delivered: Mutex::new(Vec::new()),
        });

        let report = broadcast(&store, &platform, "maintenance tonight")
            .await
            .unwrap();
        assert_eq!(
            report,
            BroadcastReport {
                success: 2,
                failed: 1
            }
        );
    }
}
