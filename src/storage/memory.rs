// src/storage/memory.rs - In-process storage backend

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::storage::{Storage, StoreError};
use crate::types::{ConfigPatch, GroupConfig, GroupId, UserId};

/// In-memory storage backend.
///
/// Every mutation takes the write lock for its map, so increments and
/// resets on the same (group, user) key are linearizable and partial
/// config updates are serialized rather than read-modify-written by
/// callers (no lost updates between concurrent patches).
#[derive(Default)]
pub struct MemoryStore {
    configs: RwLock<HashMap<GroupId, GroupConfig>>,
    warnings: RwLock<HashMap<(GroupId, UserId), i64>>,
    // Vec keeps insertion order for `whitelist_members`.
    whitelist: RwLock<HashMap<GroupId, Vec<UserId>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn load_config(&self, group: GroupId) -> Result<Option<GroupConfig>, StoreError> {
        Ok(self.configs.read().await.get(&group).copied())
    }

    async fn patch_config(&self, group: GroupId, patch: ConfigPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut configs = self.configs.write().await;
        configs.entry(group).or_default().apply(&patch);
        Ok(())
    }

    async fn increment_warnings(&self, group: GroupId, user: UserId) -> Result<i64, StoreError> {
        let mut warnings = self.warnings.write().await;
        let count = warnings.entry((group, user)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn clear_warnings(&self, group: GroupId, user: UserId) -> Result<(), StoreError> {
        self.warnings.write().await.remove(&(group, user));
        Ok(())
    }

    async fn insert_whitelist(&self, group: GroupId, user: UserId) -> Result<(), StoreError> {
        let mut whitelist = self.whitelist.write().await;
        let members = whitelist.entry(group).or_default();
        if !members.contains(&user) {
            members.push(user);
        }
        Ok(())
    }

    async fn delete_whitelist(&self, group: GroupId, user: UserId) -> Result<(), StoreError> {
        let mut whitelist = self.whitelist.write().await;
        if let Some(members) = whitelist.get_mut(&group) {
            members.retain(|id| *id != user);
        }
        Ok(())
    }

    async fn whitelist_contains(&self, group: GroupId, user: UserId) -> Result<bool, StoreError> {
        Ok(self
            .whitelist
            .read()
            .await
            .get(&group)
            .map(|members| members.contains(&user))
            .unwrap_or(false))
    }

    async fn whitelist_members(&self, group: GroupId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .whitelist
            .read()
            .await
            .get(&group)
            .cloned()
            .unwrap_or_default())
    }

    async fn known_groups(&self) -> Result<Vec<GroupId>, StoreError> {
        let mut groups: HashSet<GroupId> = self.configs.read().await.keys().copied().collect();
        groups.extend(self.warnings.read().await.keys().map(|(group, _)| *group));
        groups.extend(self.whitelist.read().await.keys().copied());
        Ok(groups.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Penalty;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();

        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment_warnings(-100, 7).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let final_count = store.increment_warnings(-100, 7).await.unwrap();
        assert_eq!(final_count, 51);
    }

    #[tokio::test]
    async fn reset_then_increment_restarts_at_one() {
        let store = MemoryStore::new();
        store.increment_warnings(-100, 7).await.unwrap();
        store.increment_warnings(-100, 7).await.unwrap();

        store.clear_warnings(-100, 7).await.unwrap();
        assert_eq!(store.increment_warnings(-100, 7).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = MemoryStore::new();
        store.clear_warnings(-100, 7).await.unwrap();
        store.clear_warnings(-100, 7).await.unwrap();
        assert_eq!(store.increment_warnings(-100, 7).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counters_are_keyed_per_group_and_user() {
        let store = MemoryStore::new();
        store.increment_warnings(-100, 7).await.unwrap();
        assert_eq!(store.increment_warnings(-200, 7).await.unwrap(), 1);
        assert_eq!(store.increment_warnings(-100, 8).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn whitelist_add_is_idempotent() {
        let store = MemoryStore::new();
        store.insert_whitelist(-100, 7).await.unwrap();
        store.insert_whitelist(-100, 7).await.unwrap();
        assert_eq!(store.whitelist_members(-100).await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn whitelist_remove_nonmember_is_noop() {
        let store = MemoryStore::new();
        store.insert_whitelist(-100, 7).await.unwrap();
        store.delete_whitelist(-100, 99).await.unwrap();
        store.delete_whitelist(-200, 7).await.unwrap();
        assert_eq!(store.whitelist_members(-100).await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn whitelist_keeps_insertion_order() {
        let store = MemoryStore::new();
        store.insert_whitelist(-100, 3).await.unwrap();
        store.insert_whitelist(-100, 1).await.unwrap();
        store.insert_whitelist(-100, 2).await.unwrap();
        assert_eq!(store.whitelist_members(-100).await.unwrap(), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn patch_config_leaves_other_fields() {
        let store = MemoryStore::new();
        store
            .patch_config(
                -100,
                ConfigPatch {
                    penalty: Some(Penalty::Ban),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .patch_config(
                -100,
                ConfigPatch {
                    warning_limit: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let cfg = store.load_config(-100).await.unwrap().unwrap();
        assert_eq!(cfg.penalty, Penalty::Ban);
        assert_eq!(cfg.warning_limit, 5);
        assert!(cfg.anti_link_enabled);
    }

    #[tokio::test]
    async fn known_groups_covers_all_collections() {
        let store = MemoryStore::new();
        store
            .patch_config(
                -1,
                ConfigPatch {
                    warning_limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.increment_warnings(-2, 7).await.unwrap();
        store.insert_whitelist(-3, 7).await.unwrap();

        let mut groups = store.known_groups().await.unwrap();
        groups.sort();
        assert_eq!(groups, vec![-3, -2, -1]);
    }
}
