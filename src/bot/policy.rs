// src/bot/policy.rs - Per-group configuration and whitelist

use std::sync::Arc;

use crate::storage::{Storage, StoreError};
use crate::types::{ConfigPatch, GroupConfig, GroupId, UserId};

/// Sole owner of group configuration and whitelist records.
///
/// Absent configuration resolves to defaults, so reads never fail for a
/// valid group id. Updates are partial: only the provided fields are
/// written, the storage backend serializes concurrent patches.
pub struct PolicyStore {
    store: Arc<dyn Storage>,
}

impl PolicyStore {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Effective configuration for a group, merged over defaults.
    pub async fn config(&self, group: GroupId) -> Result<GroupConfig, StoreError> {
        Ok(self.store.load_config(group).await?.unwrap_or_default())
    }

    /// Upsert the provided fields only.
    pub async fn update(&self, group: GroupId, patch: ConfigPatch) -> Result<(), StoreError> {
        self.store.patch_config(group, patch).await
    }

    pub async fn is_whitelisted(&self, group: GroupId, user: UserId) -> Result<bool, StoreError> {
        self.store.whitelist_contains(group, user).await
    }

    /// Idempotent: adding an already-whitelisted user is a no-op.
    pub async fn add_whitelist(&self, group: GroupId, user: UserId) -> Result<(), StoreError> {
        self.store.insert_whitelist(group, user).await
    }

    /// Idempotent: removing a non-member is a no-op.
    pub async fn remove_whitelist(&self, group: GroupId, user: UserId) -> Result<(), StoreError> {
        self.store.delete_whitelist(group, user).await
    }

    /// Whitelisted users in insertion order, for display.
    pub async fn list_whitelist(&self, group: GroupId) -> Result<Vec<UserId>, StoreError> {
        self.store.whitelist_members(group).await
    }
}
