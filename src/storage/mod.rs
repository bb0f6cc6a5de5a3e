// src/storage/mod.rs - Persistence abstraction for policy, whitelist and warnings

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ConfigPatch, GroupConfig, GroupId, UserId};

pub mod memory;

pub use memory::MemoryStore;

/// Errors surfaced by a storage backend.
///
/// An operation that returns an error must not have taken effect: a
/// warning increment that could not be durably recorded has not happened.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Document-store interface backing the policy store and the violation
/// ledger. Implementations must make `increment_warnings` atomic per
/// (group, user) key and linearizable with respect to `clear_warnings`
/// for the same key.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stored group configuration, `None` when the group was never configured.
    async fn load_config(&self, group: GroupId) -> Result<Option<GroupConfig>, StoreError>;

    /// Upsert only the fields present in the patch. The record is created
    /// from defaults on first write.
    async fn patch_config(&self, group: GroupId, patch: ConfigPatch) -> Result<(), StoreError>;

    /// Atomically increment the warning counter and return the new value.
    async fn increment_warnings(&self, group: GroupId, user: UserId) -> Result<i64, StoreError>;

    /// Delete the warning counter. Idempotent.
    async fn clear_warnings(&self, group: GroupId, user: UserId) -> Result<(), StoreError>;

    /// Add a whitelist entry. Adding an existing entry is a no-op.
    async fn insert_whitelist(&self, group: GroupId, user: UserId) -> Result<(), StoreError>;

    /// Remove a whitelist entry. Removing a non-member is a no-op.
    async fn delete_whitelist(&self, group: GroupId, user: UserId) -> Result<(), StoreError>;

    async fn whitelist_contains(&self, group: GroupId, user: UserId) -> Result<bool, StoreError>;

    /// Whitelisted user ids for a group, in insertion order. Display only;
    /// callers must not rely on the order for correctness.
    async fn whitelist_members(&self, group: GroupId) -> Result<Vec<UserId>, StoreError>;

    /// Distinct group ids the store has seen, for broadcast fan-out.
    async fn known_groups(&self) -> Result<Vec<GroupId>, StoreError>;
}
