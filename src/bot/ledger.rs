// src/bot/ledger.rs - Per (group, user) warning counters

use std::sync::Arc;

use crate::storage::{Storage, StoreError};
use crate::types::{GroupId, UserId};

/// Sole owner of the warning counters.
///
/// The counter is created on the first violation (count = 1), removed on
/// reset, and never goes negative. Increment and reset for the same key
/// are linearizable through the storage backend.
pub struct ViolationLedger {
    store: Arc<dyn Storage>,
}

impl ViolationLedger {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Atomically increment and return the post-increment count. An
    /// error means the increment did not happen.
    pub async fn increment(&self, group: GroupId, user: UserId) -> Result<i64, StoreError> {
        self.store.increment_warnings(group, user).await
    }

    /// Clear the counter. Idempotent.
    pub async fn reset(&self, group: GroupId, user: UserId) -> Result<(), StoreError> {
        self.store.clear_warnings(group, user).await
    }
}
