//! Types for the content registry

use crate::errors::{RegistryError, Result};
use drive_storage::RegistryStore;
use drive_types::{Address, DEFAULT_MAX_CONTENT_REF_LEN};
use std::sync::Arc;

/// Registry limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum references a single owner may publish. `None` = unbounded.
    pub max_entries_per_owner: Option<u64>,
    /// Maximum byte length of a content reference.
    pub max_content_ref_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_entries_per_owner: None,
            max_content_ref_len: DEFAULT_MAX_CONTENT_REF_LEN,
        }
    }
}

/// Outcome of an applied publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    pub owner: Address,
    /// Position of the new reference in the owner's sequence.
    pub index: u64,
    /// References the owner holds after this publish.
    pub entries: u64,
}

/// Outcome of an applied grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantReceipt {
    pub grantor: Address,
    pub grantee: Address,
    /// `false` when the pair already existed or was a self-grant.
    pub inserted: bool,
}

/// A write that has been applied and is visible to readers but may not yet
/// be durable.
///
/// Await [`PendingWrite::confirmed`] before relying on the write surviving a
/// restart. Dropping it abandons the wait, not the write.
#[must_use = "await `confirmed()` for durability or call `into_receipt()`"]
pub struct PendingWrite<R> {
    receipt: R,
    store: Arc<dyn RegistryStore>,
}

impl<R> PendingWrite<R> {
    pub(crate) fn new(receipt: R, store: Arc<dyn RegistryStore>) -> Self {
        Self { receipt, store }
    }

    pub fn receipt(&self) -> &R {
        &self.receipt
    }

    /// Skip the durability wait.
    pub fn into_receipt(self) -> R {
        self.receipt
    }

    /// Resolve once the write is durable.
    pub async fn confirmed(self) -> Result<R> {
        self.store
            .flush()
            .await
            .map_err(|err| RegistryError::Unavailable(format!("confirmation failed: {err}")))?;
        Ok(self.receipt)
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for PendingWrite<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrite")
            .field("receipt", &self.receipt)
            .finish_non_exhaustive()
    }
}

/// Aggregate figures for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub owners: u64,
}
