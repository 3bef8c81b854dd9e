//! Persistence for the Drive content registry.
//!
//! Two logical tables back the registry:
//!
//! * `(owner, index) -> content reference`, append-only per owner
//! * `(grantor, grantee) -> present`, insert-only
//!
//! [`SledRegistryStore`] keeps them in sled trees, [`MemoryRegistryStore`] in
//! process memory for tests and ephemeral nodes. Every mutating method is
//! atomic on its own; callers that need an authorization check and a read to
//! be atomic together serialize around the store.

use async_trait::async_trait;
use drive_types::{Address, ContentRef};

pub mod memory;
pub mod sled_store;

pub use memory::MemoryRegistryStore;
pub use sled_store::SledRegistryStore;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A single (grantor, grantee) pair of the access relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grant {
    pub grantor: Address,
    pub grantee: Address,
}

/// Result of an append attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The reference was stored at `index`; the owner now holds `entries`.
    Appended { index: u64, entries: u64 },
    /// The owner already holds `limit` entries; nothing was written.
    QuotaReached { limit: u64 },
}

/// Abstract registry storage.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Append `content` to the owner's sequence, unless the owner already
    /// holds `max_entries` references. Creates the owner record on first use.
    fn append_content(
        &self,
        owner: &Address,
        content: &ContentRef,
        max_entries: Option<u64>,
    ) -> Result<AppendOutcome>;

    /// Number of references the owner has published.
    fn content_count(&self, owner: &Address) -> Result<u64>;

    /// The owner's references in publication order.
    fn list_content(&self, owner: &Address) -> Result<Vec<ContentRef>>;

    /// Insert a grant. Returns `true` if the pair was not present before.
    fn insert_grant(&self, grant: &Grant) -> Result<bool>;

    fn has_grant(&self, grantor: &Address, grantee: &Address) -> Result<bool>;

    /// Addresses the grantor has granted access to, in address order.
    fn list_grantees(&self, grantor: &Address) -> Result<Vec<Address>>;

    /// Number of owners that have published at least once.
    fn owner_count(&self) -> Result<u64>;

    /// Resolve once every write applied so far is durable.
    async fn flush(&self) -> Result<()>;
}
