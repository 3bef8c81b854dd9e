//! In-memory registry storage (for testing and ephemeral nodes).

use crate::{AppendOutcome, Grant, RegistryStore, Result};
use async_trait::async_trait;
use drive_types::{Address, ContentRef};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryRegistryStore {
    inner: Arc<MemoryRegistryStoreInner>,
}

#[derive(Default)]
struct MemoryRegistryStoreInner {
    /// Owner -> references in publication order
    content: RwLock<HashMap<Address, Vec<ContentRef>>>,

    /// Ordered (grantor, grantee) pairs
    grants: RwLock<BTreeSet<(Address, Address)>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    fn append_content(
        &self,
        owner: &Address,
        content: &ContentRef,
        max_entries: Option<u64>,
    ) -> Result<AppendOutcome> {
        let mut map = self.inner.content.write();
        let held = map.get(owner).map(|list| list.len() as u64).unwrap_or(0);
        if let Some(limit) = max_entries {
            if held >= limit {
                return Ok(AppendOutcome::QuotaReached { limit });
            }
        }

        let list = map.entry(*owner).or_default();
        list.push(content.clone());
        Ok(AppendOutcome::Appended {
            index: held,
            entries: list.len() as u64,
        })
    }

    fn content_count(&self, owner: &Address) -> Result<u64> {
        Ok(self
            .inner
            .content
            .read()
            .get(owner)
            .map(|list| list.len() as u64)
            .unwrap_or(0))
    }

    fn list_content(&self, owner: &Address) -> Result<Vec<ContentRef>> {
        Ok(self
            .inner
            .content
            .read()
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    fn insert_grant(&self, grant: &Grant) -> Result<bool> {
        Ok(self.inner.grants.write().insert((grant.grantor, grant.grantee)))
    }

    fn has_grant(&self, grantor: &Address, grantee: &Address) -> Result<bool> {
        Ok(self.inner.grants.read().contains(&(*grantor, *grantee)))
    }

    fn list_grantees(&self, grantor: &Address) -> Result<Vec<Address>> {
        let lower = (*grantor, Address::from_bytes([0u8; 32]));
        Ok(self
            .inner
            .grants
            .read()
            .range(lower..)
            .take_while(|(from, _)| from == grantor)
            .map(|(_, to)| *to)
            .collect())
    }

    fn owner_count(&self) -> Result<u64> {
        Ok(self.inner.content.read().len() as u64)
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
