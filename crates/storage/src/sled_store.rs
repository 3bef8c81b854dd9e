//! Sled-backed registry storage.

use crate::{AppendOutcome, Grant, RegistryStore, Result, StorageError};
use async_trait::async_trait;
use drive_types::{Address, ContentRef, ADDRESS_BYTES};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Db, IVec, Transactional, Tree};
use std::path::Path;

const CONTENT_TREE: &str = "content";
const OWNER_HEADS_TREE: &str = "owner_heads";
const GRANTS_TREE: &str = "grants";
const GRANT_MARKER: &[u8] = &[1];

/// Sled-backed implementation
///
/// * `content`: `owner ‖ index_be` → UTF-8 reference
/// * `owner_heads`: `owner` → entry count (`u64` big-endian)
/// * `grants`: `grantor ‖ grantee` → marker
pub struct SledRegistryStore {
    db: Db,
    content: Tree,
    owner_heads: Tree,
    grants: Tree,
}

impl SledRegistryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Throwaway database removed on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let content = db.open_tree(CONTENT_TREE)?;
        let owner_heads = db.open_tree(OWNER_HEADS_TREE)?;
        let grants = db.open_tree(GRANTS_TREE)?;
        tracing::debug!(
            owners = owner_heads.len(),
            grants = grants.len(),
            "opened registry store"
        );
        Ok(Self {
            db,
            content,
            owner_heads,
            grants,
        })
    }
}

fn entry_key(owner: &Address, index: u64) -> [u8; ADDRESS_BYTES + 8] {
    let mut key = [0u8; ADDRESS_BYTES + 8];
    key[..ADDRESS_BYTES].copy_from_slice(owner.as_bytes());
    key[ADDRESS_BYTES..].copy_from_slice(&index.to_be_bytes());
    key
}

fn grant_key(grantor: &Address, grantee: &Address) -> [u8; ADDRESS_BYTES * 2] {
    let mut key = [0u8; ADDRESS_BYTES * 2];
    key[..ADDRESS_BYTES].copy_from_slice(grantor.as_bytes());
    key[ADDRESS_BYTES..].copy_from_slice(grantee.as_bytes());
    key
}

fn decode_count(raw: &IVec) -> Result<u64> {
    let bytes: [u8; 8] = raw
        .as_ref()
        .try_into()
        .map_err(|_| StorageError::Corrupted(format!("owner head is {} bytes", raw.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_content(raw: &IVec) -> Result<ContentRef> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| StorageError::Corrupted(format!("content is not utf-8: {e}")))?;
    // The length bound applied at publish time, not here.
    ContentRef::with_limit(text, usize::MAX)
        .map_err(|e| StorageError::Corrupted(format!("content reference: {e}")))
}

#[async_trait]
impl RegistryStore for SledRegistryStore {
    fn append_content(
        &self,
        owner: &Address,
        content: &ContentRef,
        max_entries: Option<u64>,
    ) -> Result<AppendOutcome> {
        let outcome = (&self.content, &self.owner_heads)
            .transaction(
                |(content_tree, heads)| -> ConflictableTransactionResult<AppendOutcome, StorageError> {
                    let count = match heads.get(owner.as_bytes())? {
                        Some(raw) => decode_count(&raw).map_err(ConflictableTransactionError::Abort)?,
                        None => 0,
                    };

                    if let Some(limit) = max_entries {
                        if count >= limit {
                            return Ok(AppendOutcome::QuotaReached { limit });
                        }
                    }

                    let key = entry_key(owner, count);
                    content_tree.insert(&key[..], content.as_str().as_bytes())?;
                    let next = count + 1;
                    heads.insert(&owner.as_bytes()[..], &next.to_be_bytes()[..])?;

                    Ok(AppendOutcome::Appended {
                        index: count,
                        entries: next,
                    })
                },
            )
            .map_err(|err| match err {
                TransactionError::Abort(inner) => inner,
                TransactionError::Storage(inner) => StorageError::Database(inner),
            })?;
        Ok(outcome)
    }

    fn content_count(&self, owner: &Address) -> Result<u64> {
        match self.owner_heads.get(owner.as_bytes())? {
            Some(raw) => decode_count(&raw),
            None => Ok(0),
        }
    }

    fn list_content(&self, owner: &Address) -> Result<Vec<ContentRef>> {
        let count = self.content_count(owner)?;
        let mut entries = Vec::with_capacity(count as usize);
        // Rows past the head belong to an append that is still committing.
        for item in self.content.scan_prefix(owner.as_bytes()).take(count as usize) {
            let (_, raw) = item?;
            entries.push(decode_content(&raw)?);
        }
        Ok(entries)
    }

    fn insert_grant(&self, grant: &Grant) -> Result<bool> {
        let key = grant_key(&grant.grantor, &grant.grantee);
        let previous = self.grants.insert(&key[..], GRANT_MARKER)?;
        Ok(previous.is_none())
    }

    fn has_grant(&self, grantor: &Address, grantee: &Address) -> Result<bool> {
        let key = grant_key(grantor, grantee);
        Ok(self.grants.contains_key(&key[..])?)
    }

    fn list_grantees(&self, grantor: &Address) -> Result<Vec<Address>> {
        let mut grantees = Vec::new();
        for item in self.grants.scan_prefix(grantor.as_bytes()) {
            let (key, _) = item?;
            let bytes: [u8; ADDRESS_BYTES] = key[ADDRESS_BYTES..]
                .try_into()
                .map_err(|_| StorageError::Corrupted(format!("grant key is {} bytes", key.len())))?;
            grantees.push(Address::from_bytes(bytes));
        }
        Ok(grantees)
    }

    fn owner_count(&self) -> Result<u64> {
        Ok(self.owner_heads.len() as u64)
    }

    async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(value: &str) -> ContentRef {
        ContentRef::new(value).unwrap()
    }

    #[test]
    fn entry_keys_sort_by_owner_then_index() {
        let owner = Address::from_bytes([1u8; 32]);
        let low = entry_key(&owner, 2);
        let high = entry_key(&owner, 256);
        assert!(low < high);
        assert_eq!(&low[..32], owner.as_bytes());
    }

    #[test]
    fn append_assigns_sequential_indices() {
        let store = SledRegistryStore::temporary().unwrap();
        let owner = Address::from_bytes([7u8; 32]);

        for expected in 0..3u64 {
            let outcome = store
                .append_content(&owner, &content("storage://same"), None)
                .unwrap();
            assert_eq!(
                outcome,
                AppendOutcome::Appended {
                    index: expected,
                    entries: expected + 1
                }
            );
        }
        assert_eq!(store.list_content(&owner).unwrap().len(), 3);
    }

    #[test]
    fn neighbouring_owner_prefixes_do_not_mix() {
        let store = SledRegistryStore::temporary().unwrap();
        let mut a = [0u8; 32];
        a[31] = 1;
        let mut b = a;
        b[31] = 2;
        let (a, b) = (Address::from_bytes(a), Address::from_bytes(b));

        store.append_content(&a, &content("storage://a"), None).unwrap();
        store.append_content(&b, &content("storage://b"), None).unwrap();

        assert_eq!(store.list_content(&a).unwrap(), vec![content("storage://a")]);
        assert_eq!(store.list_content(&b).unwrap(), vec![content("storage://b")]);
    }

    #[test]
    fn corrupted_head_is_reported() {
        let store = SledRegistryStore::temporary().unwrap();
        let owner = Address::from_bytes([3u8; 32]);
        store
            .owner_heads
            .insert(&owner.as_bytes()[..], &[1u8, 2, 3][..])
            .unwrap();

        let err = store.content_count(&owner).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
        let err = store
            .append_content(&owner, &content("storage://x"), None)
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
    }
}
