//! Content registry implementation
//!
//! Guards a [`RegistryStore`] with the read-permission policy: an address
//! may list its own references, or those of any owner that granted it
//! access. Writes are permissionless but only ever touch the caller's own
//! record.

use crate::errors::*;
use crate::types::*;
use drive_storage::{AppendOutcome, Grant, MemoryRegistryStore, RegistryStore};
use drive_types::{Address, ContentRef, VerifiedCaller};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Content registry
///
/// Shared as `Arc<ContentRegistry>` between transport handlers.
pub struct ContentRegistry {
    store: Arc<dyn RegistryStore>,
    config: RegistryConfig,
    /// Writers take it exclusively; `list` holds it shared across the
    /// permission check and the read.
    gate: RwLock<()>,
}

impl ContentRegistry {
    pub fn new(store: Arc<dyn RegistryStore>, config: RegistryConfig) -> Self {
        Self {
            store,
            config,
            gate: RwLock::new(()),
        }
    }

    /// Registry over a fresh in-memory store.
    pub fn in_memory(config: RegistryConfig) -> Self {
        Self::new(Arc::new(MemoryRegistryStore::new()), config)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Append `content` to the caller's own sequence.
    pub fn publish(
        &self,
        caller: &VerifiedCaller,
        content: &str,
    ) -> Result<PendingWrite<PublishReceipt>> {
        let owner = caller.address();
        let content = ContentRef::with_limit(content, self.config.max_content_ref_len)?;

        let outcome = {
            let _guard = self.gate.write();
            self.store
                .append_content(&owner, &content, self.config.max_entries_per_owner)
                .inspect_err(|err| warn!(%owner, "publish failed in storage: {err}"))?
        };

        match outcome {
            AppendOutcome::Appended { index, entries } => {
                metrics::counter!("drive_registry_publish_total").increment(1);
                info!(%owner, index, entries, "published content reference");
                Ok(PendingWrite::new(
                    PublishReceipt {
                        owner,
                        index,
                        entries,
                    },
                    Arc::clone(&self.store),
                ))
            }
            AppendOutcome::QuotaReached { limit } => {
                warn!(%owner, limit, "publish rejected: owner quota reached");
                Err(RegistryError::QuotaExceeded { owner, limit })
            }
        }
    }

    /// Allow `grantee` to list the caller's references.
    ///
    /// Granting to oneself stores nothing: self-access is implicit.
    pub fn grant_access(
        &self,
        caller: &VerifiedCaller,
        grantee: &Address,
    ) -> Result<PendingWrite<GrantReceipt>> {
        let grantor = caller.address();

        let inserted = if *grantee == grantor {
            debug!(%grantor, "ignoring self-grant");
            false
        } else {
            let _guard = self.gate.write();
            self.store.insert_grant(&Grant {
                grantor,
                grantee: *grantee,
            })?
        };

        if inserted {
            metrics::counter!("drive_registry_grant_total").increment(1);
            info!(%grantor, %grantee, "granted read access");
        }

        Ok(PendingWrite::new(
            GrantReceipt {
                grantor,
                grantee: *grantee,
                inserted,
            },
            Arc::clone(&self.store),
        ))
    }

    /// The owner's references in publication order, if the caller may read
    /// them. An owner that never published yields an empty list.
    pub fn list(&self, caller: &VerifiedCaller, owner: &Address) -> Result<Vec<ContentRef>> {
        let viewer = caller.address();
        metrics::counter!("drive_registry_list_total").increment(1);

        let _guard = self.gate.read();
        if viewer != *owner && !self.store.has_grant(owner, &viewer)? {
            metrics::counter!("drive_registry_denied_total").increment(1);
            warn!(%owner, %viewer, "list denied");
            return Err(RegistryError::PermissionDenied {
                owner: *owner,
                caller: viewer,
            });
        }

        let entries = self.store.list_content(owner)?;
        debug!(%owner, %viewer, entries = entries.len(), "listed content");
        Ok(entries)
    }

    /// Addresses the caller has granted access to.
    pub fn grantees(&self, caller: &VerifiedCaller) -> Result<Vec<Address>> {
        let _guard = self.gate.read();
        Ok(self.store.list_grantees(&caller.address())?)
    }

    pub fn stats(&self) -> Result<RegistryStats> {
        Ok(RegistryStats {
            owners: self.store.owner_count()?,
        })
    }
}

impl std::fmt::Debug for ContentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(byte: u8) -> VerifiedCaller {
        VerifiedCaller::from_transport(Address::from_bytes([byte; 32]))
    }

    fn refs(values: &[&str]) -> Vec<ContentRef> {
        values.iter().map(|v| ContentRef::new(*v).unwrap()).collect()
    }

    #[test]
    fn test_publish_then_list_own_content() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let owner = caller(0xAA);

        let first = registry.publish(&owner, "storage://hash1").unwrap();
        assert_eq!(first.receipt().index, 0);
        let second = registry.publish(&owner, "storage://hash1").unwrap();
        assert_eq!(second.receipt().index, 1);
        assert_eq!(second.receipt().entries, 2);

        let listed = registry.list(&owner, &owner.address()).unwrap();
        assert_eq!(listed, refs(&["storage://hash1", "storage://hash1"]));
    }

    #[test]
    fn test_list_without_grant_is_denied() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let owner = caller(1);
        let viewer = caller(2);
        let _ = registry.publish(&owner, "ipfs://cid").unwrap();

        let err = registry.list(&viewer, &owner.address()).unwrap_err();
        assert_eq!(
            err,
            RegistryError::PermissionDenied {
                owner: owner.address(),
                caller: viewer.address(),
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_denied_even_when_owner_never_published() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let err = registry
            .list(&caller(2), &caller(1).address())
            .unwrap_err();
        assert!(matches!(err, RegistryError::PermissionDenied { .. }));
    }

    #[test]
    fn test_empty_gallery_is_not_an_error() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let owner = caller(3);
        assert!(registry.list(&owner, &owner.address()).unwrap().is_empty());
    }

    #[test]
    fn test_grant_is_not_symmetric() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let (a, b) = (caller(1), caller(2));
        let _ = registry.publish(&a, "ipfs://a").unwrap();
        let _ = registry.publish(&b, "ipfs://b").unwrap();

        let receipt = registry.grant_access(&a, &b.address()).unwrap().into_receipt();
        assert!(receipt.inserted);

        assert_eq!(registry.list(&b, &a.address()).unwrap(), refs(&["ipfs://a"]));
        assert!(matches!(
            registry.list(&a, &b.address()),
            Err(RegistryError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_grant_is_not_transitive() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let (a, b, c) = (caller(1), caller(2), caller(3));
        let _ = registry.grant_access(&a, &b.address()).unwrap();
        let _ = registry.grant_access(&b, &c.address()).unwrap();

        assert!(registry.list(&b, &a.address()).is_ok());
        assert!(registry.list(&c, &b.address()).is_ok());
        assert!(registry.list(&c, &a.address()).is_err());
    }

    #[test]
    fn test_grant_is_idempotent() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let (a, b) = (caller(1), caller(2));

        let first = registry.grant_access(&a, &b.address()).unwrap().into_receipt();
        let second = registry.grant_access(&a, &b.address()).unwrap().into_receipt();
        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(registry.grantees(&a).unwrap(), vec![b.address()]);
    }

    #[test]
    fn test_self_grant_stores_nothing() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let a = caller(1);
        let receipt = registry.grant_access(&a, &a.address()).unwrap().into_receipt();
        assert!(!receipt.inserted);
        assert!(registry.grantees(&a).unwrap().is_empty());
    }

    #[test]
    fn test_empty_reference_rejected_without_effect() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let owner = caller(1);
        let err = registry.publish(&owner, "   ").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));
        assert_eq!(registry.stats().unwrap().owners, 0);
    }

    #[test]
    fn test_reference_length_bound_from_config() {
        let registry = ContentRegistry::in_memory(RegistryConfig {
            max_content_ref_len: 16,
            ..Default::default()
        });
        let owner = caller(1);
        assert!(registry.publish(&owner, "ipfs://short").is_ok());
        let err = registry
            .publish(&owner, "ipfs://much-too-long-for-this-config")
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));
    }

    #[test]
    fn test_quota_rejects_and_keeps_state() {
        let registry = ContentRegistry::in_memory(RegistryConfig {
            max_entries_per_owner: Some(2),
            ..Default::default()
        });
        let owner = caller(7);
        let _ = registry.publish(&owner, "ipfs://1").unwrap();
        let _ = registry.publish(&owner, "ipfs://2").unwrap();

        let err = registry.publish(&owner, "ipfs://3").unwrap_err();
        assert_eq!(
            err,
            RegistryError::QuotaExceeded {
                owner: owner.address(),
                limit: 2
            }
        );
        assert_eq!(
            registry.list(&owner, &owner.address()).unwrap(),
            refs(&["ipfs://1", "ipfs://2"])
        );

        // Other owners are unaffected.
        assert!(registry.publish(&caller(8), "ipfs://1").is_ok());
    }

    #[tokio::test]
    async fn test_confirmed_write_returns_receipt() {
        let registry = ContentRegistry::in_memory(RegistryConfig::default());
        let owner = caller(1);
        let receipt = registry
            .publish(&owner, "storage://hash1")
            .unwrap()
            .confirmed()
            .await
            .unwrap();
        assert_eq!(receipt.owner, owner.address());
        assert_eq!(receipt.index, 0);
    }
}
