//! Client-facing view of the registry.
//!
//! [`RegistryClient`] is what adapters program against: it knows which
//! identity it is acting as and resolves writes only after confirmation.
//! [`LocalRegistryClient`] drives an in-process [`ContentRegistry`]; the SDK
//! provides a remote implementation over HTTP.

use crate::errors::{RegistryError, Result};
use crate::registry::ContentRegistry;
use crate::types::{GrantReceipt, PublishReceipt};
use async_trait::async_trait;
use drive_types::{Address, ContentRef, VerifiedCaller};
use std::sync::Arc;

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Address this client acts as, if a session is established.
    fn caller(&self) -> Option<Address>;

    /// Publish a reference under the caller's address and wait for it to be
    /// confirmed.
    async fn publish(&self, content: &str) -> Result<PublishReceipt>;

    async fn grant_access(&self, grantee: &Address) -> Result<GrantReceipt>;

    async fn list(&self, owner: &Address) -> Result<Vec<ContentRef>>;

    async fn grantees(&self) -> Result<Vec<Address>>;
}

/// In-process client bound to an optional session identity.
#[derive(Clone)]
pub struct LocalRegistryClient {
    registry: Arc<ContentRegistry>,
    session: Option<VerifiedCaller>,
}

impl LocalRegistryClient {
    pub fn new(registry: Arc<ContentRegistry>, session: VerifiedCaller) -> Self {
        Self {
            registry,
            session: Some(session),
        }
    }

    /// Client with no connected identity. Every call fails with
    /// [`RegistryError::AuthenticationMissing`].
    pub fn disconnected(registry: Arc<ContentRegistry>) -> Self {
        Self {
            registry,
            session: None,
        }
    }

    fn session(&self) -> Result<&VerifiedCaller> {
        self.session
            .as_ref()
            .ok_or(RegistryError::AuthenticationMissing)
    }
}

#[async_trait]
impl RegistryClient for LocalRegistryClient {
    fn caller(&self) -> Option<Address> {
        self.session.map(|s| s.address())
    }

    async fn publish(&self, content: &str) -> Result<PublishReceipt> {
        let session = self.session()?;
        self.registry.publish(session, content)?.confirmed().await
    }

    async fn grant_access(&self, grantee: &Address) -> Result<GrantReceipt> {
        let session = self.session()?;
        self.registry.grant_access(session, grantee)?.confirmed().await
    }

    async fn list(&self, owner: &Address) -> Result<Vec<ContentRef>> {
        self.registry.list(self.session()?, owner)
    }

    async fn grantees(&self) -> Result<Vec<Address>> {
        self.registry.grantees(self.session()?)
    }
}

impl std::fmt::Debug for LocalRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRegistryClient")
            .field("caller", &self.caller())
            .finish_non_exhaustive()
    }
}
