//! Gallery adapter: turns user actions into pinning and registry calls, and
//! registry outcomes into what a viewer should be shown.

use crate::pinning::{ContentPinner, UploadFile};
use drive_registry::{GrantReceipt, PublishReceipt, RegistryClient, RegistryError};
use drive_types::Address;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("pinning service error (status {status}): {message}")]
    Pinning { status: u16, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Map an `ipfs://<cid>` reference onto an HTTP gateway. Any other
/// reference is returned unchanged.
pub fn resolve_to_gateway(reference: &str, gateway: &str) -> String {
    match reference.strip_prefix("ipfs://") {
        Some(cid) => format!("{}/ipfs/{}", gateway.trim_end_matches('/'), cid),
        None => reference.to_string(),
    }
}

fn is_image(mime_type: &str) -> bool {
    let mime = mime_type.trim().to_ascii_lowercase();
    mime.strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

/// What a viewer sees for a gallery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryView {
    Images { owner: Address, uris: Vec<String> },
    Empty { owner: Address },
    NoAccess { owner: Address },
    /// The registry could not be reached; the same request may succeed later.
    Retry { reason: String },
}

impl GalleryView {
    pub fn status_message(&self) -> String {
        match self {
            GalleryView::Images { owner, uris } => {
                let plural = if uris.len() > 1 { "s" } else { "" };
                format!("Showing {} image{plural} for {}", uris.len(), owner.short())
            }
            GalleryView::Empty { .. } => "No images found for this address yet.".to_string(),
            GalleryView::NoAccess { .. } => {
                "You don't have access to view this gallery.".to_string()
            }
            GalleryView::Retry { reason } => {
                format!("The registry is unavailable right now, please try again. ({reason})")
            }
        }
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub content: String,
    pub receipt: PublishReceipt,
}

pub struct GalleryAdapter {
    client: Arc<dyn RegistryClient>,
    pinner: Option<Arc<dyn ContentPinner>>,
    gateway: String,
}

impl GalleryAdapter {
    pub fn new(client: Arc<dyn RegistryClient>, pinner: Arc<dyn ContentPinner>) -> Self {
        Self {
            client,
            pinner: Some(pinner),
            gateway: DEFAULT_GATEWAY_URL.to_string(),
        }
    }

    /// Adapter that can view and share galleries but not upload.
    pub fn read_only(client: Arc<dyn RegistryClient>) -> Self {
        Self {
            client,
            pinner: None,
            gateway: DEFAULT_GATEWAY_URL.to_string(),
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into();
        self
    }

    fn caller(&self) -> Result<Address, AdapterError> {
        self.client
            .caller()
            .ok_or(AdapterError::Registry(RegistryError::AuthenticationMissing))
    }

    /// Pin an image and publish its reference under the caller's address.
    ///
    /// Nothing is pinned without a connected identity, and nothing is
    /// published unless pinning produced a reference.
    pub async fn upload(&self, file: UploadFile) -> Result<UploadOutcome, AdapterError> {
        let owner = self.caller()?;
        if !is_image(&file.mime_type) {
            return Err(AdapterError::InvalidInput(format!(
                "only images can be uploaded, got `{}`",
                file.mime_type
            )));
        }
        if file.bytes.is_empty() {
            return Err(AdapterError::InvalidInput(format!("`{}` is empty", file.name)));
        }

        let Some(pinner) = &self.pinner else {
            return Err(AdapterError::InvalidInput(
                "no pinning service configured".into(),
            ));
        };
        let content = pinner.pin(&file).await?;
        if content.trim().is_empty() {
            return Err(AdapterError::InvalidInput(
                "upload produced no content reference".into(),
            ));
        }

        let receipt = self.client.publish(&content).await?;
        info!(%owner, %content, index = receipt.index, "uploaded image");
        Ok(UploadOutcome { content, receipt })
    }

    /// Let `grantee` view the caller's gallery.
    pub async fn share(&self, grantee: &str) -> Result<GrantReceipt, AdapterError> {
        self.caller()?;
        let grantee: Address = grantee
            .parse()
            .map_err(|err| AdapterError::InvalidInput(format!("address: {err}")))?;
        Ok(self.client.grant_access(&grantee).await?)
    }

    /// Addresses the caller has shared the gallery with.
    pub async fn shared_with(&self) -> Result<Vec<Address>, AdapterError> {
        self.caller()?;
        Ok(self.client.grantees().await?)
    }

    /// Load a gallery. Without a target, the caller's own gallery is shown.
    pub async fn view(&self, target: Option<&str>) -> Result<GalleryView, AdapterError> {
        let caller = self.caller()?;
        let owner = match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(raw) => raw
                .parse::<Address>()
                .map_err(|err| AdapterError::InvalidInput(format!("address: {err}")))?,
            None => caller,
        };

        match self.client.list(&owner).await {
            Ok(entries) if entries.is_empty() => Ok(GalleryView::Empty { owner }),
            Ok(entries) => Ok(GalleryView::Images {
                owner,
                uris: entries
                    .iter()
                    .map(|entry| resolve_to_gateway(entry.as_str(), &self.gateway))
                    .collect(),
            }),
            Err(RegistryError::PermissionDenied { .. }) => Ok(GalleryView::NoAccess { owner }),
            Err(err) if err.is_retryable() => {
                warn!(%owner, "gallery load failed: {err}");
                Ok(GalleryView::Retry {
                    reason: err.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinning::MemoryPinner;
    use async_trait::async_trait;
    use drive_registry::{ContentRegistry, LocalRegistryClient, RegistryConfig};
    use drive_types::{ContentRef, VerifiedCaller};

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 32])
    }

    fn adapter_for(
        registry: &Arc<ContentRegistry>,
        who: Address,
        pinner: &MemoryPinner,
    ) -> GalleryAdapter {
        let client = LocalRegistryClient::new(registry.clone(), VerifiedCaller::from_transport(who));
        GalleryAdapter::new(Arc::new(client), Arc::new(pinner.clone()))
    }

    fn png(bytes: &[u8]) -> UploadFile {
        UploadFile::new("cat.png", "image/png", bytes.to_vec())
    }

    #[test]
    fn gateway_resolution() {
        assert_eq!(
            resolve_to_gateway("ipfs://QmHash", "https://gateway.pinata.cloud/"),
            "https://gateway.pinata.cloud/ipfs/QmHash"
        );
        assert_eq!(
            resolve_to_gateway("storage://abc", DEFAULT_GATEWAY_URL),
            "storage://abc"
        );
        assert_eq!(resolve_to_gateway("", DEFAULT_GATEWAY_URL), "");
    }

    #[test]
    fn image_mime_detection() {
        assert!(is_image("image/png"));
        assert!(is_image(" Image/JPEG "));
        assert!(!is_image("image/"));
        assert!(!is_image("application/pdf"));
        assert!(!is_image(""));
    }

    #[test]
    fn status_messages() {
        let owner = Address::from_bytes([0x12; 32]);
        let view = GalleryView::Images {
            owner,
            uris: vec!["a".into(), "b".into()],
        };
        assert_eq!(view.status_message(), "Showing 2 images for 0x1212...1212");
        let single = GalleryView::Images {
            owner,
            uris: vec!["a".into()],
        };
        assert_eq!(single.status_message(), "Showing 1 image for 0x1212...1212");
        assert_eq!(
            GalleryView::NoAccess { owner }.status_message(),
            "You don't have access to view this gallery."
        );
        assert_eq!(
            GalleryView::Empty { owner }.status_message(),
            "No images found for this address yet."
        );
    }

    #[tokio::test]
    async fn upload_share_and_view() {
        let registry = Arc::new(ContentRegistry::in_memory(RegistryConfig::default()));
        let pinner = MemoryPinner::new();
        let owner = adapter_for(&registry, addr(0xAA), &pinner);
        let viewer = adapter_for(&registry, addr(0xBB), &pinner);

        let outcome = owner.upload(png(b"pixels")).await.unwrap();
        assert_eq!(outcome.receipt.index, 0);
        assert!(pinner.get(&outcome.content).is_some());

        let denied = viewer.view(Some(&addr(0xAA).to_string())).await.unwrap();
        assert_eq!(denied, GalleryView::NoAccess { owner: addr(0xAA) });

        owner.share(&addr(0xBB).to_string()).await.unwrap();
        let shown = viewer.view(Some(&addr(0xAA).to_string())).await.unwrap();
        assert_eq!(
            shown,
            GalleryView::Images {
                owner: addr(0xAA),
                uris: vec![outcome.content.clone()],
            }
        );
        assert_eq!(owner.shared_with().await.unwrap(), vec![addr(0xBB)]);
    }

    #[tokio::test]
    async fn view_defaults_to_own_gallery() {
        let registry = Arc::new(ContentRegistry::in_memory(RegistryConfig::default()));
        let pinner = MemoryPinner::new();
        let me = adapter_for(&registry, addr(1), &pinner);

        assert_eq!(me.view(None).await.unwrap(), GalleryView::Empty { owner: addr(1) });
        assert_eq!(me.view(Some("  ")).await.unwrap(), GalleryView::Empty { owner: addr(1) });
    }

    #[tokio::test]
    async fn rejected_uploads_reach_neither_pinner_nor_registry() {
        let registry = Arc::new(ContentRegistry::in_memory(RegistryConfig::default()));
        let pinner = MemoryPinner::new();
        let me = adapter_for(&registry, addr(1), &pinner);

        let pdf = UploadFile::new("doc.pdf", "application/pdf", b"%PDF".to_vec());
        assert!(matches!(me.upload(pdf).await, Err(AdapterError::InvalidInput(_))));
        assert!(matches!(me.upload(png(b"")).await, Err(AdapterError::InvalidInput(_))));

        assert!(pinner.is_empty());
        assert_eq!(registry.stats().unwrap().owners, 0);
    }

    #[tokio::test]
    async fn disconnected_adapter_does_nothing() {
        let registry = Arc::new(ContentRegistry::in_memory(RegistryConfig::default()));
        let pinner = MemoryPinner::new();
        let client = LocalRegistryClient::disconnected(registry);
        let adapter = GalleryAdapter::new(Arc::new(client), Arc::new(pinner.clone()));

        let err = adapter.upload(png(b"pixels")).await.unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Registry(RegistryError::AuthenticationMissing)
        ));
        assert!(pinner.is_empty());
        assert!(adapter.view(None).await.is_err());
    }

    #[tokio::test]
    async fn read_only_adapter_cannot_upload() {
        let registry = Arc::new(ContentRegistry::in_memory(RegistryConfig::default()));
        let client = LocalRegistryClient::new(registry, VerifiedCaller::from_transport(addr(1)));
        let adapter = GalleryAdapter::read_only(Arc::new(client));

        assert!(matches!(
            adapter.upload(png(b"pixels")).await,
            Err(AdapterError::InvalidInput(_))
        ));
        assert_eq!(adapter.view(None).await.unwrap(), GalleryView::Empty { owner: addr(1) });
    }

    #[tokio::test]
    async fn invalid_target_address() {
        let registry = Arc::new(ContentRegistry::in_memory(RegistryConfig::default()));
        let me = adapter_for(&registry, addr(1), &MemoryPinner::new());
        assert!(matches!(
            me.view(Some("0xnope")).await,
            Err(AdapterError::InvalidInput(_))
        ));
        assert!(matches!(
            me.share("0x12").await,
            Err(AdapterError::InvalidInput(_))
        ));
    }

    struct Blank;

    #[async_trait]
    impl ContentPinner for Blank {
        async fn pin(&self, _file: &UploadFile) -> Result<String, AdapterError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn empty_reference_aborts_before_publish() {
        let registry = Arc::new(ContentRegistry::in_memory(RegistryConfig::default()));
        let client =
            LocalRegistryClient::new(registry.clone(), VerifiedCaller::from_transport(addr(1)));
        let adapter = GalleryAdapter::new(Arc::new(client), Arc::new(Blank));

        assert!(matches!(
            adapter.upload(png(b"pixels")).await,
            Err(AdapterError::InvalidInput(_))
        ));
        assert_eq!(registry.stats().unwrap().owners, 0);
    }

    struct Offline;

    #[async_trait]
    impl RegistryClient for Offline {
        fn caller(&self) -> Option<Address> {
            Some(addr(1))
        }
        async fn publish(&self, _: &str) -> drive_registry::Result<PublishReceipt> {
            Err(RegistryError::Unavailable("offline".into()))
        }
        async fn grant_access(&self, _: &Address) -> drive_registry::Result<GrantReceipt> {
            Err(RegistryError::Unavailable("offline".into()))
        }
        async fn list(&self, _: &Address) -> drive_registry::Result<Vec<ContentRef>> {
            Err(RegistryError::Unavailable("offline".into()))
        }
        async fn grantees(&self) -> drive_registry::Result<Vec<Address>> {
            Err(RegistryError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn unavailable_registry_offers_retry() {
        let adapter = GalleryAdapter::new(Arc::new(Offline), Arc::new(MemoryPinner::new()));
        let view = adapter.view(None).await.unwrap();
        assert!(matches!(view, GalleryView::Retry { .. }));
        assert!(view.status_message().contains("try again"));
    }
}
