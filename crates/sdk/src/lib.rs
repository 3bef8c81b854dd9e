mod error;

pub mod adapter;
pub mod pinning;

pub use crate::adapter::{
    resolve_to_gateway, AdapterError, GalleryAdapter, GalleryView, UploadOutcome,
    DEFAULT_GATEWAY_URL,
};
pub use crate::error::SdkError;
pub use crate::pinning::{ContentPinner, MemoryPinner, PinataPinner, UploadFile, PINATA_API_URL};

use async_trait::async_trait;
use drive_registry::{GrantReceipt, PublishReceipt, RegistryClient, RegistryError};
use drive_types::{
    unix_millis, Address, CallPayload, ContentRef, ErrorBody, GrantPayload, GrantResponse,
    GranteesPayload, GranteesResponse, ListPayload, ListResponse, PublishPayload,
    PublishResponse, SignedCall,
};
use ed25519_dalek::SigningKey;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::into_registry_error;

/// HTTP client for a Drive node's registry API.
///
/// Every registry call is signed with the configured key. Without a key the
/// client is disconnected and every call fails with
/// [`RegistryError::AuthenticationMissing`] before touching the network.
#[derive(Clone)]
pub struct HttpRegistryClient {
    base_url: Url,
    http: Client,
    key: Option<SigningKey>,
    /// Last timestamp signed by this client and its clones.
    last_timestamp_ms: Arc<Mutex<u64>>,
}

impl HttpRegistryClient {
    /// Create a new client with the provided base URL (e.g. `http://127.0.0.1:8645/`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, SdkError> {
        Self::with_http_client(
            base_url,
            Client::builder().timeout(Duration::from_secs(10)).build()?,
        )
    }

    /// Use an existing reqwest client (useful for custom TLS or middleware).
    pub fn with_http_client(base_url: impl AsRef<str>, http: Client) -> Result<Self, SdkError> {
        let mut url = Url::parse(base_url.as_ref())
            .map_err(|_| SdkError::InvalidBaseUrl(base_url.as_ref().to_string()))?;
        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_owned();
            path.push('/');
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            http,
            key: None,
            last_timestamp_ms: Arc::new(Mutex::new(0)),
        })
    }

    /// Act as the holder of `key` for every subsequent call.
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Signing key and the address it speaks for.
    fn session(&self) -> Result<(&SigningKey, Address), RegistryError> {
        let key = self.key.as_ref().ok_or(RegistryError::AuthenticationMissing)?;
        Ok((key, Address::from(&key.verifying_key())))
    }

    async fn call<P, T>(&self, key: &SigningKey, path: &str, payload: P) -> Result<T, SdkError>
    where
        P: CallPayload,
        T: DeserializeOwned,
    {
        let call = SignedCall::sign(key, payload, self.next_timestamp())?;
        self.post_json(path, &call).await
    }

    /// Strictly increasing per client, so two identical calls made within the
    /// same millisecond still sign different messages.
    fn next_timestamp(&self) -> u64 {
        let mut last = self.last_timestamp_ms.lock();
        *last = unix_millis().max(*last + 1);
        *last
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        B: serde::Serialize,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let response = self.http.post(url).json(body).send().await?;
        Self::map_response(response).await
    }

    async fn map_response<T>(response: Response) -> Result<T, SdkError>
    where
        T: DeserializeOwned,
    {
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|err| SdkError::parse_error(format!("unexpected response body: {err}")))
    }

    async fn map_api_error(response: Response) -> SdkError {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_slice::<ErrorBody>(&bytes) {
            return SdkError::server_error(status, api_error.code, api_error.message, api_error.limit);
        }
        let text = String::from_utf8_lossy(&bytes).to_string();
        SdkError::server_error(status, "http_error", text, None)
    }
}

/// Error mapping for calls where a denial is not a possible answer.
fn unexpected_denial(caller: Address) -> impl FnOnce(SdkError) -> RegistryError {
    move |err| {
        into_registry_error(
            err,
            || RegistryError::InvalidInput("unexpected permission denial".into()),
            caller,
        )
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    fn caller(&self) -> Option<Address> {
        self.key.as_ref().map(|key| Address::from(&key.verifying_key()))
    }

    async fn publish(&self, content: &str) -> Result<PublishReceipt, RegistryError> {
        let (key, caller) = self.session()?;
        let payload = PublishPayload {
            content: content.to_string(),
        };
        let response: PublishResponse = self
            .call(key, "registry/publish", payload)
            .await
            .map_err(unexpected_denial(caller))?;
        Ok(PublishReceipt {
            owner: response.owner,
            index: response.index,
            entries: response.entries,
        })
    }

    async fn grant_access(&self, grantee: &Address) -> Result<GrantReceipt, RegistryError> {
        let (key, caller) = self.session()?;
        let payload = GrantPayload {
            grantee: grantee.to_string(),
        };
        let response: GrantResponse = self
            .call(key, "registry/grant", payload)
            .await
            .map_err(unexpected_denial(caller))?;
        Ok(GrantReceipt {
            grantor: response.grantor,
            grantee: response.grantee,
            inserted: response.inserted,
        })
    }

    async fn list(&self, owner: &Address) -> Result<Vec<ContentRef>, RegistryError> {
        let (key, caller) = self.session()?;
        let payload = ListPayload {
            owner: Some(owner.to_string()),
        };
        let response: ListResponse = self
            .call(key, "registry/list", payload)
            .await
            .map_err(|err| {
                into_registry_error(
                    err,
                    || RegistryError::PermissionDenied {
                        owner: *owner,
                        caller,
                    },
                    caller,
                )
            })?;

        // The node enforced the length bound when each entry was published.
        response
            .entries
            .into_iter()
            .map(|entry| {
                ContentRef::with_limit(entry, usize::MAX).map_err(|err| {
                    RegistryError::Unavailable(format!("node returned a bad entry: {err}"))
                })
            })
            .collect()
    }

    async fn grantees(&self) -> Result<Vec<Address>, RegistryError> {
        let (key, caller) = self.session()?;
        let response: GranteesResponse = self
            .call(key, "registry/grantees", GranteesPayload {})
            .await
            .map_err(unexpected_denial(caller))?;
        Ok(response.grantees)
    }
}

impl std::fmt::Debug for HttpRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRegistryClient")
            .field("base_url", &self.base_url.as_str())
            .field("caller", &self.caller())
            .finish_non_exhaustive()
    }
}
