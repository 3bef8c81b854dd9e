//! Content-addressed storage adapters.
//!
//! A pinner turns raw file bytes into a content reference. Uploading is the
//! caller's concern; the registry only ever sees the finished reference.

use crate::adapter::AdapterError;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const PINATA_API_URL: &str = "https://api.pinata.cloud/";

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

#[async_trait]
pub trait ContentPinner: Send + Sync {
    /// Store `file` and return the reference it can be fetched by.
    async fn pin(&self, file: &UploadFile) -> Result<String, AdapterError>;
}

/// Pins files to IPFS through the Pinata pinning API.
#[derive(Clone)]
pub struct PinataPinner {
    endpoint: Url,
    api_key: String,
    secret_api_key: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

impl PinataPinner {
    pub fn new(
        api_key: impl Into<String>,
        secret_api_key: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        Self::with_endpoint(PINATA_API_URL, api_key, secret_api_key)
    }

    /// Point at a different Pinata-compatible API root.
    pub fn with_endpoint(
        endpoint: impl AsRef<str>,
        api_key: impl Into<String>,
        secret_api_key: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let mut endpoint = Url::parse(endpoint.as_ref())
            .map_err(|err| AdapterError::InvalidInput(format!("pinning endpoint: {err}")))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            secret_api_key: secret_api_key.into(),
            http,
        })
    }
}

#[async_trait]
impl ContentPinner for PinataPinner {
    async fn pin(&self, file: &UploadFile) -> Result<String, AdapterError> {
        let url = self
            .endpoint
            .join("pinning/pinFileToIPFS")
            .map_err(|err| AdapterError::InvalidInput(format!("pinning endpoint: {err}")))?;
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let form = Form::new().part("file", part);

        debug!(name = %file.name, size = file.bytes.len(), "pinning file");
        let response = self
            .http
            .post(url)
            .header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.secret_api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AdapterError::Pinning {
                status: status.as_u16(),
                message,
            });
        }

        let body: PinFileResponse = response.json().await?;
        match body.ipfs_hash.filter(|hash| !hash.trim().is_empty()) {
            Some(cid) => {
                info!(%cid, name = %file.name, "pinned file");
                Ok(format!("ipfs://{cid}"))
            }
            None => Err(AdapterError::InvalidInput(
                "pinning service returned no content hash".into(),
            )),
        }
    }
}

impl std::fmt::Debug for PinataPinner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataPinner")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

/// Keeps pinned bytes in process memory, addressed by their BLAKE3 hash.
#[derive(Clone, Default)]
pub struct MemoryPinner {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryPinner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes previously pinned under `reference`.
    pub fn get(&self, reference: &str) -> Option<Vec<u8>> {
        self.objects.read().get(reference).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ContentPinner for MemoryPinner {
    async fn pin(&self, file: &UploadFile) -> Result<String, AdapterError> {
        let reference = format!("storage://{}", blake3::hash(&file.bytes).to_hex());
        self.objects
            .write()
            .entry(reference.clone())
            .or_insert_with(|| file.bytes.clone());
        Ok(reference)
    }
}
