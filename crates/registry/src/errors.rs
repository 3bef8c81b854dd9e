//! Error types for the content registry

use drive_storage::StorageError;
use drive_types::{Address, AddressError, ContentRefError};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Permission denied: {caller} may not list content of {owner}")]
    PermissionDenied { owner: Address, caller: Address },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Quota exceeded: {owner} already holds {limit} entries")]
    QuotaExceeded { owner: Address, limit: u64 },

    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    /// Stored state failed to decode. Retrying reads the same bytes.
    #[error("Registry state corrupted: {0}")]
    Corrupted(String),

    #[error("No authenticated caller identity attached to the call")]
    AuthenticationMissing,
}

impl RegistryError {
    /// Whether the caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Unavailable(_))
    }

    /// Stable machine-readable code, shared by the HTTP transport and SDK.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::PermissionDenied { .. } => "permission_denied",
            RegistryError::InvalidInput(_) => "invalid_input",
            RegistryError::QuotaExceeded { .. } => "quota_exceeded",
            RegistryError::Unavailable(_) => "unavailable",
            RegistryError::Corrupted(_) => "corrupted_state",
            RegistryError::AuthenticationMissing => "authentication_missing",
        }
    }
}

impl From<StorageError> for RegistryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Database(_) => RegistryError::Unavailable(err.to_string()),
            StorageError::Corrupted(detail) => {
                error!("registry store holds a corrupted record: {detail}");
                RegistryError::Corrupted(detail)
            }
        }
    }
}

impl From<ContentRefError> for RegistryError {
    fn from(err: ContentRefError) -> Self {
        RegistryError::InvalidInput(err.to_string())
    }
}

impl From<AddressError> for RegistryError {
    fn from(err: AddressError) -> Self {
        RegistryError::InvalidInput(format!("address: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
