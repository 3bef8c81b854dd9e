use drive_registry::RegistryError;
use drive_types::CallError;
use thiserror::Error;

/// Errors that can occur when communicating with a Drive node.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error (status {status}, code {code}): {message}")]
    ServerError {
        status: u16,
        code: String,
        message: String,
        limit: Option<u64>,
    },
    #[error("failed to sign call: {0}")]
    Call(#[from] CallError),
    #[error("parse error: {0}")]
    Parse(String),
}

impl SdkError {
    pub(crate) fn parse_error(msg: impl Into<String>) -> Self {
        SdkError::Parse(msg.into())
    }

    pub(crate) fn server_error(
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
        limit: Option<u64>,
    ) -> Self {
        SdkError::ServerError {
            status,
            code: code.into(),
            message: message.into(),
            limit,
        }
    }
}

/// Translate a failed remote call back into the registry's error kinds.
///
/// `denied` supplies the addresses for a `permission_denied` answer and
/// `quota_owner` the owner for `quota_exceeded`; neither is carried on the
/// wire.
pub(crate) fn into_registry_error(
    err: SdkError,
    denied: impl FnOnce() -> RegistryError,
    quota_owner: drive_types::Address,
) -> RegistryError {
    match err {
        SdkError::ServerError {
            status,
            code,
            message,
            limit,
        } => match code.as_str() {
            "permission_denied" => denied(),
            "invalid_input" => RegistryError::InvalidInput(message),
            "quota_exceeded" => RegistryError::QuotaExceeded {
                owner: quota_owner,
                limit: limit.unwrap_or_default(),
            },
            "unavailable" => RegistryError::Unavailable(message),
            "corrupted_state" => RegistryError::Corrupted(message),
            "authentication_missing" | "invalid_signature" | "stale_request"
            | "replayed_request" => {
                tracing::warn!(code = %code, "node rejected call credentials: {message}");
                RegistryError::AuthenticationMissing
            }
            _ if status >= 500 => RegistryError::Unavailable(message),
            _ => RegistryError::InvalidInput(message),
        },
        SdkError::Call(err) => RegistryError::InvalidInput(err.to_string()),
        other => RegistryError::Unavailable(other.to_string()),
    }
}
