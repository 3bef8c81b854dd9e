//! Signed registry calls.
//!
//! Every call that crosses the transport boundary is an ed25519 signature by
//! the caller over `SHA-256(tag || operation || caller || payload_json || timestamp_le)`.
//! The transport verifies the envelope and hands the registry a
//! [`VerifiedCaller`]; the registry itself never looks at signatures.

use crate::address::Address;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Domain separation tag mixed into every signed call.
pub const CALL_DOMAIN_TAG: &[u8] = b"DRIVE_REGISTRY_CALL";

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("failed to encode call payload: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("signature is not 64 bytes of hex")]
    InvalidSignatureEncoding,
    #[error("caller address is not a valid ed25519 public key")]
    InvalidPublicKey,
    #[error("signature does not match caller")]
    SignatureMismatch,
    #[error("call timestamp is {skew_ms} ms away from local time")]
    Stale { skew_ms: u64 },
}

/// A payload that can be carried by a [`SignedCall`].
pub trait CallPayload: Serialize + DeserializeOwned {
    /// Operation name bound into the signature so a payload signed for one
    /// endpoint cannot be replayed against another.
    const OPERATION: &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPayload {
    pub content: String,
}

impl CallPayload for PublishPayload {
    const OPERATION: &'static str = "publish";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantPayload {
    pub grantee: String,
}

impl CallPayload for GrantPayload {
    const OPERATION: &'static str = "grant_access";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPayload {
    /// Owner whose gallery is requested; the caller's own when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl CallPayload for ListPayload {
    const OPERATION: &'static str = "list";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranteesPayload {}

impl CallPayload for GranteesPayload {
    const OPERATION: &'static str = "grantees";
}

/// Envelope binding a payload to the caller that signed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedCall<P> {
    pub caller: Address,
    pub timestamp_ms: u64,
    pub payload: P,
    /// Hex-encoded ed25519 signature.
    pub signature: String,
}

impl<P: CallPayload> SignedCall<P> {
    /// Sign `payload` as the holder of `key` at `timestamp_ms`.
    pub fn sign(key: &SigningKey, payload: P, timestamp_ms: u64) -> Result<Self, CallError> {
        let caller = Address::from(&key.verifying_key());
        let digest = signing_digest::<P>(&caller, &payload, timestamp_ms)?;
        let signature = key.sign(&digest);
        Ok(Self {
            caller,
            timestamp_ms,
            payload,
            signature: hex::encode(signature.to_bytes()),
        })
    }

    /// Check the signature and freshness of the call.
    ///
    /// `max_skew_ms` bounds the distance between the call timestamp and
    /// `now_ms` in either direction.
    pub fn verify(&self, now_ms: u64, max_skew_ms: u64) -> Result<VerifiedCaller, CallError> {
        let skew_ms = now_ms.abs_diff(self.timestamp_ms);
        if skew_ms > max_skew_ms {
            return Err(CallError::Stale { skew_ms });
        }

        let mut raw = [0u8; 64];
        hex::decode_to_slice(self.signature.trim(), &mut raw)
            .map_err(|_| CallError::InvalidSignatureEncoding)?;
        let signature = Signature::from_bytes(&raw);

        let Ok(verifying_key) = VerifyingKey::from_bytes(self.caller.as_bytes()) else {
            return Err(CallError::InvalidPublicKey);
        };

        let digest = self.digest()?;
        verifying_key
            .verify(&digest, &signature)
            .map_err(|_| CallError::SignatureMismatch)?;

        Ok(VerifiedCaller(self.caller))
    }

    /// The signed message digest. It identifies the call independently of
    /// how the signature is encoded.
    pub fn digest(&self) -> Result<[u8; 32], CallError> {
        signing_digest::<P>(&self.caller, &self.payload, self.timestamp_ms)
    }
}

fn signing_digest<P: CallPayload>(
    caller: &Address,
    payload: &P,
    timestamp_ms: u64,
) -> Result<[u8; 32], CallError> {
    let payload_bytes = serde_json::to_vec(payload)?;

    let mut message = Vec::with_capacity(64 + payload_bytes.len());
    message.extend_from_slice(CALL_DOMAIN_TAG);
    message.extend_from_slice(P::OPERATION.as_bytes());
    message.extend_from_slice(caller.as_bytes());
    message.extend_from_slice(&payload_bytes);
    message.extend_from_slice(&timestamp_ms.to_le_bytes());

    Ok(Sha256::digest(&message).into())
}

/// Caller identity that has been authenticated by the transport layer.
///
/// The registry only accepts this token, never a bare [`Address`], so a
/// self-asserted address can't reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerifiedCaller(Address);

impl VerifiedCaller {
    /// Identity vouched for by a transport that authenticates callers
    /// through its own means (an in-process session, a signed ledger
    /// transaction).
    pub fn from_transport(address: Address) -> Self {
        Self(address)
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

/// Milliseconds since the unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generate a fresh signing key from the operating system RNG.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand_core::OsRng)
}
