//! Shared types for the Drive content registry.
//!
//! Addresses are ed25519 verifying keys rendered as `0x`-prefixed hex.
//! Content references are opaque locator strings produced by a
//! content-addressed storage service. Signed calls carry both across the
//! transport boundary.

pub mod address;
pub mod api;
pub mod call;
pub mod content;

pub use address::*;
pub use api::*;
pub use call::*;
pub use content::*;
