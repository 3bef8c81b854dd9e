//! Access-controlled content registry
//!
//! Each owner address holds an append-only, insertion-ordered sequence of
//! content references. A separate insert-only relation of
//! `(grantor, grantee)` pairs decides who else may read that sequence. An
//! address can always read its own.
//!
//! The registry trusts the transport layer for caller identity: every
//! operation takes a [`VerifiedCaller`](drive_types::VerifiedCaller), never a
//! bare address.

pub mod client;
pub mod errors;
pub mod registry;
pub mod types;

pub use client::{LocalRegistryClient, RegistryClient};
pub use errors::*;
pub use registry::ContentRegistry;
pub use types::*;
