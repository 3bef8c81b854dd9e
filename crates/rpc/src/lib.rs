//! HTTP transport for the content registry.
//!
//! Verifies signed calls and maps registry outcomes onto status codes and a
//! `{"code", "message"}` error body.

mod registry;
mod replay;
pub mod server;


pub use server::{build_router, start_server, AppState};
