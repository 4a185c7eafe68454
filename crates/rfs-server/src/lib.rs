//! rfs-server library: Exposes the server components for the binary and tests.
//!
//! - `document`: the versioned document and its merge/conflict policy
//! - `connection`: per-client request loop
//! - `server`: accept loop and connection supervision

pub mod config;
pub mod connection;
pub mod document;
pub mod server;

// Re-export key types for convenience
pub use config::ServerConfig;
pub use connection::{CloseReason, Connection};
pub use document::{Document, DocumentError, Resolution};
pub use server::SyncServer;
