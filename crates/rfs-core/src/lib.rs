//! rfs-core: Shared pieces of the single-file remote sync system.
//!
//! This crate provides what both the server and the client need:
//! - The length-prefixed wire protocol (frames and typed messages)
//! - An atomic, temp-file-and-rename file store behind the `FileStore` trait
//! - Content hashing used by the client to recognize its own writes

pub mod content_hash;
pub mod fs;
pub mod protocol;

pub use content_hash::ContentHash;
pub use fs::{AtomicFs, FileStore, InMemoryFs, PersistenceError};
pub use protocol::{
    Frame, Message, MessageType, ProtocolError, StateError, Version, MAX_CONTENT, MAX_MSG,
};
