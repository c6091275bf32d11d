//! Shared types for the FileEngine client: identity, configuration, the file
//! and ACL data model, the chunked transfer codec, and the JSON-RPC protocol
//! definitions used on both ends of the wire.

pub mod acl;
pub mod config;
pub mod errors;
pub mod files;
pub mod identity;
pub mod protocol;
pub mod transfer;

pub use errors::{FileEngineError, Result};
