//! Blocking client for the FileEngine versioned storage service.
//!
//! [`ManagedFiles`] is the entry point: it binds one identity and tenant to
//! one TCP connection and exposes filesystem-style verbs (`mkdir`, `touch`,
//! `put`, `get`, `stat`, ACLs, versions, metadata). Payloads move as
//! ordered chunk streams so arbitrarily large files never need to fit in a
//! single message.
//!
//! ```no_run
//! use fileengine_client::{ClientConfig, FileUid, ManagedFiles};
//!
//! # fn main() -> fileengine_client::Result<()> {
//! let files = ManagedFiles::connect("alice", ["admin"], ["read", "write"], &ClientConfig::default())?;
//! let docs = files.mkdir(&FileUid::root(), "docs")?;
//! let note = files.touch(&docs, "note.txt")?;
//! let version = files.put(&note, &b"hello"[..])?;
//! assert_eq!(files.get(&note, Some(&version))?, b"hello");
//! files.close();
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod jsonrpc;
pub mod managed_files;
pub mod mapper;

pub use fileengine_core::acl::{AclEntry, AppliesTo, Permissions, Principal};
pub use fileengine_core::config::ClientConfig;
pub use fileengine_core::files::{
    DirectoryEntry, FileInfo, FileType, FileUid, Revision, StorageUsage, Version,
};
pub use fileengine_core::identity::IdentityContext;
pub use fileengine_core::{FileEngineError, Result};
pub use managed_files::ManagedFiles;
