//! Maps the filesystem-style verbs onto FileEngine service calls.
//!
//! Every call carries the session's identity in the request `meta`. Only
//! `put` and the `get*` family go through the transfer codec; everything
//! else is a single request/response, except `remove`, `move_to` with a new
//! name and `get_back`, which chain two calls. Nothing is retried.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use fileengine_core::acl::{AclEntry, Permissions};
use fileengine_core::config::ClientConfig;
use fileengine_core::files::{DirectoryEntry, FileInfo, FileUid, Revision, StorageUsage, Version};
use fileengine_core::identity::IdentityContext;
use fileengine_core::protocol::messages::CallMeta;
use fileengine_core::protocol::methods::{self, *};
use fileengine_core::transfer::{Chunker, Reassembler};
use fileengine_core::{FileEngineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::connection::Connection;

/// Issues identity-tagged remote calls over one [`Connection`].
pub struct RemoteCallMapper {
    connection: Connection,
    identity: IdentityContext,
    meta: CallMeta,
    chunk_size: usize,
    max_payload_size: Option<u64>,
}

impl RemoteCallMapper {
    pub fn new(connection: Connection, identity: IdentityContext, config: &ClientConfig) -> Self {
        let meta = identity.to_meta();
        Self {
            connection,
            identity,
            meta,
            chunk_size: config.chunk_size,
            max_payload_size: config.max_payload_size,
        }
    }

    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    // ── nodes ───────────────────────────────────────────────────────

    /// Create a directory under `parent` (the root UID is the empty string).
    pub fn mkdir(&self, parent: &FileUid, name: &str) -> Result<FileUid> {
        require_name("directory name", name)?;
        let result: UidResult = self.invoke(
            methods::MKDIR,
            CreateParams {
                parent_uid: parent.clone(),
                name: name.to_string(),
            },
        )?;
        Ok(result.uid)
    }

    /// Create an empty file in `dir`.
    pub fn touch(&self, dir: &FileUid, name: &str) -> Result<FileUid> {
        require_name("file name", name)?;
        let result: UidResult = self.invoke(
            methods::TOUCH,
            CreateParams {
                parent_uid: dir.clone(),
                name: name.to_string(),
            },
        )?;
        Ok(result.uid)
    }

    pub fn stat(&self, uid: &FileUid) -> Result<FileInfo> {
        let result: StatResult = self.invoke(methods::STAT, UidParams { uid: uid.clone() })?;
        Ok(result.info)
    }

    pub fn exists(&self, uid: &FileUid) -> Result<bool> {
        let result: ExistsResult = self.invoke(methods::EXISTS, UidParams { uid: uid.clone() })?;
        Ok(result.exists)
    }

    pub fn is_dir(&self, uid: &FileUid) -> Result<bool> {
        Ok(self.stat(uid)?.is_directory())
    }

    pub fn list_dir(&self, uid: &FileUid) -> Result<Vec<DirectoryEntry>> {
        self.list(uid, false)
    }

    /// Like [`list_dir`](Self::list_dir), but includes soft-deleted entries.
    pub fn list_dir_with_deleted(&self, uid: &FileUid) -> Result<Vec<DirectoryEntry>> {
        self.list(uid, true)
    }

    fn list(&self, uid: &FileUid, include_deleted: bool) -> Result<Vec<DirectoryEntry>> {
        let result: ListResult = self.invoke(
            methods::LIST,
            ListParams {
                uid: uid.clone(),
                include_deleted,
            },
        )?;
        Ok(result.entries)
    }

    /// Remove a file or a directory, picking the call from its type.
    pub fn remove(&self, uid: &FileUid) -> Result<()> {
        let method = if self.stat(uid)?.is_directory() {
            methods::REMOVE_DIR
        } else {
            methods::REMOVE_FILE
        };
        self.invoke_unit(method, UidParams { uid: uid.clone() })
    }

    pub fn rename(&self, uid: &FileUid, new_name: &str) -> Result<()> {
        require_name("new name", new_name)?;
        self.invoke_unit(
            methods::RENAME,
            RenameParams {
                uid: uid.clone(),
                new_name: new_name.to_string(),
            },
        )
    }

    /// Move `uid` into `destination`, renaming it afterwards when
    /// `new_name` is given.
    pub fn move_to(
        &self,
        uid: &FileUid,
        destination: &FileUid,
        new_name: Option<&str>,
    ) -> Result<()> {
        if let Some(name) = new_name {
            require_name("new name", name)?;
        }
        self.invoke_unit(
            methods::MOVE,
            RelocateParams {
                source_uid: uid.clone(),
                destination_parent_uid: destination.clone(),
            },
        )?;
        match new_name {
            Some(name) => self.rename(uid, name),
            None => Ok(()),
        }
    }

    /// Copy `uid` into `destination`, returning the UID of the copy.
    pub fn copy(&self, uid: &FileUid, destination: &FileUid) -> Result<FileUid> {
        let result: UidResult = self.invoke(
            methods::COPY,
            RelocateParams {
                source_uid: uid.clone(),
                destination_parent_uid: destination.clone(),
            },
        )?;
        Ok(result.uid)
    }

    // ── content ─────────────────────────────────────────────────────

    /// Upload the whole of `source` as a new version of `uid`.
    pub fn put<R: Read>(&self, uid: &FileUid, source: R) -> Result<Version> {
        let chunks = Chunker::new(source, self.chunk_size).with_limit(self.max_payload_size);
        let params = to_params(UploadParams { uid: uid.clone() })?;
        let value = self
            .connection
            .upload(methods::UPLOAD, params, Some(&self.meta), chunks)?;
        let result: UploadResult = from_result(methods::UPLOAD, value)?;
        debug!("Uploaded {} as version {}", uid, result.version);
        Ok(result.version)
    }

    /// Download `uid` at `version`, or the latest version when `None`.
    pub fn get(&self, uid: &FileUid, version: Option<&Version>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.get_into(uid, version, &mut buf)?;
        Ok(buf)
    }

    /// Download into `sink`, returning the number of bytes written.
    pub fn get_into<W: Write>(
        &self,
        uid: &FileUid,
        version: Option<&Version>,
        sink: W,
    ) -> Result<u64> {
        let mut reassembler = Reassembler::with_sink(sink).with_limit(self.max_payload_size);
        let params = to_params(DownloadParams {
            uid: uid.clone(),
            version: version.cloned(),
        })?;
        let value = self.connection.download(
            methods::DOWNLOAD,
            params,
            Some(&self.meta),
            &mut reassembler,
        )?;
        let result: DownloadResult = from_result(methods::DOWNLOAD, value)?;

        let received = reassembler.bytes_received();
        reassembler.finish()?;
        if result.size != received {
            return Err(FileEngineError::TransferCorrupted(format!(
                "service reported {} bytes, received {}",
                result.size, received
            )));
        }
        debug!("Downloaded {} bytes of {} at {}", received, uid, result.version);
        Ok(received)
    }

    /// Download the `back`-th newest version (0 is the latest).
    pub fn get_back(&self, uid: &FileUid, back: usize) -> Result<Vec<u8>> {
        let versions = self.list_versions(uid)?;
        let version = versions.get(back).ok_or_else(|| {
            FileEngineError::NotFound(format!(
                "{uid} has {} versions, none {back} back",
                versions.len()
            ))
        })?;
        self.get(uid, Some(version))
    }

    // ── versions ────────────────────────────────────────────────────

    /// Versions of `uid`, newest first.
    pub fn list_versions(&self, uid: &FileUid) -> Result<Vec<Version>> {
        Ok(self
            .revisions(uid)?
            .into_iter()
            .map(|revision| revision.version)
            .collect())
    }

    pub fn revisions(&self, uid: &FileUid) -> Result<Vec<Revision>> {
        let result: VersionsResult =
            self.invoke(methods::VERSIONS, UidParams { uid: uid.clone() })?;
        Ok(result.versions)
    }

    /// Make `version` current again, returning the version it is stored as.
    pub fn restore_to_version(&self, uid: &FileUid, version: &Version) -> Result<Version> {
        let result: RestoreResult = self.invoke(
            methods::RESTORE,
            RestoreParams {
                uid: uid.clone(),
                version: version.clone(),
            },
        )?;
        Ok(result.restored_version)
    }

    pub fn undelete(&self, uid: &FileUid) -> Result<()> {
        self.invoke_unit(methods::UNDELETE, UidParams { uid: uid.clone() })
    }

    /// Drop all but the `keep_count` newest versions.
    pub fn purge_old_versions(&self, uid: &FileUid, keep_count: u32) -> Result<()> {
        self.invoke_unit(
            methods::PURGE_VERSIONS,
            PurgeParams {
                uid: uid.clone(),
                keep_count,
            },
        )
    }

    // ── metadata ────────────────────────────────────────────────────

    pub fn set_metadata(&self, uid: &FileUid, key: &str, value: &str) -> Result<()> {
        require_name("metadata key", key)?;
        self.invoke_unit(
            methods::META_SET,
            MetaSetParams {
                uid: uid.clone(),
                key: key.to_string(),
                value: value.to_string(),
            },
        )
    }

    pub fn get_metadata(&self, uid: &FileUid, key: &str) -> Result<String> {
        self.get_metadata_at(uid, None, key)
    }

    pub fn get_metadata_for_version(
        &self,
        uid: &FileUid,
        version: &Version,
        key: &str,
    ) -> Result<String> {
        self.get_metadata_at(uid, Some(version), key)
    }

    fn get_metadata_at(
        &self,
        uid: &FileUid,
        version: Option<&Version>,
        key: &str,
    ) -> Result<String> {
        require_name("metadata key", key)?;
        let result: MetaGetResult = self.invoke(
            methods::META_GET,
            MetaKeyParams {
                uid: uid.clone(),
                key: key.to_string(),
                version: version.cloned(),
            },
        )?;
        Ok(result.value)
    }

    pub fn get_all_metadata(&self, uid: &FileUid) -> Result<BTreeMap<String, String>> {
        self.get_all_metadata_at(uid, None)
    }

    pub fn get_all_metadata_for_version(
        &self,
        uid: &FileUid,
        version: &Version,
    ) -> Result<BTreeMap<String, String>> {
        self.get_all_metadata_at(uid, Some(version))
    }

    fn get_all_metadata_at(
        &self,
        uid: &FileUid,
        version: Option<&Version>,
    ) -> Result<BTreeMap<String, String>> {
        let result: MetaGetAllResult = self.invoke(
            methods::META_GET_ALL,
            MetaGetAllParams {
                uid: uid.clone(),
                version: version.cloned(),
            },
        )?;
        Ok(result.metadata)
    }

    pub fn delete_metadata(&self, uid: &FileUid, key: &str) -> Result<()> {
        require_name("metadata key", key)?;
        self.invoke_unit(
            methods::META_DELETE,
            MetaKeyParams {
                uid: uid.clone(),
                key: key.to_string(),
                version: None,
            },
        )
    }

    // ── access control ──────────────────────────────────────────────

    /// Add `entry` to the ACL of `uid`; returns the entries now in force.
    pub fn grant(&self, uid: &FileUid, entry: &AclEntry) -> Result<Vec<AclEntry>> {
        self.change_acl(methods::ACL_GRANT, uid, entry)
    }

    /// Remove `entry` from the ACL of `uid`; returns the entries now in force.
    pub fn revoke(&self, uid: &FileUid, entry: &AclEntry) -> Result<Vec<AclEntry>> {
        self.change_acl(methods::ACL_REVOKE, uid, entry)
    }

    fn change_acl(&self, method: &str, uid: &FileUid, entry: &AclEntry) -> Result<Vec<AclEntry>> {
        let result: AclResult = self.invoke(
            method,
            AclChangeParams {
                resource_uid: uid.clone(),
                entry: entry.clone(),
            },
        )?;
        Ok(result.entries)
    }

    pub fn list_acl(&self, uid: &FileUid) -> Result<Vec<AclEntry>> {
        let result: AclResult = self.invoke(
            methods::ACL_LIST,
            AclListParams {
                resource_uid: uid.clone(),
            },
        )?;
        Ok(result.entries)
    }

    /// Ask the service whether this identity holds `required` on `uid`.
    pub fn check_permission(&self, uid: &FileUid, required: Permissions) -> Result<bool> {
        let result: AclCheckResult = self.invoke(
            methods::ACL_CHECK,
            AclCheckParams {
                resource_uid: uid.clone(),
                required,
            },
        )?;
        Ok(result.has_permission)
    }

    // ── admin ───────────────────────────────────────────────────────

    pub fn storage_usage(&self) -> Result<StorageUsage> {
        self.invoke(methods::STORAGE_USAGE, self.tenant_params())
    }

    pub fn trigger_sync(&self) -> Result<()> {
        self.invoke_unit(methods::SYNC, self.tenant_params())
    }

    fn tenant_params(&self) -> TenantParams {
        TenantParams {
            tenant: self.identity.tenant().to_string(),
        }
    }

    // ── plumbing ────────────────────────────────────────────────────

    fn invoke<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
        let value = self
            .connection
            .call(method, to_params(params)?, Some(&self.meta))?;
        from_result(method, value)
    }

    fn invoke_unit<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
        self.connection
            .call(method, to_params(params)?, Some(&self.meta))?;
        Ok(())
    }
}

fn to_params(params: impl Serialize) -> Result<Value> {
    serde_json::to_value(params).map_err(|e| FileEngineError::Protocol(e.to_string()))
}

fn from_result<R: DeserializeOwned>(method: &str, value: Value) -> Result<R> {
    serde_json::from_value(value)
        .map_err(|e| FileEngineError::Protocol(format!("Invalid {method} result: {e}")))
}

fn require_name(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FileEngineError::InvalidArgument(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}
