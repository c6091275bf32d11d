//! The `ManagedFiles` session façade.
//!
//! A session is Open from the moment [`ManagedFiles::connect`] returns until
//! [`ManagedFiles::close`] (or drop). Verbs on a closed session fail with
//! [`FileEngineError::SessionClosed`] without touching the network.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use fileengine_core::acl::{AclEntry, Permissions};
use fileengine_core::config::ClientConfig;
use fileengine_core::files::{DirectoryEntry, FileInfo, FileUid, Revision, StorageUsage, Version};
use fileengine_core::identity::IdentityContext;
use fileengine_core::{FileEngineError, Result};
use tracing::info;

use crate::connection::Connection;
use crate::mapper::RemoteCallMapper;

/// A filesystem-style session against the FileEngine service, bound to one
/// identity and one tenant for its whole life.
pub struct ManagedFiles {
    mapper: RemoteCallMapper,
    closed: AtomicBool,
}

impl ManagedFiles {
    /// Build the identity, connect and handshake.
    ///
    /// The tenant comes from `config.tenant`. Identity problems are reported
    /// before any network activity.
    pub fn connect<R, C>(username: &str, roles: R, claims: C, config: &ClientConfig) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let identity = IdentityContext::new(username, roles, claims, &config.tenant)?;
        config.validate()?;
        let connection = Connection::open(config, &identity.to_meta())?;
        info!(
            "Session opened for {} (tenant {}) at {}",
            identity.username(),
            identity.tenant(),
            connection.address()
        );
        Ok(Self {
            mapper: RemoteCallMapper::new(connection, identity, config),
            closed: AtomicBool::new(false),
        })
    }

    pub fn identity(&self) -> &IdentityContext {
        self.mapper.identity()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the session. Calling it again is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.mapper.connection().close();
        info!("Session closed for {}", self.mapper.identity().username());
    }

    fn open(&self) -> Result<&RemoteCallMapper> {
        if self.is_closed() {
            return Err(FileEngineError::SessionClosed);
        }
        Ok(&self.mapper)
    }

    pub fn mkdir(&self, parent: &FileUid, name: &str) -> Result<FileUid> {
        self.open()?.mkdir(parent, name)
    }

    pub fn touch(&self, dir: &FileUid, name: &str) -> Result<FileUid> {
        self.open()?.touch(dir, name)
    }

    /// Upload `source` as a new version of `uid`. Accepts byte slices,
    /// files, cursors or any other reader.
    pub fn put<R: Read>(&self, uid: &FileUid, source: R) -> Result<Version> {
        self.open()?.put(uid, source)
    }

    /// Download `uid`, latest version when `version` is `None`.
    pub fn get(&self, uid: &FileUid, version: Option<&Version>) -> Result<Vec<u8>> {
        self.open()?.get(uid, version)
    }

    pub fn get_into<W: Write>(
        &self,
        uid: &FileUid,
        version: Option<&Version>,
        sink: W,
    ) -> Result<u64> {
        self.open()?.get_into(uid, version, sink)
    }

    pub fn get_back(&self, uid: &FileUid, back: usize) -> Result<Vec<u8>> {
        self.open()?.get_back(uid, back)
    }

    pub fn stat(&self, uid: &FileUid) -> Result<FileInfo> {
        self.open()?.stat(uid)
    }

    pub fn exists(&self, uid: &FileUid) -> Result<bool> {
        self.open()?.exists(uid)
    }

    pub fn is_dir(&self, uid: &FileUid) -> Result<bool> {
        self.open()?.is_dir(uid)
    }

    pub fn list_dir(&self, uid: &FileUid) -> Result<Vec<DirectoryEntry>> {
        self.open()?.list_dir(uid)
    }

    pub fn list_dir_with_deleted(&self, uid: &FileUid) -> Result<Vec<DirectoryEntry>> {
        self.open()?.list_dir_with_deleted(uid)
    }

    pub fn remove(&self, uid: &FileUid) -> Result<()> {
        self.open()?.remove(uid)
    }

    pub fn rename(&self, uid: &FileUid, new_name: &str) -> Result<()> {
        self.open()?.rename(uid, new_name)
    }

    pub fn move_to(
        &self,
        uid: &FileUid,
        destination: &FileUid,
        new_name: Option<&str>,
    ) -> Result<()> {
        self.open()?.move_to(uid, destination, new_name)
    }

    pub fn copy(&self, uid: &FileUid, destination: &FileUid) -> Result<FileUid> {
        self.open()?.copy(uid, destination)
    }

    /// Versions of `uid`, newest first.
    pub fn list_versions(&self, uid: &FileUid) -> Result<Vec<Version>> {
        self.open()?.list_versions(uid)
    }

    pub fn revisions(&self, uid: &FileUid) -> Result<Vec<Revision>> {
        self.open()?.revisions(uid)
    }

    pub fn restore_to_version(&self, uid: &FileUid, version: &Version) -> Result<Version> {
        self.open()?.restore_to_version(uid, version)
    }

    pub fn undelete(&self, uid: &FileUid) -> Result<()> {
        self.open()?.undelete(uid)
    }

    pub fn purge_old_versions(&self, uid: &FileUid, keep_count: u32) -> Result<()> {
        self.open()?.purge_old_versions(uid, keep_count)
    }

    pub fn set_metadata(&self, uid: &FileUid, key: &str, value: &str) -> Result<()> {
        self.open()?.set_metadata(uid, key, value)
    }

    pub fn get_metadata(&self, uid: &FileUid, key: &str) -> Result<String> {
        self.open()?.get_metadata(uid, key)
    }

    pub fn get_metadata_for_version(
        &self,
        uid: &FileUid,
        version: &Version,
        key: &str,
    ) -> Result<String> {
        self.open()?.get_metadata_for_version(uid, version, key)
    }

    pub fn get_all_metadata(&self, uid: &FileUid) -> Result<BTreeMap<String, String>> {
        self.open()?.get_all_metadata(uid)
    }

    pub fn get_all_metadata_for_version(
        &self,
        uid: &FileUid,
        version: &Version,
    ) -> Result<BTreeMap<String, String>> {
        self.open()?.get_all_metadata_for_version(uid, version)
    }

    pub fn delete_metadata(&self, uid: &FileUid, key: &str) -> Result<()> {
        self.open()?.delete_metadata(uid, key)
    }

    pub fn grant(&self, uid: &FileUid, entry: &AclEntry) -> Result<Vec<AclEntry>> {
        self.open()?.grant(uid, entry)
    }

    pub fn revoke(&self, uid: &FileUid, entry: &AclEntry) -> Result<Vec<AclEntry>> {
        self.open()?.revoke(uid, entry)
    }

    pub fn list_acl(&self, uid: &FileUid) -> Result<Vec<AclEntry>> {
        self.open()?.list_acl(uid)
    }

    pub fn check_permission(&self, uid: &FileUid, required: Permissions) -> Result<bool> {
        self.open()?.check_permission(uid, required)
    }

    pub fn storage_usage(&self) -> Result<StorageUsage> {
        self.open()?.storage_usage()
    }

    pub fn trigger_sync(&self) -> Result<()> {
        self.open()?.trigger_sync()
    }
}

impl Drop for ManagedFiles {
    fn drop(&mut self) {
        self.close();
    }
}
