//! Method names and parameter/result shapes of the FileEngine protocol.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::acl::{AclEntry, Permissions};
use crate::files::{DirectoryEntry, FileInfo, FileUid, Revision, Version};
use crate::transfer::TransferChunk;

/// Protocol version spoken by this client.
pub const PROTOCOL_VERSION: &str = "0.1.0";

pub const INITIALIZE: &str = "initialize";

pub const MKDIR: &str = "fs.mkdir";
pub const TOUCH: &str = "fs.touch";
pub const UPLOAD: &str = "fs.upload";
pub const UPLOAD_CHUNK: &str = "fs.upload.chunk";
pub const UPLOAD_CANCEL: &str = "fs.upload.cancel";
pub const DOWNLOAD: &str = "fs.download";
pub const DOWNLOAD_CHUNK: &str = "fs.download.chunk";
pub const STAT: &str = "fs.stat";
pub const EXISTS: &str = "fs.exists";
pub const LIST: &str = "fs.list";
pub const REMOVE_FILE: &str = "fs.remove_file";
pub const REMOVE_DIR: &str = "fs.remove_dir";
pub const RENAME: &str = "fs.rename";
pub const MOVE: &str = "fs.move";
pub const COPY: &str = "fs.copy";
pub const VERSIONS: &str = "fs.versions";
pub const RESTORE: &str = "fs.restore";
pub const UNDELETE: &str = "fs.undelete";
pub const PURGE_VERSIONS: &str = "fs.purge_versions";

pub const META_SET: &str = "meta.set";
pub const META_GET: &str = "meta.get";
pub const META_GET_ALL: &str = "meta.get_all";
pub const META_DELETE: &str = "meta.delete";

pub const ACL_GRANT: &str = "acl.grant";
pub const ACL_REVOKE: &str = "acl.revoke";
pub const ACL_LIST: &str = "acl.list";
pub const ACL_CHECK: &str = "acl.check";

pub const STORAGE_USAGE: &str = "admin.storage_usage";
pub const SYNC: &str = "admin.sync";

// ── initialize ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    pub protocol_version: String,
    pub client: String,
    pub client_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub server_version: String,
}

// ── node creation / addressing ──────────────────────────────────────

/// Params for `fs.mkdir` and `fs.touch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateParams {
    pub parent_uid: FileUid,
    pub name: String,
}

/// Result carrying a newly issued UID (`fs.mkdir`, `fs.touch`, `fs.copy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UidResult {
    pub uid: FileUid,
}

/// Params for calls that only address one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UidParams {
    pub uid: FileUid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistsResult {
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatResult {
    pub info: FileInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    pub uid: FileUid,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult {
    pub entries: Vec<DirectoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameParams {
    pub uid: FileUid,
    pub new_name: String,
}

/// Params for `fs.move` and `fs.copy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocateParams {
    pub source_uid: FileUid,
    pub destination_parent_uid: FileUid,
}

// ── transfer ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadParams {
    pub uid: FileUid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub version: Version,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadParams {
    pub uid: FileUid,
    /// `None` resolves to the latest version on the service side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub version: Version,
    #[serde(default)]
    pub size: u64,
}

/// Params of `fs.upload.chunk` / `fs.download.chunk` notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkParams {
    /// Id of the `fs.upload` / `fs.download` request this chunk belongs to.
    pub call_id: u64,
    pub seq: u64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl ChunkParams {
    pub fn from_chunk(call_id: u64, chunk: TransferChunk) -> Self {
        Self {
            call_id,
            seq: chunk.seq,
            data: chunk.data,
            is_final: chunk.is_final,
        }
    }

    pub fn into_chunk(self) -> TransferChunk {
        TransferChunk::new(self.seq, self.data, self.is_final)
    }
}

/// Params of `fs.upload.cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    pub call_id: u64,
}

// ── versions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionsResult {
    /// Newest first.
    pub versions: Vec<Revision>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreParams {
    pub uid: FileUid,
    pub version: Version,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResult {
    pub restored_version: Version,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeParams {
    pub uid: FileUid,
    pub keep_count: u32,
}

// ── metadata ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaSetParams {
    pub uid: FileUid,
    pub key: String,
    pub value: String,
}

/// Params for `meta.get` and `meta.delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaKeyParams {
    pub uid: FileUid,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaGetResult {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaGetAllParams {
    pub uid: FileUid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaGetAllResult {
    pub metadata: BTreeMap<String, String>,
}

// ── acl ─────────────────────────────────────────────────────────────

/// Params for `acl.grant` and `acl.revoke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclChangeParams {
    pub resource_uid: FileUid,
    pub entry: AclEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclListParams {
    pub resource_uid: FileUid,
}

/// Result of every `acl.*` mutation and query: the entries now in force.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclResult {
    pub entries: Vec<AclEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclCheckParams {
    pub resource_uid: FileUid,
    pub required: Permissions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclCheckResult {
    pub has_permission: bool,
}

// ── admin ───────────────────────────────────────────────────────────

/// Params for `admin.storage_usage` and `admin.sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantParams {
    pub tenant: String,
}

/// Serde adapter encoding bytes as standard base64 strings.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
