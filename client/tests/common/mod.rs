//! Shared test utilities for the FileEngine client integration tests.
//!
//! Hosts an in-memory fake of the FileEngine service on a loopback
//! `TcpListener`, speaking the same NDJSON JSON-RPC protocol as the real
//! one. Every test gets its own service on an ephemeral port, so tests run
//! in parallel without sharing state.

// Each integration test is compiled as its own crate, so not every test file
// uses every function from this shared module. Suppress dead_code warnings.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use fileengine_client::{ClientConfig, ManagedFiles};
use fileengine_core::acl::{AclEntry, Permissions, Principal};
use fileengine_core::files::{DirectoryEntry, FileInfo, FileType, FileUid, Revision, Version};
use fileengine_core::protocol::errors;
use fileengine_core::protocol::messages::{
    CallMeta, JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
use fileengine_core::protocol::methods::{self, *};
use fileengine_core::transfer::Reassembler;

/// Roles and claims of the canonical test identity.
pub const ALICE_ROLES: [&str; 2] = ["admin", "user"];
pub const ALICE_CLAIMS: [&str; 2] = ["read", "write"];

/// Fault injection switches, all off by default.
#[derive(Debug, Clone)]
pub struct Faults {
    /// Requests from this user are rejected with `PERMISSION_DENIED`.
    pub deny_user: Option<String>,
    /// Requests for this method are recorded but never answered.
    pub stall_method: Option<String>,
    /// Download chunk with this sequence number is silently skipped.
    pub drop_download_chunk: Option<u64>,
    /// Close the connection after sending this many download chunks.
    pub cut_download_after: Option<u64>,
    /// Answer downloads without ever sending the final chunk.
    pub omit_final_chunk: bool,
    /// Report a different payload size than the bytes sent.
    pub misreport_download_size: bool,
    /// Protocol version reported by the `initialize` handshake.
    pub protocol_version: String,
    /// Payload bytes per download chunk.
    pub download_chunk_size: usize,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            deny_user: None,
            stall_method: None,
            drop_download_chunk: None,
            cut_download_after: None,
            omit_final_chunk: false,
            misreport_download_size: false,
            protocol_version: methods::PROTOCOL_VERSION.to_string(),
            download_chunk_size: 16 * 1024,
        }
    }
}

/// One request as the service saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub meta: Option<CallMeta>,
}

/// One upload chunk as the service saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChunk {
    pub call_id: u64,
    pub seq: u64,
    pub len: usize,
    pub is_final: bool,
}

struct StoredVersion {
    version: Version,
    data: Vec<u8>,
    user: String,
    metadata: BTreeMap<String, String>,
}

struct Node {
    name: String,
    parent: Option<String>,
    file_type: FileType,
    owner: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    deleted: bool,
    versions: Vec<StoredVersion>,
    metadata: BTreeMap<String, String>,
    acl: Vec<AclEntry>,
}

impl Node {
    fn new(name: &str, parent: Option<String>, file_type: FileType, owner: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            parent,
            file_type,
            owner: owner.to_string(),
            created_at: now,
            modified_at: now,
            deleted: false,
            versions: Vec::new(),
            metadata: BTreeMap::new(),
            acl: Vec::new(),
        }
    }

    fn size(&self) -> u64 {
        self.versions.last().map_or(0, |v| v.data.len() as u64)
    }
}

/// State shared by every connection to one fake service.
pub struct Store {
    nodes: HashMap<String, Node>,
    last_version_micros: i64,
    pub calls: Vec<RecordedCall>,
    pub upload_chunks: Vec<RecordedChunk>,
    pub cancelled_uploads: Vec<u64>,
    pub faults: Faults,
}

impl Store {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(String::new(), Node::new("/", None, FileType::Directory, "root"));
        Self {
            nodes,
            last_version_micros: 0,
            calls: Vec::new(),
            upload_chunks: Vec::new(),
            cancelled_uploads: Vec::new(),
            faults: Faults::default(),
        }
    }

    /// Timestamp-derived, strictly increasing version marker.
    fn next_version(&mut self) -> Version {
        let micros = Utc::now().timestamp_micros().max(self.last_version_micros + 1);
        self.last_version_micros = micros;
        Version::new(format!("{}.{:06}", micros / 1_000_000, micros % 1_000_000))
    }

    fn live(&self, uid: &str) -> Result<&Node, Fault> {
        match self.nodes.get(uid) {
            Some(node) if !node.deleted => Ok(node),
            _ => Err(not_found(uid)),
        }
    }

    fn live_mut(&mut self, uid: &str) -> Result<&mut Node, Fault> {
        match self.nodes.get_mut(uid) {
            Some(node) if !node.deleted => Ok(node),
            _ => Err(not_found(uid)),
        }
    }

    fn directory(&self, uid: &str) -> Result<&Node, Fault> {
        let node = self.live(uid)?;
        if node.file_type != FileType::Directory {
            return Err((errors::CONFLICT, format!("{uid} is not a directory")));
        }
        Ok(node)
    }

    fn name_taken(&self, parent: &str, name: &str) -> bool {
        self.nodes
            .values()
            .any(|n| !n.deleted && n.parent.as_deref() == Some(parent) && n.name == name)
    }

    fn create(&mut self, params: CreateParams, file_type: FileType, user: &str) -> Result<Value, Fault> {
        let parent = params.parent_uid.as_str().to_string();
        self.directory(&parent)?;
        if self.name_taken(&parent, &params.name) {
            return Err((
                errors::CONFLICT,
                format!("{} already exists in {}", params.name, params.parent_uid),
            ));
        }
        let uid = uuid::Uuid::new_v4().to_string();
        self.nodes
            .insert(uid.clone(), Node::new(&params.name, Some(parent), file_type, user));
        ok(UidResult { uid: FileUid::new(uid) })
    }

    fn store_version(&mut self, uid: &str, data: Vec<u8>, user: &str) -> Result<Version, Fault> {
        let version = self.next_version();
        let node = self.live_mut(uid)?;
        if node.file_type == FileType::Directory {
            return Err((errors::CONFLICT, format!("{uid} is a directory")));
        }
        node.versions.push(StoredVersion {
            version: version.clone(),
            data,
            user: user.to_string(),
            metadata: node.metadata.clone(),
        });
        node.modified_at = Utc::now();
        Ok(version)
    }

    fn find_version<'a>(node: &'a Node, uid: &str, version: Option<&Version>) -> Result<&'a StoredVersion, Fault> {
        match version {
            Some(wanted) => node
                .versions
                .iter()
                .find(|v| &v.version == wanted)
                .ok_or_else(|| (errors::NOT_FOUND, format!("{uid} has no version {wanted}"))),
            None => node
                .versions
                .last()
                .ok_or_else(|| (errors::NOT_FOUND, format!("{uid} has no content"))),
        }
    }

    fn has_permission(&self, uid: &str, meta: &CallMeta, required: Permissions) -> Result<bool, Fault> {
        let node = self.live(uid)?;
        if meta.roles.iter().any(|r| r == "admin") || node.owner == meta.user {
            return Ok(true);
        }
        Ok(node.acl.iter().any(|entry| {
            let applies = match &entry.principal {
                Principal::User(name) => name == &meta.user,
                Principal::Role(name) => meta.roles.contains(name),
            };
            applies && entry.permissions.contains(required)
        }))
    }
}

/// JSON-RPC error code and message.
type Fault = (i64, String);

fn not_found(uid: &str) -> Fault {
    (errors::NOT_FOUND, format!("No such node: {uid}"))
}

fn ok(result: impl Serialize) -> Result<Value, Fault> {
    serde_json::to_value(result).map_err(|e| (errors::INTERNAL_ERROR, e.to_string()))
}

fn parse<P: DeserializeOwned>(params: Value) -> Result<P, Fault> {
    serde_json::from_value(params).map_err(|e| (errors::INVALID_PARAMS, e.to_string()))
}

/// An in-memory FileEngine service on an ephemeral loopback port.
pub struct FakeService {
    addr: SocketAddr,
    store: Arc<Mutex<Store>>,
}

impl FakeService {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(Mutex::new(Store::new()));

        let accept_store = store.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let store = accept_store.clone();
                thread::spawn(move || serve(stream, store));
            }
        });

        Self { addr, store }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: self.addr.port(),
            ..ClientConfig::default()
        }
    }

    /// Open a session as alice (roles admin,user; claims read,write).
    pub fn connect_alice(&self) -> ManagedFiles {
        self.connect_with(&self.config())
    }

    pub fn connect_with(&self, config: &ClientConfig) -> ManagedFiles {
        ManagedFiles::connect("alice", ALICE_ROLES, ALICE_CLAIMS, config)
            .expect("Session should open against the fake service")
    }

    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    pub fn set_faults(&self, update: impl FnOnce(&mut Faults)) {
        update(&mut self.store().faults);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.store().calls.clone()
    }

    /// Number of recorded requests for `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.store().calls.iter().filter(|c| c.method == method).count()
    }

    /// Identity metadata of the most recent `method` request.
    pub fn last_meta(&self, method: &str) -> Option<CallMeta> {
        self.store()
            .calls
            .iter()
            .rev()
            .find(|c| c.method == method)
            .and_then(|c| c.meta.clone())
    }

    pub fn upload_chunks(&self) -> Vec<RecordedChunk> {
        self.store().upload_chunks.clone()
    }
}

struct PendingUpload {
    uid: String,
    user: String,
    reassembler: Reassembler,
    rejection: Option<Fault>,
}

fn serve(stream: TcpStream, store: Arc<Mutex<Store>>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    let mut initialized = false;
    let mut uploads: HashMap<u64, PendingUpload> = HashMap::new();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let Ok(value) = serde_json::from_str::<Value>(line.trim()) else {
            let resp = JsonRpcErrorResponse::new(Value::Null, errors::PARSE_ERROR, "Parse error");
            send(&mut writer, &resp);
            continue;
        };

        if value.get("id").is_none() {
            let Ok(note) = serde_json::from_value::<JsonRpcNotification>(value) else {
                continue;
            };
            handle_notification(&mut writer, &store, &mut uploads, note);
            continue;
        }

        let Ok(request) = serde_json::from_value::<JsonRpcRequest>(value) else {
            continue;
        };
        let id = request.id.clone();
        let call_id = id.as_u64().unwrap_or_default();

        let mut guard = store.lock().unwrap();
        guard.calls.push(RecordedCall {
            method: request.method.clone(),
            meta: request.meta.clone(),
        });
        if guard.faults.stall_method.as_deref() == Some(request.method.as_str()) {
            continue;
        }

        if request.method == methods::INITIALIZE {
            let result = handle_initialize(&guard.faults, request.params);
            if result.is_ok() {
                initialized = true;
            }
            drop(guard);
            respond(&mut writer, id, result);
            continue;
        }
        if !initialized {
            drop(guard);
            respond(
                &mut writer,
                id,
                Err((errors::NOT_INITIALIZED, "call 'initialize' first".to_string())),
            );
            continue;
        }

        let meta = match request.meta {
            Some(meta) if !meta.user.is_empty() => meta,
            _ => {
                drop(guard);
                respond(
                    &mut writer,
                    id,
                    Err((errors::INVALID_IDENTITY, "missing identity".to_string())),
                );
                continue;
            }
        };
        let denied = guard.faults.deny_user.as_deref() == Some(meta.user.as_str());
        let denial = || (errors::PERMISSION_DENIED, format!("{} may not do that", meta.user));

        match request.method.as_str() {
            methods::UPLOAD => {
                guard.upload_chunks.clear();
                let (uid, rejection) = match parse::<UploadParams>(request.params) {
                    Err(e) => (String::new(), Some(e)),
                    Ok(p) => {
                        let uid = p.uid.as_str().to_string();
                        let rejection = if denied {
                            Some(denial())
                        } else {
                            guard.live(&uid).err()
                        };
                        (uid, rejection)
                    }
                };
                uploads.insert(
                    call_id,
                    PendingUpload {
                        uid,
                        user: meta.user.clone(),
                        reassembler: Reassembler::new(),
                        rejection,
                    },
                );
            }
            methods::DOWNLOAD => {
                let outcome = if denied {
                    Err(denial())
                } else {
                    parse::<DownloadParams>(request.params).and_then(|p| {
                        let node = guard.live(p.uid.as_str())?;
                        let stored = Store::find_version(node, p.uid.as_str(), p.version.as_ref())?;
                        Ok((stored.version.clone(), stored.data.clone()))
                    })
                };
                let faults = guard.faults.clone();
                drop(guard);
                match outcome {
                    Ok((version, data)) => {
                        if !stream_download(&mut writer, call_id, &data, &faults) {
                            return;
                        }
                        let size = if faults.misreport_download_size {
                            data.len() as u64 + 1
                        } else {
                            data.len() as u64
                        };
                        respond(&mut writer, id, ok(DownloadResult { version, size }));
                    }
                    Err(fault) => respond(&mut writer, id, Err(fault)),
                }
            }
            method => {
                let result = if denied {
                    Err(denial())
                } else {
                    handle_request(&mut guard, method, request.params, &meta)
                };
                drop(guard);
                respond(&mut writer, id, result);
            }
        }
    }
}

fn handle_initialize(faults: &Faults, params: Value) -> Result<Value, Fault> {
    let params: InitializeParams = parse(params)?;
    let major = params.protocol_version.split('.').next();
    if major != Some("0") {
        return Err((
            errors::VERSION_NOT_SUPPORTED,
            format!("Unsupported protocol version: {}", params.protocol_version),
        ));
    }
    ok(InitializeResult {
        protocol_version: faults.protocol_version.clone(),
        server_version: "fake-0.1.0".to_string(),
    })
}

fn handle_notification(
    writer: &mut TcpStream,
    store: &Arc<Mutex<Store>>,
    uploads: &mut HashMap<u64, PendingUpload>,
    note: JsonRpcNotification,
) {
    match note.method.as_str() {
        methods::UPLOAD_CHUNK => {
            let Ok(chunk) = serde_json::from_value::<ChunkParams>(note.params) else {
                return;
            };
            let call_id = chunk.call_id;
            let is_final = chunk.is_final;
            store.lock().unwrap().upload_chunks.push(RecordedChunk {
                call_id,
                seq: chunk.seq,
                len: chunk.data.len(),
                is_final,
            });

            let Some(pending) = uploads.get_mut(&call_id) else {
                return;
            };
            if pending.rejection.is_none() {
                if let Err(e) = pending.reassembler.push(chunk.into_chunk()) {
                    pending.rejection = Some((errors::TRANSFER_CORRUPTED, e.to_string()));
                }
            }
            if !is_final {
                return;
            }

            let Some(pending) = uploads.remove(&call_id) else {
                return;
            };
            let result = match pending.rejection {
                Some(fault) => Err(fault),
                None => {
                    let uid = pending.uid;
                    match pending.reassembler.finish() {
                        Ok(data) => store
                            .lock()
                            .unwrap()
                            .store_version(&uid, data, &pending.user)
                            .and_then(|version| ok(UploadResult { version })),
                        Err(e) => Err((errors::TRANSFER_TRUNCATED, e.to_string())),
                    }
                }
            };
            respond(writer, Value::from(call_id), result);
        }
        methods::UPLOAD_CANCEL => {
            let Ok(cancel) = serde_json::from_value::<CancelParams>(note.params) else {
                return;
            };
            if uploads.remove(&cancel.call_id).is_some() {
                store.lock().unwrap().cancelled_uploads.push(cancel.call_id);
                respond(
                    writer,
                    Value::from(cancel.call_id),
                    Err((errors::TRANSFER_CANCELLED, "upload cancelled".to_string())),
                );
            }
        }
        _ => {}
    }
}

/// Emit download chunks. Returns `false` once the connection was cut.
fn stream_download(writer: &mut TcpStream, call_id: u64, data: &[u8], faults: &Faults) -> bool {
    let pieces: Vec<&[u8]> = if data.is_empty() {
        vec![&[][..]]
    } else {
        data.chunks(faults.download_chunk_size).collect()
    };
    let last = pieces.len() - 1;

    for (seq, piece) in pieces.into_iter().enumerate() {
        let seq = seq as u64;
        if faults.cut_download_after == Some(seq) {
            let _ = writer.shutdown(Shutdown::Both);
            return false;
        }
        let is_final = seq == last as u64;
        if faults.drop_download_chunk == Some(seq) || (is_final && faults.omit_final_chunk) {
            continue;
        }
        let params = ChunkParams {
            call_id,
            seq,
            data: piece.to_vec(),
            is_final,
        };
        let note = JsonRpcNotification::new(
            methods::DOWNLOAD_CHUNK,
            serde_json::to_value(params).unwrap(),
        );
        send(writer, &note);
    }
    true
}

fn handle_request(store: &mut Store, method: &str, params: Value, meta: &CallMeta) -> Result<Value, Fault> {
    match method {
        methods::MKDIR => store.create(parse(params)?, FileType::Directory, &meta.user),
        methods::TOUCH => {
            let params: CreateParams = parse(params)?;
            let result = store.create(params, FileType::RegularFile, &meta.user)?;
            Ok(result)
        }
        methods::STAT => {
            let UidParams { uid } = parse(params)?;
            let node = store.live(uid.as_str())?;
            ok(StatResult {
                info: FileInfo {
                    uid: uid.clone(),
                    name: node.name.clone(),
                    path: String::new(),
                    file_type: node.file_type,
                    size: node.size(),
                    created_at: node.created_at,
                    modified_at: node.modified_at,
                    version: node.versions.last().map(|v| v.version.clone()),
                    owner: node.owner.clone(),
                    permissions: if node.file_type == FileType::Directory {
                        0o755
                    } else {
                        0o644
                    },
                },
            })
        }
        methods::EXISTS => {
            let UidParams { uid } = parse(params)?;
            ok(ExistsResult {
                exists: store.live(uid.as_str()).is_ok(),
            })
        }
        methods::LIST => {
            let ListParams { uid, include_deleted } = parse(params)?;
            store.directory(uid.as_str())?;
            let mut entries: Vec<DirectoryEntry> = store
                .nodes
                .iter()
                .filter(|(_, n)| n.parent.as_deref() == Some(uid.as_str()))
                .filter(|(_, n)| include_deleted || !n.deleted)
                .map(|(child, n)| DirectoryEntry {
                    uid: FileUid::new(child.clone()),
                    name: n.name.clone(),
                    file_type: n.file_type,
                    size: n.size(),
                    deleted: n.deleted,
                })
                .collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            ok(ListResult { entries })
        }
        methods::REMOVE_FILE | methods::REMOVE_DIR => {
            let UidParams { uid } = parse(params)?;
            let want_dir = method == methods::REMOVE_DIR;
            let node = store.live_mut(uid.as_str())?;
            if (node.file_type == FileType::Directory) != want_dir {
                return Err((errors::CONFLICT, format!("{method} does not apply to {uid}")));
            }
            node.deleted = true;
            ok(json!({}))
        }
        methods::UNDELETE => {
            let UidParams { uid } = parse(params)?;
            let node = store
                .nodes
                .get_mut(uid.as_str())
                .filter(|n| n.deleted)
                .ok_or_else(|| not_found(uid.as_str()))?;
            node.deleted = false;
            ok(json!({}))
        }
        methods::RENAME => {
            let RenameParams { uid, new_name } = parse(params)?;
            let node = store.live_mut(uid.as_str())?;
            node.name = new_name;
            node.modified_at = Utc::now();
            ok(json!({}))
        }
        methods::MOVE => {
            let RelocateParams {
                source_uid,
                destination_parent_uid,
            } = parse(params)?;
            store.directory(destination_parent_uid.as_str())?;
            let node = store.live_mut(source_uid.as_str())?;
            node.parent = Some(destination_parent_uid.as_str().to_string());
            ok(json!({}))
        }
        methods::COPY => {
            let RelocateParams {
                source_uid,
                destination_parent_uid,
            } = parse(params)?;
            store.directory(destination_parent_uid.as_str())?;
            let source = store.live(source_uid.as_str())?;
            let mut copy = Node::new(
                &source.name,
                Some(destination_parent_uid.as_str().to_string()),
                source.file_type,
                &meta.user,
            );
            copy.metadata = source.metadata.clone();
            copy.versions = source
                .versions
                .iter()
                .map(|v| StoredVersion {
                    version: v.version.clone(),
                    data: v.data.clone(),
                    user: v.user.clone(),
                    metadata: v.metadata.clone(),
                })
                .collect();
            let uid = uuid::Uuid::new_v4().to_string();
            store.nodes.insert(uid.clone(), copy);
            ok(UidResult { uid: FileUid::new(uid) })
        }
        methods::VERSIONS => {
            let UidParams { uid } = parse(params)?;
            let node = store.live(uid.as_str())?;
            let versions = node
                .versions
                .iter()
                .rev()
                .map(|v| Revision {
                    version: v.version.clone(),
                    user: v.user.clone(),
                })
                .collect();
            ok(VersionsResult { versions })
        }
        methods::RESTORE => {
            let RestoreParams { uid, version } = parse(params)?;
            let node = store.live(uid.as_str())?;
            let data = Store::find_version(node, uid.as_str(), Some(&version))?.data.clone();
            let restored_version = store.store_version(uid.as_str(), data, &meta.user)?;
            ok(RestoreResult { restored_version })
        }
        methods::PURGE_VERSIONS => {
            let PurgeParams { uid, keep_count } = parse(params)?;
            let node = store.live_mut(uid.as_str())?;
            let excess = node.versions.len().saturating_sub(keep_count as usize);
            node.versions.drain(..excess);
            ok(json!({}))
        }
        methods::META_SET => {
            let MetaSetParams { uid, key, value } = parse(params)?;
            let node = store.live_mut(uid.as_str())?;
            node.metadata.insert(key.clone(), value.clone());
            if let Some(latest) = node.versions.last_mut() {
                latest.metadata.insert(key, value);
            }
            ok(json!({}))
        }
        methods::META_GET => {
            let MetaKeyParams { uid, key, version } = parse(params)?;
            let node = store.live(uid.as_str())?;
            let metadata = match version {
                Some(v) => &Store::find_version(node, uid.as_str(), Some(&v))?.metadata,
                None => &node.metadata,
            };
            let value = metadata
                .get(&key)
                .cloned()
                .ok_or_else(|| (errors::NOT_FOUND, format!("{uid} has no metadata key {key}")))?;
            ok(MetaGetResult { value })
        }
        methods::META_GET_ALL => {
            let MetaGetAllParams { uid, version } = parse(params)?;
            let node = store.live(uid.as_str())?;
            let metadata = match version {
                Some(v) => Store::find_version(node, uid.as_str(), Some(&v))?.metadata.clone(),
                None => node.metadata.clone(),
            };
            ok(MetaGetAllResult { metadata })
        }
        methods::META_DELETE => {
            let MetaKeyParams { uid, key, .. } = parse(params)?;
            let node = store.live_mut(uid.as_str())?;
            node.metadata
                .remove(&key)
                .ok_or_else(|| (errors::NOT_FOUND, format!("{uid} has no metadata key {key}")))?;
            ok(json!({}))
        }
        methods::ACL_GRANT => {
            let AclChangeParams { resource_uid, entry } = parse(params)?;
            let node = store.live_mut(resource_uid.as_str())?;
            if !node.acl.contains(&entry) {
                node.acl.push(entry);
            }
            ok(AclResult {
                entries: node.acl.clone(),
            })
        }
        methods::ACL_REVOKE => {
            let AclChangeParams { resource_uid, entry } = parse(params)?;
            let node = store.live_mut(resource_uid.as_str())?;
            node.acl.retain(|e| e != &entry);
            ok(AclResult {
                entries: node.acl.clone(),
            })
        }
        methods::ACL_LIST => {
            let AclListParams { resource_uid } = parse(params)?;
            ok(AclResult {
                entries: store.live(resource_uid.as_str())?.acl.clone(),
            })
        }
        methods::ACL_CHECK => {
            let AclCheckParams {
                resource_uid,
                required,
            } = parse(params)?;
            ok(AclCheckResult {
                has_permission: store.has_permission(resource_uid.as_str(), meta, required)?,
            })
        }
        methods::STORAGE_USAGE => {
            let _: TenantParams = parse(params)?;
            let total: u64 = 1 << 30;
            let used: u64 = store
                .nodes
                .values()
                .flat_map(|n| n.versions.iter())
                .map(|v| v.data.len() as u64)
                .sum();
            ok(json!({
                "total_space": total,
                "used_space": used,
                "available_space": total - used,
                "usage_percentage": used as f64 * 100.0 / total as f64,
            }))
        }
        methods::SYNC => {
            let _: TenantParams = parse(params)?;
            ok(json!({}))
        }
        other => Err((errors::METHOD_NOT_FOUND, format!("Method not found: {other}"))),
    }
}

fn respond(writer: &mut TcpStream, id: Value, result: Result<Value, Fault>) {
    match result {
        Ok(value) => send(writer, &JsonRpcResponse::new(id, value)),
        Err((code, message)) => send(writer, &JsonRpcErrorResponse::new(id, code, message)),
    }
}

fn send(writer: &mut TcpStream, message: &impl Serialize) {
    let mut line = serde_json::to_string(message).unwrap();
    line.push('\n');
    let _ = writer.write_all(line.as_bytes());
    let _ = writer.flush();
}
