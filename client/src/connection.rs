//! The single TCP connection a `ManagedFiles` session talks through.
//!
//! ## Architecture
//!
//! The stream is owned by a `Mutex` held for the whole of each remote call,
//! so concurrent callers are serialized and the chunks of one transfer are
//! never interleaved with another call's lines. Each call gets a deadline
//! from `call_timeout`; the socket timeout is re-armed with the remaining
//! time before every blocking read or write.
//!
//! A transport failure mid-call leaves the NDJSON stream in an unknown
//! position, so the connection is marked broken and later calls fail fast
//! with `RemoteUnavailable`. The service's own errors do not break it.

use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use fileengine_core::config::ClientConfig;
use fileengine_core::protocol::messages::CallMeta;
use fileengine_core::protocol::methods::{
    self, CancelParams, ChunkParams, InitializeParams, InitializeResult,
};
use fileengine_core::transfer::{Reassembler, TransferChunk};
use fileengine_core::{FileEngineError, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::jsonrpc::{self, JsonRpcMessage};

const CLIENT_NAME: &str = "fileengine-client";

struct ChannelState {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    next_id: u64,
    broken: Option<String>,
    closed: bool,
}

/// A mutex-serialized JSON-RPC connection to the FileEngine service.
pub struct Connection {
    state: Mutex<ChannelState>,
    address: String,
    call_timeout: Option<Duration>,
    server_version: String,
}

impl Connection {
    /// Connect to the service and perform the `initialize` handshake,
    /// which carries `meta` like any other request.
    pub fn open(config: &ClientConfig, meta: &CallMeta) -> Result<Self> {
        config.validate()?;
        let address = config.address();

        let stream = connect_any(&address, config.connect_timeout())?;
        stream
            .set_nodelay(true)
            .map_err(|e| FileEngineError::RemoteUnavailable(format!("{address}: {e}")))?;
        let writer = stream
            .try_clone()
            .map_err(|e| FileEngineError::RemoteUnavailable(format!("{address}: {e}")))?;

        let mut conn = Self {
            state: Mutex::new(ChannelState {
                reader: BufReader::new(stream),
                writer,
                next_id: 0,
                broken: None,
                closed: false,
            }),
            address,
            call_timeout: config.call_timeout(),
            server_version: String::new(),
        };

        let params = serde_json::to_value(InitializeParams {
            protocol_version: methods::PROTOCOL_VERSION.to_string(),
            client: CLIENT_NAME.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        })
        .map_err(|e| FileEngineError::Protocol(e.to_string()))?;
        let result = conn.call(methods::INITIALIZE, params, Some(meta))?;
        let init: InitializeResult = serde_json::from_value(result).map_err(|e| {
            FileEngineError::Protocol(format!("Invalid initialize result: {e}"))
        })?;

        if major_version(&init.protocol_version) != major_version(methods::PROTOCOL_VERSION) {
            conn.close();
            return Err(FileEngineError::Protocol(format!(
                "Service speaks protocol {}, client speaks {}",
                init.protocol_version,
                methods::PROTOCOL_VERSION
            )));
        }

        info!(
            "Connected to FileEngine service at {} (server {}, protocol {})",
            conn.address, init.server_version, init.protocol_version
        );
        conn.server_version = init.server_version;
        Ok(conn)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Version string the service reported during the handshake.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Whether an earlier transport failure has desynchronized the stream.
    pub fn is_broken(&self) -> bool {
        self.lock().broken.is_some()
    }

    /// Send a request and wait for its response.
    pub fn call(&self, method: &str, params: Value, meta: Option<&CallMeta>) -> Result<Value> {
        self.with_channel(method, |channel| {
            let id = channel.send_request(params, meta)?;
            channel.await_response(id)
        })
    }

    /// Send a request followed by its ordered chunk stream, then wait for
    /// the response.
    ///
    /// If `chunks` yields an error (source I/O failure, size guard), the
    /// upload is cancelled on the service, its response is consumed so the
    /// stream stays aligned, and the local error is returned.
    pub fn upload<I>(
        &self,
        method: &str,
        params: Value,
        meta: Option<&CallMeta>,
        chunks: I,
    ) -> Result<Value>
    where
        I: IntoIterator<Item = Result<TransferChunk>>,
    {
        self.with_channel(method, |channel| {
            let id = channel.send_request(params, meta)?;

            for chunk in chunks {
                match chunk {
                    Ok(chunk) => {
                        let seq = chunk.seq;
                        let params = to_params(ChunkParams::from_chunk(id, chunk))?;
                        channel.send_notification(methods::UPLOAD_CHUNK, params)?;
                        debug!("Sent chunk {} of call {}", seq, id);
                    }
                    Err(local) => {
                        warn!("Upload source failed, cancelling call {}: {}", id, local);
                        let params = to_params(CancelParams { call_id: id })?;
                        channel.send_notification(methods::UPLOAD_CANCEL, params)?;
                        if let Err(e) = channel.await_response(id) {
                            if e.is_transport() {
                                return Err(e);
                            }
                        }
                        return Err(local);
                    }
                }
            }

            channel.await_response(id)
        })
    }

    /// Send a request and feed the chunk notifications it produces into
    /// `reassembler` until the response arrives.
    ///
    /// A rejected chunk (corruption, size guard, sink failure) abandons the
    /// transfer: remaining chunks are drained and the first error returned.
    pub fn download<W: Write>(
        &self,
        method: &str,
        params: Value,
        meta: Option<&CallMeta>,
        reassembler: &mut Reassembler<W>,
    ) -> Result<Value> {
        self.with_channel(method, |channel| {
            let id = channel.send_request(params, meta)?;
            let mut failure: Option<FileEngineError> = None;

            loop {
                let message = match channel.next_message() {
                    Ok(message) => message,
                    Err(FileEngineError::RemoteUnavailable(reason))
                        if reassembler.chunks_received() > 0 && !reassembler.is_complete() =>
                    {
                        warn!("Download of call {} cut off: {}", id, reason);
                        return Err(FileEngineError::truncated_after(
                            reassembler.chunks_received(),
                        ));
                    }
                    Err(e) => return Err(e),
                };

                match message {
                    JsonRpcMessage::Notification { method, params }
                        if method == methods::DOWNLOAD_CHUNK =>
                    {
                        let chunk: ChunkParams = serde_json::from_value(params).map_err(|e| {
                            channel.protocol_error(format!("Invalid download chunk: {e}"))
                        })?;
                        if chunk.call_id != id {
                            warn!("Ignoring chunk for call {} during call {}", chunk.call_id, id);
                            continue;
                        }
                        if failure.is_none() {
                            if let Err(e) = reassembler.push(chunk.into_chunk()) {
                                warn!("Abandoning download of call {}: {}", id, e);
                                failure = Some(e);
                            }
                        }
                    }
                    JsonRpcMessage::Notification { method, .. } => {
                        debug!("Ignoring notification {} during call {}", method, id);
                    }
                    JsonRpcMessage::Response { id: rid, result } if rid == id => {
                        if let Some(e) = failure {
                            return Err(e);
                        }
                        if !reassembler.is_complete() {
                            return Err(FileEngineError::truncated_after(
                            reassembler.chunks_received(),
                        ));
                        }
                        return Ok(result);
                    }
                    JsonRpcMessage::Error {
                        id: rid,
                        code,
                        message,
                        ..
                    } if rid == id => {
                        return Err(failure.unwrap_or_else(|| FileEngineError::from_rpc(code, message)));
                    }
                    JsonRpcMessage::Response { id: rid, .. }
                    | JsonRpcMessage::Error { id: rid, .. } => {
                        return Err(channel
                            .protocol_error(format!("Response for call {rid} while awaiting {id}")));
                    }
                }
            }
        })
    }

    /// Shut the stream down. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        if let Err(e) = state.writer.shutdown(Shutdown::Both) {
            debug!("Shutdown of {} reported: {}", self.address, e);
        }
        info!("Closed connection to {}", self.address);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_channel<T>(
        &self,
        method: &str,
        f: impl FnOnce(&mut Channel<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.lock();
        if state.closed {
            return Err(FileEngineError::SessionClosed);
        }
        if let Some(reason) = &state.broken {
            return Err(FileEngineError::RemoteUnavailable(format!(
                "connection to {} is unusable after an earlier failure: {}",
                self.address, reason
            )));
        }

        let mut channel = Channel {
            state: &mut *state,
            method,
            deadline: self.call_timeout.map(|t| Instant::now() + t),
        };
        f(&mut channel)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// One call's view of the locked connection.
struct Channel<'a> {
    state: &'a mut ChannelState,
    method: &'a str,
    deadline: Option<Instant>,
}

impl Channel<'_> {
    /// Set the socket timeout to the time left before the call's deadline.
    fn arm(&mut self) -> Result<()> {
        let timeout = match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    let err = FileEngineError::RemoteTimeout(self.method.to_string());
                    self.state.broken = Some(err.to_string());
                    return Err(err);
                }
                Some(remaining)
            }
            None => None,
        };
        let armed = {
            let stream = &self.state.writer;
            stream
                .set_read_timeout(timeout)
                .and_then(|_| stream.set_write_timeout(timeout))
        };
        armed.map_err(|e| self.transport_error(e))
    }

    /// Map an I/O failure to the taxonomy and mark the connection broken.
    fn transport_error(&mut self, err: std::io::Error) -> FileEngineError {
        let mapped = match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                FileEngineError::RemoteTimeout(self.method.to_string())
            }
            _ => FileEngineError::RemoteUnavailable(format!("{}: {}", self.method, err)),
        };
        warn!("Transport failure during {}: {}", self.method, err);
        self.state.broken = Some(mapped.to_string());
        mapped
    }

    fn protocol_error(&mut self, message: String) -> FileEngineError {
        warn!("Protocol violation during {}: {}", self.method, message);
        self.state.broken = Some(message.clone());
        FileEngineError::Protocol(message)
    }

    fn send_request(&mut self, params: Value, meta: Option<&CallMeta>) -> Result<u64> {
        self.arm()?;
        self.state.next_id += 1;
        let id = self.state.next_id;
        debug!("Sending {} (id {})", self.method, id);
        jsonrpc::write_request(&mut self.state.writer, id, self.method, params, meta)
            .map_err(|e| self.transport_error(e))?;
        Ok(id)
    }

    fn send_notification(&mut self, method: &str, params: Value) -> Result<()> {
        self.arm()?;
        jsonrpc::write_notification(&mut self.state.writer, method, params)
            .map_err(|e| self.transport_error(e))
    }

    fn next_message(&mut self) -> Result<JsonRpcMessage> {
        self.arm()?;
        let line = jsonrpc::read_line(&mut self.state.reader).map_err(|e| self.transport_error(e))?;
        debug!("Received: {}", truncate_for_log(&line));
        jsonrpc::parse_message(&line).map_err(|e| self.protocol_error(e))
    }

    /// Read until the response for `id`, skipping unrelated notifications.
    fn await_response(&mut self, id: u64) -> Result<Value> {
        loop {
            match self.next_message()? {
                JsonRpcMessage::Response { id: rid, result } if rid == id => return Ok(result),
                JsonRpcMessage::Error {
                    id: rid,
                    code,
                    message,
                    ..
                } if rid == id => return Err(FileEngineError::from_rpc(code, message)),
                JsonRpcMessage::Notification { method, .. } => {
                    debug!("Ignoring notification {} while awaiting call {}", method, id);
                }
                JsonRpcMessage::Response { id: rid, .. } | JsonRpcMessage::Error { id: rid, .. } => {
                    return Err(
                        self.protocol_error(format!("Response for call {rid} while awaiting {id}"))
                    );
                }
            }
        }
    }
}

fn connect_any(address: &str, timeout: Duration) -> Result<TcpStream> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|e| FileEngineError::RemoteUnavailable(format!("Cannot resolve {address}: {e}")))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            FileEngineError::RemoteTimeout(format!("connect to {address}"))
        }
        Some(e) => FileEngineError::RemoteUnavailable(format!(
            "Could not connect to FileEngine service at {address}: {e}"
        )),
        None => FileEngineError::RemoteUnavailable(format!("{address} resolved to no addresses")),
    })
}

fn to_params(value: impl serde::Serialize) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| FileEngineError::Protocol(e.to_string()))
}

fn major_version(version: &str) -> Option<u32> {
    version.split('.').next().and_then(|s| s.parse().ok())
}

/// Chunk lines are large; keep debug logs readable.
fn truncate_for_log(line: &str) -> &str {
    const MAX: usize = 512;
    if line.len() <= MAX {
        return line;
    }
    let mut end = MAX;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
