//! Standard and application JSON-RPC 2.0 error codes.

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// Application error codes (FileEngine-specific).

/// The connection has not been initialized yet (must call `initialize` first).
pub const NOT_INITIALIZED: i64 = -32001;

/// Protocol version mismatch.
pub const VERSION_NOT_SUPPORTED: i64 = -32002;

/// No file, directory or version with the given identifier.
pub const NOT_FOUND: i64 = -32003;

/// The caller's identity is not authorized for the operation.
pub const PERMISSION_DENIED: i64 = -32004;

/// A version or state conflict (e.g. concurrent modification).
pub const CONFLICT: i64 = -32005;

/// A storage operation failed on the service side.
pub const OPERATION_FAILED: i64 = -32006;

/// An upload chunk sequence had a gap, duplicate or reordering.
pub const TRANSFER_CORRUPTED: i64 = -32007;

/// An upload ended without a final chunk.
pub const TRANSFER_TRUNCATED: i64 = -32008;

/// The payload exceeds the service's size limit.
pub const PAYLOAD_TOO_LARGE: i64 = -32009;

/// The client cancelled an upload mid-stream.
pub const TRANSFER_CANCELLED: i64 = -32010;

/// The call metadata is missing or carries a malformed identity.
pub const INVALID_IDENTITY: i64 = -32011;
