//! Unified error type for the FileEngine client.
//!
//! Every failure the adapter can report, whether detected locally (identity,
//! session state, transfer integrity) or returned by the remote service, is a
//! variant of [`FileEngineError`]. Remote error codes are translated 1:1 by
//! [`FileEngineError::from_rpc`].

use thiserror::Error;

use crate::protocol::errors as codes;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FileEngineError>;

/// Top-level error type for all adapter operations.
#[derive(Error, Debug)]
pub enum FileEngineError {
    /// The identity supplied at construction is malformed.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// A verb was invoked after the session was closed.
    #[error("Session is closed")]
    SessionClosed,

    /// The remote service could not be reached or the connection failed.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The call did not complete before its deadline.
    #[error("Remote call timed out: {0}")]
    RemoteTimeout(String),

    /// The target UID (or version) does not exist remotely.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote service rejected the call for the attached identity.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The remote service detected a version or state conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A chunk sequence had a gap, a duplicate, or arrived out of order.
    #[error("Transfer corrupted: {0}")]
    TransferCorrupted(String),

    /// A chunk sequence ended before its final chunk.
    ///
    /// `received` is only known when the client counted the chunks itself;
    /// a truncation reported by the service carries its message in `detail`.
    #[error("Transfer truncated: {detail}")]
    TransferTruncated { received: Option<u64>, detail: String },

    /// The payload exceeds a maximum size, either the configured guard
    /// (`limit` set) or one enforced by the service.
    #[error("Payload too large: {detail}")]
    PayloadTooLarge { limit: Option<u64>, detail: String },

    /// A verb argument failed local validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The client configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// The remote service sent a malformed or unexpected message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Any other error code returned by the remote service.
    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// A local I/O error while reading an upload source or writing a download sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileEngineError {
    /// Translate a JSON-RPC error response into the local taxonomy.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            codes::NOT_FOUND => Self::NotFound(message),
            codes::PERMISSION_DENIED | codes::INVALID_IDENTITY => Self::PermissionDenied(message),
            codes::CONFLICT => Self::Conflict(message),
            codes::TRANSFER_CORRUPTED => Self::TransferCorrupted(message),
            codes::TRANSFER_TRUNCATED => Self::TransferTruncated {
                received: None,
                detail: message,
            },
            codes::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge {
                limit: None,
                detail: message,
            },
            codes::VERSION_NOT_SUPPORTED => Self::Protocol(message),
            _ => Self::Remote { code, message },
        }
    }

    /// A locally detected truncation after `received` chunks.
    pub fn truncated_after(received: u64) -> Self {
        Self::TransferTruncated {
            received: Some(received),
            detail: format!("ended after {received} chunk(s) without a final chunk"),
        }
    }

    /// The local size guard tripped past `limit` bytes.
    pub fn over_limit(limit: u64) -> Self {
        Self::PayloadTooLarge {
            limit: Some(limit),
            detail: format!("more than {limit} bytes"),
        }
    }

    /// Whether the error came from the transport rather than the service.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::RemoteTimeout(_))
    }
}
