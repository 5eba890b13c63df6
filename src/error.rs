//! Error types for account-rpc.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error object carried by a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human readable message from the node.
    pub message: String,
    /// Optional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Main error type for every call made through the dispatch layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrong number of positional arguments. Raised before anything is sent.
    #[error("{method}: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    /// An input or output formatter rejected a value.
    #[error("{method}: formatter failed: {reason}")]
    Format { method: String, reason: String },

    /// The node answered with a JSON-RPC error object.
    #[error("remote error: {0}")]
    Remote(RpcError),

    /// Connection lost while the call was outstanding, or used after close.
    #[error("transport closed")]
    TransportClosed,

    /// No reply arrived before the configured deadline.
    #[error("request {id} ({method}) timed out")]
    Timeout { id: u64, method: String },

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// HTTP request failed before a reply envelope was read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The HTTP server answered with a non-success status.
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Malformed frame or envelope.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Outbound queue is full.
    #[error("outbound queue full")]
    Backpressure,
}

impl Error {
    pub(crate) fn format(method: &str, reason: impl Into<String>) -> Self {
        Error::Format {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while building descriptors or binding a facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Input formatter list does not cover every argument slot.
    #[error("{name}: arity is {arity} but {formatters} input formatter slot(s) were given")]
    FormatterCount {
        name: String,
        arity: usize,
        formatters: usize,
    },

    /// Two descriptors share a name within one facade.
    #[error("duplicate method name: {0}")]
    DuplicateName(String),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
