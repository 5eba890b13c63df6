//! JSON-RPC 2.0 envelopes.
//!
//! Outbound requests always carry a numeric `id` (the correlation id).
//! Inbound messages are parsed leniently: a message without `id` is a
//! notification and is never matched against a pending call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, RpcError};

/// Protocol version string sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound call envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    /// Create a request for `method` with positional params.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Inbound envelope: a reply, an error reply, or a notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Successful reply for `id`.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Error reply for `id`.
    pub fn failure(id: u64, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }

    /// Convert into the outcome delivered to the caller.
    ///
    /// An error object wins over a result. A missing or null result is `Value::Null`
    /// (operations such as `account_closeWallet` return nothing).
    pub fn into_outcome(self) -> Result<Value, Error> {
        match self.error {
            Some(err) => Err(Error::Remote(err)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
