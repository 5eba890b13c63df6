//! Client configuration.
//!
//! Every field has a default, so a config can be built with
//! [`ClientConfig::default`], tweaked through [`ClientBuilder`](crate::ClientBuilder),
//! or deserialized from a partial JSON document.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::codec::Encoding;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::writer::WriterConfig;

/// Default IPC socket file name inside the node's data directory.
pub const DEFAULT_IPC_PATH: &str = "drep.ipc";

/// Default URL of the node's HTTP-RPC server.
pub const DEFAULT_HTTP_URL: &str = "http://127.0.0.1:15645";

/// Where the node is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "lowercase")]
pub enum Endpoint {
    /// Unix domain socket (unix) or named pipe (Windows).
    Ipc(PathBuf),
    /// Raw JSON-RPC stream over TCP, `host:port`.
    Tcp(String),
    /// One HTTP POST per request, e.g. `http://127.0.0.1:15645`.
    Http(String),
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Http(DEFAULT_HTTP_URL.to_string())
    }
}

/// Full client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub encoding: Encoding,
    /// Per-call deadline in milliseconds. `None` or `0` waits forever.
    pub request_timeout_ms: Option<u64>,
    pub max_frame_size: usize,
    pub writer: WriterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            encoding: Encoding::default(),
            request_timeout_ms: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            writer: WriterConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Per-call deadline, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
