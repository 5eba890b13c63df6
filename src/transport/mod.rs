//! Transport module - reaching the node.
//!
//! Provides:
//! - IPC: Unix Domain Sockets (Linux/macOS), Named Pipes (Windows)
//! - TCP: raw JSON-RPC stream
//! - HTTP: one POST per request, the node's default RPC port
//!
//! Any other `AsyncRead + AsyncWrite` stream can be handed straight to
//! [`RequestManager::from_stream`](crate::RequestManager::from_stream).

mod connection;
mod http;

pub use connection::{connect, connect_ipc, connect_tcp, Connection};
pub use http::HttpTransport;
