//! Client builder and connection handle.
//!
//! The [`ClientBuilder`] provides a fluent API over [`ClientConfig`]. The
//! [`Client`] owns one [`RequestManager`] and the account namespace bound
//! onto it:
//! 1. Connect to the configured endpoint (HTTP needs no connection)
//! 2. Spawn the writer task and read loop for stream endpoints
//! 3. Bind the account descriptors
//!
//! # Example
//!
//! ```ignore
//! use account_rpc::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .http("http://127.0.0.1:15645")
//!         .request_timeout(std::time::Duration::from_secs(10))
//!         .connect()
//!         .await?;
//!
//!     let addresses = client.account().address_list()?.await?;
//!     println!("{}", addresses);
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::account::AccountApi;
use crate::codec::Encoding;
use crate::config::{ClientConfig, Endpoint};
use crate::descriptor::MethodDescriptor;
use crate::error::{DescriptorError, Result};
use crate::facade::Facade;
use crate::manager::RequestManager;
use crate::transport;

/// Builder for configuring and connecting a [`Client`].
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    /// Connect over a Unix socket or named pipe at `path`.
    pub fn ipc(self, path: impl Into<PathBuf>) -> Self {
        self.endpoint(Endpoint::Ipc(path.into()))
    }

    /// POST each request to `url`.
    pub fn http(self, url: impl Into<String>) -> Self {
        self.endpoint(Endpoint::Http(url.into()))
    }

    /// Stream raw JSON-RPC over TCP to `addr` (`host:port`).
    pub fn tcp(self, addr: impl Into<String>) -> Self {
        self.endpoint(Endpoint::Tcp(addr.into()))
    }

    /// Set the wire encoding.
    ///
    /// Default: JSON
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Fail calls that get no reply within `timeout`.
    ///
    /// Rounded up to whole milliseconds; `Duration::ZERO` disables the deadline.
    /// Default: no deadline
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_nanos().div_ceil(1_000_000);
        self.config.request_timeout_ms = Some(u64::try_from(ms).unwrap_or(u64::MAX));
        self
    }

    /// Set the largest inbound frame accepted.
    ///
    /// Default: 16 MiB
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the maximum pending frames before sends fail with `Backpressure`.
    ///
    /// Default: 1024
    pub fn max_pending_frames(mut self, limit: usize) -> Self {
        self.config.writer.max_pending_frames = limit;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.channel_capacity = capacity;
        self
    }

    /// Connect to the configured endpoint.
    pub async fn connect(self) -> Result<Client> {
        if let Endpoint::Http(url) = &self.config.endpoint {
            let manager = RequestManager::http(url.clone(), &self.config)?;
            tracing::info!(url = %url, "using HTTP-RPC endpoint");
            return Ok(Client::new(manager));
        }

        let conn = transport::connect(&self.config.endpoint).await?;
        tracing::info!(endpoint = ?self.config.endpoint, "connected to node");
        Ok(self.connect_stream(conn))
    }

    /// Run over an already-connected stream. Must be called within a tokio runtime.
    pub fn connect_stream<S>(self, stream: S) -> Client
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Client::new(RequestManager::from_stream(stream, &self.config))
    }
}

/// A connected client.
///
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct Client {
    manager: RequestManager,
    account: AccountApi,
}

impl Client {
    fn new(manager: RequestManager) -> Self {
        Self {
            account: AccountApi::new(manager.clone()),
            manager,
        }
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The `account_*` namespace.
    pub fn account(&self) -> &AccountApi {
        &self.account
    }

    pub fn manager(&self) -> &RequestManager {
        &self.manager
    }

    /// Bind another descriptor list onto this connection.
    pub fn bind<I>(&self, descriptors: I) -> std::result::Result<Facade, DescriptorError>
    where
        I: IntoIterator<Item = MethodDescriptor>,
    {
        Facade::bind(descriptors, self.manager.clone())
    }

    /// Close the connection. Returns how many calls were still outstanding.
    pub fn close(&self) -> usize {
        let failed = self.manager.close();
        tracing::info!(failed, "client closed");
        failed
    }

    pub fn is_closed(&self) -> bool {
        self.manager.is_closed()
    }
}
