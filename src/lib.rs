//! # account-rpc
//!
//! Async JSON-RPC 2.0 client for the `account_*` namespace of a DREP node.
//!
//! Remote procedures are declared as data ([`MethodDescriptor`]) and bound
//! onto a shared [`RequestManager`]. Each bound [`Method`] checks its arity,
//! applies its formatters and hands the request to the manager, which
//! correlates replies with callers by id.
//!
//! ## Architecture
//!
//! - **Descriptors**: name, wire name, arity and optional formatters
//! - **Dispatch**: [`Method`] and [`Facade`] over one [`RequestManager`]
//! - **Wire**: JSON over HTTP POST, or JSON lines / length-prefixed MsgPack over IPC and TCP
//!
//! ## Example
//!
//! ```ignore
//! use account_rpc::Client;
//!
//! #[tokio::main]
//! async fn main() -> account_rpc::Result<()> {
//!     let client = Client::builder().ipc("/var/lib/drep/drep.ipc").connect().await?;
//!
//!     client.account().open_wallet("secret")?.await?;
//!     let sig = client.account().sign("0xAddr", "msgHash")?.await?;
//!     println!("{}", sig);
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod facade;
pub mod manager;
pub mod method;
pub mod protocol;
pub mod transport;
pub mod writer;

mod client;

pub use account::AccountApi;
pub use client::{Client, ClientBuilder};
pub use codec::Encoding;
pub use config::{ClientConfig, Endpoint};
pub use descriptor::{formatter, Formatter, MethodDescriptor};
pub use error::{DescriptorError, Error, Result, RpcError};
pub use facade::Facade;
pub use manager::{RequestManager, ResponseFuture};
pub use method::{Call, Method};
