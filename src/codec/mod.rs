//! Codec module - serialization of JSON-RPC envelopes.
//!
//! - [`JsonCodec`] - `serde_json`, paired with newline framing
//! - [`MsgPackCodec`] - `rmp-serde` (`to_vec_named`), paired with length-prefixed framing
//!
//! Codecs are marker structs with static methods. [`Encoding`] picks one at
//! runtime and knows which [`Framing`] goes with it.
//!
//! # Example
//!
//! ```
//! use account_rpc::codec::{Encoding, JsonCodec};
//! use account_rpc::protocol::Framing;
//!
//! let encoded = JsonCodec::encode(&"hello").unwrap();
//! let decoded: String = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! assert_eq!(Encoding::Json.framing(), Framing::Lines);
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::Framing;

/// Wire encoding of envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Newline-delimited JSON-RPC.
    #[default]
    Json,
    /// Length-prefixed MessagePack.
    MsgPack,
}

impl Encoding {
    /// Framing that goes with this encoding.
    pub fn framing(self) -> Framing {
        match self {
            Encoding::Json => Framing::Lines,
            Encoding::MsgPack => Framing::LengthPrefixed,
        }
    }

    /// Encode a value.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Encoding::Json => JsonCodec::encode(value),
            Encoding::MsgPack => MsgPackCodec::encode(value),
        }
    }

    /// Decode a value.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            Encoding::Json => JsonCodec::decode(bytes),
            Encoding::MsgPack => MsgPackCodec::decode(bytes),
        }
    }
}
