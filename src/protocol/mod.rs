//! Protocol module - JSON-RPC envelopes and stream framing.
//!
//! - [`Request`] / [`Response`] - JSON-RPC 2.0 envelopes
//! - [`FrameBuffer`] - accumulates partial reads and yields complete frames
//! - [`encode_frame`] - wraps an encoded envelope for the wire

mod framing;
mod message;

pub use framing::{
    encode_frame, FrameBuffer, Framing, OutboundFrame, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE,
};
pub use message::{Request, Response, JSONRPC_VERSION};
