//! Stream framing.
//!
//! Two framings are supported:
//! - `Lines`: one envelope per line, terminated by `\n` (JSON)
//! - `LengthPrefixed`: 4-byte big-endian length followed by the payload (MsgPack)
//!
//! [`FrameBuffer`] uses `bytes::BytesMut` and a small state machine so that
//! fragmented reads are reassembled without copying payloads twice.
//!
//! # Example
//!
//! ```
//! use account_rpc::protocol::{FrameBuffer, Framing};
//!
//! let mut buffer = FrameBuffer::new(Framing::Lines);
//! assert!(buffer.push(b"{\"id\":1").unwrap().is_empty());
//! let frames = buffer.push(b"}\n").unwrap();
//! assert_eq!(&frames[0][..], b"{\"id\":1}");
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

/// Size of the length prefix used by [`Framing::LengthPrefixed`].
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// How envelopes are delimited on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Newline-delimited.
    Lines,
    /// 4-byte big-endian length prefix.
    LengthPrefixed,
}

/// A frame ready to be written: optional prefix plus body.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Length prefix (empty for line framing).
    pub prefix: Bytes,
    /// Encoded envelope, including the trailing newline for line framing.
    pub body: Bytes,
}

impl OutboundFrame {
    /// Total size of this frame on the wire.
    #[inline]
    pub fn size(&self) -> usize {
        self.prefix.len() + self.body.len()
    }
}

/// Wrap an encoded envelope for the wire.
pub fn encode_frame(framing: Framing, mut payload: Vec<u8>) -> Result<OutboundFrame> {
    match framing {
        Framing::Lines => {
            if payload.contains(&b'\n') {
                return Err(Error::Protocol(
                    "line framed payload contains a newline".to_string(),
                ));
            }
            payload.push(b'\n');
            Ok(OutboundFrame {
                prefix: Bytes::new(),
                body: Bytes::from(payload),
            })
        }
        Framing::LengthPrefixed => {
            let len = u32::try_from(payload.len()).map_err(|_| {
                Error::Protocol(format!("payload of {} bytes is too large", payload.len()))
            })?;
            Ok(OutboundFrame {
                prefix: Bytes::copy_from_slice(&len.to_be_bytes()),
                body: Bytes::from(payload),
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the 4-byte prefix (length-prefixed only).
    WaitingForPrefix,
    /// Prefix parsed, waiting for `remaining` payload bytes.
    WaitingForPayload { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    framing: Framing,
    state: State,
    max_frame_size: usize,
    /// Bytes already scanned for a newline (line framing).
    scanned: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default max frame size.
    pub fn new(framing: Framing) -> Self {
        Self::with_max_frame_size(framing, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom max frame size.
    pub fn with_max_frame_size(framing: Framing, max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            framing,
            state: State::WaitingForPrefix,
            max_frame_size,
            scanned: 0,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a frame exceeds the max frame size.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.framing {
            Framing::Lines => self.try_extract_line(),
            Framing::LengthPrefixed => self.try_extract_prefixed(),
        }
    }

    fn try_extract_line(&mut self) -> Result<Option<Bytes>> {
        loop {
            let newline = self.buffer[self.scanned..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|pos| self.scanned + pos);

            let Some(end) = newline else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_frame_size {
                    return Err(self.too_large(self.buffer.len()));
                }
                return Ok(None);
            };

            let mut line = self.buffer.split_to(end + 1);
            self.scanned = 0;
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            if line.len() > self.max_frame_size {
                return Err(self.too_large(line.len()));
            }
            // blank keep-alive lines
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(line.freeze()));
        }
    }

    fn try_extract_prefixed(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                State::WaitingForPrefix => {
                    if self.buffer.len() < LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }
                    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
                    prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_SIZE]);
                    let len = u32::from_be_bytes(prefix) as usize;
                    if len > self.max_frame_size {
                        return Err(self.too_large(len));
                    }
                    let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                    self.state = State::WaitingForPayload { remaining: len };
                }
                State::WaitingForPayload { remaining } => {
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }
                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForPrefix;
                    return Ok(Some(payload));
                }
            }
        }
    }

    fn too_large(&self, size: usize) -> Error {
        Error::Protocol(format!(
            "frame size {} exceeds maximum {}",
            size, self.max_frame_size
        ))
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForPrefix;
        self.scanned = 0;
    }
}
