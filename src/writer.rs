//! Outbound half of a stream connection.
//!
//! One task owns the write half. [`RequestManager::send`](crate::RequestManager::send)
//! never awaits: it pushes an encoded request into a bounded queue and the
//! task coalesces whatever is queued into a single vectored write.
//!
//! ```text
//! send() ─┐
//! send() ─┼─► queue (bounded) ─► writer task ─► socket / pipe
//! send() ─┘
//! ```

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::OutboundFrame;

/// Requests allowed in the queue before `send` reports backpressure.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;

/// Slots in the queue between callers and the writer task.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on requests coalesced into one vectored write.
const FRAMES_PER_WRITE: usize = 64;

/// Queue limits for a stream connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Queued requests at which `try_send` starts refusing.
    pub max_pending_frames: usize,
    /// Capacity of the underlying channel.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Producer side of the queue. Clones share the same count.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    queued: Arc<AtomicUsize>,
    limit: usize,
}

impl WriterHandle {
    fn new(tx: mpsc::Sender<OutboundFrame>, queued: Arc<AtomicUsize>, limit: usize) -> Self {
        Self { tx, queued, limit }
    }

    /// Queue a frame without waiting.
    ///
    /// Refused with `Backpressure` at the configured limit, or with
    /// `TransportClosed` once the writer task is gone.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        if self.is_saturated() {
            return Err(Error::Backpressure);
        }
        self.queued.fetch_add(1, Ordering::AcqRel);

        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                Err(match e {
                    mpsc::error::TrySendError::Full(_) => Error::Backpressure,
                    mpsc::error::TrySendError::Closed(_) => Error::TransportClosed,
                })
            }
        }
    }

    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.queued() >= self.limit
    }

    /// Frames queued and not yet on the wire.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start the writer task over `writer`.
///
/// The task ends with `Ok(())` once every [`WriterHandle`] is dropped, after
/// shutting the write half down, or with the first write error.
pub fn spawn_writer<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let queued = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(tx, queued.clone(), config.max_pending_frames);
    let task = tokio::spawn(drain_queue(rx, writer, queued));
    (handle, task)
}

async fn drain_queue<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    queued: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frames = Vec::with_capacity(FRAMES_PER_WRITE);

    while rx.recv_many(&mut frames, FRAMES_PER_WRITE).await > 0 {
        write_frames(&mut writer, &frames).await?;
        queued.fetch_sub(frames.len(), Ordering::AcqRel);
        frames.clear();
    }

    tracing::debug!("request queue closed, shutting down writer");
    let _ = writer.shutdown().await;
    Ok(())
}

/// Write every frame in order, resuming after short writes, then flush.
async fn write_frames<W>(writer: &mut W, frames: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total: usize = frames.iter().map(OutboundFrame::size).sum();
    let mut done = 0;

    while done < total {
        let slices = unwritten_slices(frames, done);
        match writer.write_vectored(&slices).await? {
            0 => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "stream accepted no bytes",
                )))
            }
            n => done += n,
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Slices covering `frames` from byte `offset` onwards, empty parts skipped.
fn unwritten_slices(frames: &[OutboundFrame], offset: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(frames.len() * 2);
    let mut start = 0;

    for part in frames.iter().flat_map(|f| [&f.prefix, &f.body]) {
        let end = start + part.len();
        if offset < end && !part.is_empty() {
            slices.push(IoSlice::new(&part[offset.saturating_sub(start)..]));
        }
        start = end;
    }

    slices
}
