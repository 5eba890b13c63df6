//! Request manager - correlation of outstanding calls.
//!
//! The [`RequestManager`] owns the connection. It:
//! 1. Assigns a fresh correlation id to every call
//! 2. Records the caller's continuation in the outstanding map
//! 3. Hands the request to the outbound path (writer task or HTTP POST)
//! 4. Matches replies back to their caller by id
//!
//! Each outstanding call is removed from the map by exactly one of: its
//! reply, its timeout, or connection close. Only the remover fires the
//! continuation, so a call is resolved at most once. A remover other than
//! the timer also cancels the timer.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{oneshot, OwnedSemaphorePermit};
use tokio::task::AbortHandle;

use crate::codec::Encoding;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::{encode_frame, FrameBuffer, Request, Response};
use crate::transport::HttpTransport;
use crate::writer::{spawn_writer, WriterHandle};

/// Read buffer size for the read loop.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// One call waiting for its reply.
struct PendingCall {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
    timer: Option<AbortHandle>,
}

impl PendingCall {
    fn fire(self, id: u64, outcome: Result<Value>) {
        if self.tx.send(outcome).is_err() {
            tracing::debug!(id, method = %self.method, "caller dropped before completion");
        }
    }
}

#[derive(Default)]
struct Outstanding {
    calls: HashMap<u64, PendingCall>,
    closed: bool,
}

/// Where encoded requests go.
enum Outbound {
    /// Framed onto a stream by the writer task.
    Stream(WriterHandle),
    /// POSTed one by one.
    Http(HttpTransport),
}

impl Outbound {
    /// Requests handed off but not yet written (stream) or answered (HTTP).
    fn pending(&self) -> usize {
        match self {
            Outbound::Stream(writer) => writer.queued(),
            Outbound::Http(http) => http.in_flight(),
        }
    }
}

struct Shared {
    state: Mutex<Outstanding>,
    next_id: AtomicU64,
    outbound: Outbound,
    encoding: Encoding,
    timeout: Option<Duration>,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl Shared {
    fn new(outbound: Outbound, encoding: Encoding, timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(Outstanding::default()),
            next_id: AtomicU64::new(1),
            outbound,
            encoding,
            timeout,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Record a call under `id`. Fails once closed.
    fn register(&self, id: u64, method: &str, tx: oneshot::Sender<Result<Value>>) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::TransportClosed);
        }
        if state.calls.contains_key(&id) {
            return Err(Error::Protocol(format!(
                "correlation id {} is still outstanding",
                id
            )));
        }
        state.calls.insert(
            id,
            PendingCall {
                method: method.to_string(),
                tx,
                timer: None,
            },
        );
        Ok(())
    }

    /// Attach a deadline to `id`, or cancel it if the call is already gone.
    fn attach_timer(&self, id: u64, timer: AbortHandle) {
        match self.state.lock().calls.get_mut(&id) {
            Some(call) => call.timer = Some(timer),
            None => timer.abort(),
        }
    }

    fn take(&self, id: u64) -> Option<PendingCall> {
        self.state.lock().calls.remove(&id)
    }

    /// Remove `id`, cancel its timer and fire it. Returns false if it was not outstanding.
    fn resolve(&self, id: u64, outcome: Result<Value>) -> bool {
        match self.take(id) {
            Some(mut call) => {
                if let Some(timer) = call.timer.take() {
                    timer.abort();
                }
                call.fire(id, outcome);
                true
            }
            None => false,
        }
    }

    fn handle_frame(&self, frame: &[u8]) {
        let response: Response = match self.encoding.decode(frame) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Discarding undecodable frame: {}", e);
                return;
            }
        };

        let Some(id) = response.id else {
            tracing::debug!("Ignoring message without id");
            return;
        };

        if !self.resolve(id, response.into_outcome()) {
            tracing::warn!(id, "Discarding reply for unknown request id");
        }
    }

    /// Mark closed and fail every outstanding call with `TransportClosed`.
    fn fail_all(&self) -> usize {
        let drained: Vec<(u64, PendingCall)> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.calls.drain().collect()
        };

        let count = drained.len();
        for (id, mut call) in drained {
            if let Some(timer) = call.timer.take() {
                timer.abort();
            }
            tracing::debug!(id, method = %call.method, "failing call on close");
            call.fire(id, Err(Error::TransportClosed));
        }
        count
    }
}

/// Future for one outstanding call, returned by [`RequestManager::send`].
#[derive(Debug)]
pub struct ResponseFuture {
    id: u64,
    rx: oneshot::Receiver<Result<Value>>,
}

impl ResponseFuture {
    /// Correlation id assigned to this call.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for ResponseFuture {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // manager dropped without resolving
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::TransportClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Shared handle to one connection. Cheap to clone; every [`Method`](crate::Method)
/// of a facade holds a clone of the same manager.
#[derive(Clone)]
pub struct RequestManager {
    shared: Arc<Shared>,
}

impl RequestManager {
    /// Spawn the writer task and read loop over a split stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R, W>(reader: R, writer: W, config: &ClientConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer, writer_task) = spawn_writer(writer, config.writer.clone());
        let shared = Arc::new(Shared::new(
            Outbound::Stream(writer),
            config.encoding,
            config.request_timeout(),
        ));

        let writer_abort = writer_task.abort_handle();
        let weak = Arc::downgrade(&shared);
        tokio::spawn(async move {
            match writer_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Writer task error: {}", e),
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::error!("Writer task panicked: {}", e),
            }
            if let Some(shared) = weak.upgrade() {
                shared.fail_all();
            }
        });

        let mut frames =
            FrameBuffer::with_max_frame_size(config.encoding.framing(), config.max_frame_size);
        let weak = Arc::downgrade(&shared);
        let reader_task = tokio::spawn(async move {
            if let Err(e) = read_loop(reader, &mut frames, &weak).await {
                tracing::error!("Read loop error: {}", e);
            }
            if let Some(shared) = weak.upgrade() {
                let failed = shared.fail_all();
                if failed > 0 {
                    tracing::warn!(failed, "Connection closed with calls outstanding");
                }
            }
        });

        shared
            .tasks
            .lock()
            .extend([writer_abort, reader_task.abort_handle()]);

        Self { shared }
    }

    /// Spawn over a single duplex stream.
    pub fn from_stream<S>(stream: S, config: &ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::spawn(reader, writer, config)
    }

    /// POST every request to `url`.
    ///
    /// Bodies are always JSON; `config.encoding` is ignored. At most
    /// `config.writer.max_pending_frames` POSTs are in flight at once.
    pub fn http(url: impl Into<String>, config: &ClientConfig) -> Result<Self> {
        if config.encoding != Encoding::Json {
            tracing::warn!(encoding = ?config.encoding, "HTTP endpoints always use JSON");
        }
        let http = HttpTransport::new(
            url,
            config.writer.max_pending_frames,
            config.request_timeout(),
        )?;
        let shared = Shared::new(Outbound::Http(http), Encoding::Json, config.request_timeout());
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Send a call and return immediately with its pending result.
    ///
    /// `wire_name` and `params` are copied verbatim into the request envelope.
    ///
    /// # Errors
    ///
    /// - `TransportClosed` if the connection is gone
    /// - `Backpressure` if the outbound queue is full
    /// - encode errors from the configured codec
    ///
    /// On error nothing is left in the outstanding map.
    pub fn send(&self, wire_name: &str, params: Vec<Value>) -> Result<ResponseFuture> {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(id, wire_name, params);
        let (tx, rx) = oneshot::channel();

        match &shared.outbound {
            Outbound::Stream(writer) => {
                let body = shared.encoding.encode(&request)?;
                let frame = encode_frame(shared.encoding.framing(), body)?;
                shared.register(id, wire_name, tx)?;
                if let Err(e) = writer.try_send(frame) {
                    shared.take(id);
                    return Err(e);
                }
            }
            Outbound::Http(http) => {
                let slot = http.try_reserve()?;
                shared.register(id, wire_name, tx)?;
                spawn_post(http.clone(), slot, request, Arc::downgrade(shared));
            }
        }

        tracing::debug!(id, method = wire_name, "request queued");

        if let Some(timeout) = shared.timeout {
            let timer = arm_timeout(Arc::downgrade(shared), id, wire_name.to_string(), timeout);
            shared.attach_timer(id, timer);
        }

        Ok(ResponseFuture { id, rx })
    }

    /// Close the connection and fail every outstanding call with `TransportClosed`.
    ///
    /// Returns the number of calls that were failed. Later sends fail immediately.
    pub fn close(&self) -> usize {
        let failed = self.shared.fail_all();
        if let Outbound::Http(http) = &self.shared.outbound {
            http.close();
        }
        for task in self.shared.tasks.lock().drain(..) {
            task.abort();
        }
        failed
    }

    /// Number of calls waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.shared.state.lock().calls.len()
    }

    /// Sorted ids of calls waiting for a reply.
    pub fn pending_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.shared.state.lock().calls.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// True once the connection has closed.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Requests handed off but not yet written, or POSTs not yet answered.
    pub fn pending_frames(&self) -> usize {
        self.shared.outbound.pending()
    }

    /// Wire encoding in use.
    pub fn encoding(&self) -> Encoding {
        self.shared.encoding
    }
}

/// Per-call deadline. Holds only a weak handle so it never keeps the connection alive.
///
/// The returned handle is stored with the call and aborted by whichever
/// other path removes it.
fn arm_timeout(shared: Weak<Shared>, id: u64, method: String, timeout: Duration) -> AbortHandle {
    let task = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if let Some(call) = shared.take(id) {
            tracing::warn!(id, method = %method, "request timed out");
            call.fire(id, Err(Error::Timeout { id, method }));
        }
    });
    task.abort_handle()
}

/// POST one request and resolve its call from the reply.
///
/// The slot is held until the reply has been read.
fn spawn_post(
    http: HttpTransport,
    slot: OwnedSemaphorePermit,
    request: Request,
    shared: Weak<Shared>,
) {
    tokio::spawn(async move {
        let _slot = slot;
        let id = request.id;
        let outcome = match http.post(&request).await {
            Ok(response) => match response.id {
                Some(got) if got != id => Err(Error::Protocol(format!(
                    "reply to request {} carried id {}",
                    id, got
                ))),
                _ => response.into_outcome(),
            },
            Err(e) => {
                tracing::warn!(id, "POST failed: {}", e);
                Err(e)
            }
        };

        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.resolve(id, outcome) {
            tracing::debug!(id, "Discarding reply for a call that already completed");
        }
    });
}

/// Read frames until EOF and hand each to the manager.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    frames: &mut FrameBuffer,
    shared: &Weak<Shared>,
) -> Result<()> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(Error::Io(e)),
        };

        let batch = frames.push(&buf[..n])?;

        let Some(shared) = shared.upgrade() else {
            return Ok(());
        };
        for frame in batch {
            shared.handle_frame(&frame);
        }
    }
}
