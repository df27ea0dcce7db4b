//! Subscription reader.
//!
//! A subscription keeps one HTTP response open and reads frames from it
//! until the server ends the stream or the caller stops listening. A
//! background task owns the response body: it reads exactly one frame
//! header, then exactly the declared payload, and publishes each payload to
//! a bounded channel. The consumer side is a [`StreamHandle`] (raw payloads)
//! or a [`Streaming`] (decoded messages).
//!
//! # Cancellation
//!
//! [`StreamHandle::cancel`], dropping the handle, a [`CancelSignal`] passed
//! through [`CallOptions`](crate::CallOptions) or the per-call deadline all
//! stop the task. Once it exits the response body is dropped, which closes
//! the connection. The task never blocks past a cancellation, even when the
//! consumer has stopped reading and the channel is full.
//!
//! # Ending
//!
//! | cause                                   | consumer sees               |
//! |-----------------------------------------|-----------------------------|
//! | end of body, or a partial frame at EOF  | `None`                      |
//! | trailer frame with `grpc-status: 0`     | `None`                      |
//! | any other trailer frame                 | `Err(Status)`, then `None`  |
//! | malformed frame                         | `Err(Frame)`, then `None`   |
//! | transport failure while reading         | `Err(Transport)`, then `None` |
//! | cancel, drop or deadline                | `None`                      |

use std::future::pending;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use fr24_grpc_core::{FRAME_HEADER_SIZE, ProtocolError, decode_frame, parse_frame_header};
use futures::{Stream, StreamExt};
use http::HeaderMap;
use prost::Message;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[cfg(feature = "tracing")]
use tracing::Instrument;

use crate::ClientError;
use crate::response::decode_message;

/// A cloneable, idempotent cancellation flag.
///
/// All clones observe the same flag. Cancelling is permanent: a signal
/// cannot be reset.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the flag. Calling it again has no further effect.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is raised.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as `self`, so this only returns once set
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Adapt an HTTP body into a [`ByteStream`], dropping trailer frames.
pub(crate) fn body_stream<B>(body: B) -> ByteStream
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display,
{
    use http_body_util::BodyExt;

    Box::pin(body.into_data_stream().map(|chunk| {
        chunk.map_err(|e| ClientError::Transport(format!("failed to read response body: {}", e)))
    }))
}

/// Cuts a byte stream into whole frames.
///
/// Chunk boundaries from the transport need not line up with frames; bytes
/// are buffered until the header and then the full declared payload are
/// present.
pub(crate) struct FrameReader {
    body: ByteStream,
    buf: BytesMut,
    max_frame_size: usize,
}

impl FrameReader {
    pub(crate) fn new(body: ByteStream, max_frame_size: usize) -> Self {
        Self {
            body,
            buf: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Read the next complete frame, header included.
    ///
    /// Returns `Ok(None)` at end of body. A frame cut short by the end of
    /// the body is discarded and also reported as `Ok(None)`.
    pub(crate) async fn next_frame(&mut self) -> Result<Option<Bytes>, ClientError> {
        loop {
            if self.buf.len() >= FRAME_HEADER_SIZE {
                let header = parse_frame_header(&self.buf).map_err(|error| ClientError::Frame {
                    error,
                    raw: Bytes::copy_from_slice(&self.buf),
                })?;
                header
                    .check_limit(self.max_frame_size)
                    .map_err(|error| ClientError::Frame {
                        error,
                        raw: Bytes::copy_from_slice(&self.buf[..FRAME_HEADER_SIZE]),
                    })?;

                let frame_len = header.frame_len();
                if self.buf.len() >= frame_len {
                    return Ok(Some(self.buf.split_to(frame_len).freeze()));
                }
                self.buf.reserve(frame_len - self.buf.len());
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(err)) => return Err(err),
                None => {
                    if !self.buf.is_empty() {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            buffered = self.buf.len(),
                            "discarding partial frame at end of stream"
                        );
                    }
                    return Ok(None);
                }
            }
        }
    }
}

/// Why a read loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EndReason {
    Eof,
    Trailer,
    Error,
    Cancelled,
    Deadline,
    Dropped,
}

impl EndReason {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    fn as_str(&self) -> &'static str {
        match self {
            EndReason::Eof => "eof",
            EndReason::Trailer => "ok-trailer",
            EndReason::Error => "error",
            EndReason::Cancelled => "cancelled",
            EndReason::Deadline => "deadline",
            EndReason::Dropped => "dropped",
        }
    }
}

async fn stop_requested(
    own: &CancelSignal,
    external: Option<&CancelSignal>,
    deadline: Option<Instant>,
) -> EndReason {
    let external = async {
        match external {
            Some(signal) => signal.cancelled().await,
            None => pending().await,
        }
    };
    let deadline = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => pending().await,
        }
    };

    tokio::select! {
        _ = own.cancelled() => EndReason::Cancelled,
        _ = external => EndReason::Cancelled,
        _ = deadline => EndReason::Deadline,
    }
}

async fn read_loop(
    mut reader: FrameReader,
    tx: mpsc::Sender<Result<Bytes, ClientError>>,
    own: CancelSignal,
    external: Option<CancelSignal>,
    deadline: Option<Instant>,
) {
    let stop = stop_requested(&own, external.as_ref(), deadline);
    tokio::pin!(stop);
    let mut delivered = 0usize;

    let reason = loop {
        let next = tokio::select! {
            biased;
            reason = &mut stop => break reason,
            next = reader.next_frame() => next,
        };

        let item = match next {
            Ok(None) => break EndReason::Eof,
            Ok(Some(frame)) => match decode_frame(&frame) {
                Ok(payload) => Ok(frame.slice_ref(payload)),
                Err(ProtocolError::Status { status, .. }) if status.is_ok() => {
                    break EndReason::Trailer;
                }
                Err(err) => Err(ClientError::from(err)),
            },
            Err(err) => Err(err),
        };
        let fatal = item.is_err();

        tokio::select! {
            biased;
            reason = &mut stop => break reason,
            sent = tx.send(item) => {
                if sent.is_err() {
                    break EndReason::Dropped;
                }
            }
        }

        if fatal {
            break EndReason::Error;
        }
        delivered += 1;
    };

    if matches!(reason, EndReason::Cancelled | EndReason::Deadline) {
        own.cancel();
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(reason = reason.as_str(), frames = delivered, "stream ended");
    #[cfg(not(feature = "tracing"))]
    let _ = delivered;
}

/// Start the background reader for an open response body.
pub(crate) fn spawn(
    body: ByteStream,
    metadata: HeaderMap,
    buffer: usize,
    max_frame_size: usize,
    external: Option<CancelSignal>,
    deadline: Option<Instant>,
) -> StreamHandle {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let signal = CancelSignal::new();
    let reader = FrameReader::new(body, max_frame_size);

    let task = read_loop(reader, tx, signal.clone(), external.clone(), deadline);
    #[cfg(feature = "tracing")]
    let task = task.in_current_span();

    StreamHandle {
        rx,
        signal,
        external,
        task: Some(tokio::spawn(task)),
        metadata,
    }
}

/// One open subscription, yielding raw message payloads in wire order.
///
/// The handle is a [`Stream`] and is not restartable: once it has ended or
/// been cancelled it only yields `None`. Dropping it cancels the
/// subscription.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
///
/// let mut handle = client.open_stream(Method::FollowFlight, &request, CallOptions::new()).await?;
/// while let Some(payload) = handle.next().await {
///     let payload = payload?;
///     // decode with your own schema
/// }
/// ```
pub struct StreamHandle {
    rx: mpsc::Receiver<Result<Bytes, ClientError>>,
    signal: CancelSignal,
    external: Option<CancelSignal>,
    task: Option<JoinHandle<()>>,
    metadata: HeaderMap,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl StreamHandle {
    /// Stop the subscription. Idempotent.
    ///
    /// Frames already buffered are discarded; the next poll yields `None`.
    pub fn cancel(&mut self) {
        self.signal.cancel();
        self.rx.close();
    }

    /// Whether the subscription was cancelled, by any source.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled() || self.external.as_ref().is_some_and(CancelSignal::is_cancelled)
    }

    /// A signal that cancels this subscription from elsewhere.
    pub fn canceller(&self) -> CancelSignal {
        self.signal.clone()
    }

    /// Response headers of the subscription.
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Cancel and wait until the reader has released the connection.
    pub async fn close(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Take the first item, then close the subscription.
    pub async fn first(mut self) -> Option<Result<Bytes, ClientError>> {
        let item = self.next().await;
        self.close().await;
        item
    }

    /// Decode payloads as `T`.
    pub fn typed<T>(self) -> Streaming<T>
    where
        T: Message + Default,
    {
        Streaming {
            handle: self,
            _marker: PhantomData,
        }
    }
}

impl Stream for StreamHandle {
    type Item = Result<Bytes, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_cancelled() {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}

/// A subscription yielding decoded messages.
///
/// Wraps a [`StreamHandle`]; each payload is decoded as `T`, and a payload
/// that does not decode is reported as [`ClientError::Decode`] without
/// ending the stream.
pub struct Streaming<T> {
    handle: StreamHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Streaming<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streaming").field("handle", &self.handle).finish()
    }
}

impl<T> Streaming<T>
where
    T: Message + Default,
{
    pub fn cancel(&mut self) {
        self.handle.cancel();
    }

    pub fn canceller(&self) -> CancelSignal {
        self.handle.canceller()
    }

    pub fn metadata(&self) -> &HeaderMap {
        self.handle.metadata()
    }

    pub async fn close(self) {
        self.handle.close().await;
    }

    /// Take the first message, then close the subscription.
    pub async fn first(self) -> Option<Result<T, ClientError>> {
        let item = self.handle.first().await?;
        Some(item.and_then(|payload| decode_message(&payload, &payload)))
    }

    pub fn into_handle(self) -> StreamHandle {
        self.handle
    }
}

impl<T> Stream for Streaming<T>
where
    T: Message + Default,
{
    type Item = Result<T, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.handle).poll_next(cx).map(|item| {
            item.map(|item| item.and_then(|payload| decode_message(&payload, &payload)))
        })
    }
}
