//! Framed channel transport.
//!
//! Flow:
//! 1. `send` registers a oneshot in the pending table under a fresh CallId
//! 2. The request frame is written to the peer
//! 3. The reader task routes the matching reply back through the oneshot
//! 4. On EOF or read error: fail all pending calls, refuse new sends
//!
//! Inbound requests are handed to the installed receiver on their own task, so
//! slow handlers never block the reader or each other.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use super::codec::JsonCodec;
use super::frame::{CallId, Frame, ReplyOutcome};
use crate::config::ChannelConfig;
use crate::transport::{MessageHandler, Transport, TransportError};

/// Buffer size for in-process duplex pairs.
const DUPLEX_BUFFER: usize = 64 * 1024;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type FrameWriter = FramedWrite<BoxedWriter, JsonCodec<Frame>>;
type PendingTable = DashMap<CallId, oneshot::Sender<Result<serde_json::Value, TransportError>>>;

struct Shared {
    channel_id: String,
    writer: Mutex<FrameWriter>,
    pending: PendingTable,
    receiver: RwLock<Option<Arc<dyn MessageHandler>>>,
    closed: AtomicBool,
}

impl Shared {
    async fn write(&self, frame: Frame) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.send(frame).await?;
        Ok(())
    }

    fn receiver(&self) -> Option<Arc<dyn MessageHandler>> {
        self.receiver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn teardown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let ids: Vec<CallId> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                tracing::debug!(call_id = %id, "Failing pending call due to channel teardown");
                let _ = tx.send(Err(TransportError::Closed));
            }
        }
    }
}

/// Removes a call from the pending table when its future is dropped.
struct PendingCall<'a> {
    id: CallId,
    pending: &'a PendingTable,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if self.pending.remove(&self.id).is_some() {
            tracing::trace!(call_id = %self.id, "Call abandoned before reply");
        }
    }
}

/// One end of a framed, bidirectional channel.
///
/// Dropping the channel stops its reader; the write half closes once no
/// reply is still being written, which the peer observes as EOF.
pub struct Channel {
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
}

impl Channel {
    /// Open a channel over separate read and write halves.
    ///
    /// Must be called from within a tokio runtime (spawns the reader task).
    pub fn open<R, W>(reader: R, writer: W, config: &ChannelConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: BoxedWriter = Box::new(writer);
        let shared = Arc::new(Shared {
            channel_id: config.channel_id.clone(),
            writer: Mutex::new(FramedWrite::new(
                writer,
                JsonCodec::with_max_frame_length(config.max_frame_length),
            )),
            pending: DashMap::new(),
            receiver: RwLock::new(None),
            closed: AtomicBool::new(false),
        });

        tracing::debug!(channel = %config.channel_id, "Opening channel");
        let frames = FramedRead::new(
            reader,
            JsonCodec::<Frame>::with_max_frame_length(config.max_frame_length),
        );
        let reader = tokio::spawn(run_reader(frames, Arc::clone(&shared)));

        Self { shared, reader }
    }

    /// Open a channel over a single duplex stream (socket, pipe pair, ...).
    pub fn from_stream<S>(stream: S, config: &ChannelConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::open(read_half, write_half, config)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Number of calls sent from this end still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl Transport for Channel {
    async fn send(&self, message: serde_json::Value) -> Result<serde_json::Value, TransportError> {
        if self.shared.is_closed() {
            return Err(TransportError::Closed);
        }

        let id = CallId::new();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, tx);
        let _pending = PendingCall {
            id,
            pending: &self.shared.pending,
        };

        // Teardown may have drained the table between the check and the insert.
        if self.shared.is_closed() {
            return Err(TransportError::Closed);
        }

        tracing::trace!(call_id = %id, channel = %self.shared.channel_id, "Sending request");
        self.shared
            .write(Frame::Request {
                id,
                channel: self.shared.channel_id.clone(),
                message,
            })
            .await?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Closed),
        }
    }

    fn receive(&self, handler: Arc<dyn MessageHandler>) {
        let mut slot = self
            .shared
            .receiver
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::warn!(channel = %self.shared.channel_id, "Replacing existing receiver");
        }
        *slot = Some(handler);
    }

    fn channel_id(&self) -> &str {
        &self.shared.channel_id
    }
}

/// Build two connected channels over an in-memory duplex stream.
pub fn channel_pair(config: &ChannelConfig) -> (Channel, Channel) {
    let (a, b) = tokio::io::duplex(DUPLEX_BUFFER);
    (
        Channel::from_stream(a, config),
        Channel::from_stream(b, config),
    )
}

async fn run_reader<R>(mut frames: FramedRead<R, JsonCodec<Frame>>, shared: Arc<Shared>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    loop {
        match frames.next().await {
            Some(Ok(frame)) if frame.channel() != shared.channel_id => {
                tracing::debug!(
                    channel = %frame.channel(),
                    expected = %shared.channel_id,
                    call_id = %frame.id(),
                    "Ignoring frame for another channel"
                );
            }
            Some(Ok(Frame::Request { id, message, .. })) => {
                tracing::trace!(call_id = %id, "Request received");
                let receiver = shared.receiver();
                let channel_id = shared.channel_id.clone();
                let weak = Arc::downgrade(&shared);
                tokio::spawn(async move {
                    let outcome = run_receiver(id, &channel_id, message, receiver).await;
                    send_reply(id, outcome, weak).await;
                });
            }
            Some(Ok(Frame::Reply { id, outcome, .. })) => match shared.pending.remove(&id) {
                Some((_, tx)) => {
                    let result = match outcome {
                        ReplyOutcome::Resolved { value } => Ok(value),
                        ReplyOutcome::Rejected { message } => {
                            Err(TransportError::Rejected(message))
                        }
                    };
                    if tx.send(result).is_err() {
                        tracing::trace!(call_id = %id, "Caller went away before reply");
                    }
                }
                None => {
                    tracing::debug!(call_id = %id, "Reply for unknown or abandoned call");
                }
            },
            Some(Err(e)) => {
                tracing::error!(channel = %shared.channel_id, error = %e, "Channel read error");
                break;
            }
            None => {
                tracing::debug!(channel = %shared.channel_id, "Channel closed by peer");
                break;
            }
        }
    }

    shared.teardown();
}

async fn run_receiver(
    id: CallId,
    channel_id: &str,
    message: serde_json::Value,
    receiver: Option<Arc<dyn MessageHandler>>,
) -> ReplyOutcome {
    let Some(handler) = receiver else {
        tracing::debug!(call_id = %id, channel = %channel_id, "No receiver installed");
        return ReplyOutcome::rejected(format!(
            "no receiver registered on channel '{channel_id}'"
        ));
    };

    match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
        Ok(Ok(value)) => ReplyOutcome::Resolved { value },
        Ok(Err(e)) => {
            let message = format!("{e:#}");
            tracing::debug!(call_id = %id, error = %message, "Receiver rejected call");
            ReplyOutcome::Rejected { message }
        }
        Err(_) => {
            tracing::error!(call_id = %id, "Receiver panicked");
            ReplyOutcome::rejected("receiver panicked while handling message")
        }
    }
}

async fn send_reply(id: CallId, outcome: ReplyOutcome, shared: Weak<Shared>) {
    let Some(shared) = shared.upgrade() else {
        tracing::debug!(call_id = %id, "Channel dropped before reply could be sent");
        return;
    };
    let reply = |outcome| Frame::Reply {
        id,
        channel: shared.channel_id.clone(),
        outcome,
    };
    let Err(e) = shared.write(reply(outcome)).await else {
        return;
    };

    // Encode failures leave nothing in the write buffer, so the caller can
    // still be told. If this also fails the writer itself is broken.
    tracing::warn!(call_id = %id, error = %e, "Failed to send reply, rejecting call");
    let fallback = ReplyOutcome::rejected(format!("reply could not be encoded: {e}"));
    if let Err(e) = shared.write(reply(fallback)).await {
        tracing::warn!(call_id = %id, error = %e, "Failed to send rejection");
    }
}
