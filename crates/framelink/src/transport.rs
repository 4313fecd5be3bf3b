//! Transport seam between the RPC core and whatever moves bytes between contexts.
//!
//! The core only needs two primitives: `send` a message and eventually get the
//! peer's reply, and `receive` inbound messages with an async handler. The
//! bundled [`Channel`](crate::bridge::channel::Channel) implements both over a
//! framed byte stream; tests substitute in-memory mocks.

use std::sync::Arc;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel was torn down before a reply arrived.
    #[error("channel closed")]
    Closed,
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The peer's receiver failed while handling the message.
    #[error("peer rejected call: {0}")]
    Rejected(String),
}

impl TransportError {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Handles messages delivered by a transport and produces the reply.
///
/// An `Err` is sent back to the peer as a rejection; it never tears down the
/// channel.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: serde_json::Value) -> anyhow::Result<serde_json::Value>;
}

/// A named, bidirectional channel to one peer context.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `message` and wait for the peer's reply.
    ///
    /// Each call is independent; dropping the returned future abandons the
    /// call without affecting others.
    async fn send(&self, message: serde_json::Value) -> Result<serde_json::Value, TransportError>;

    /// Install the handler for inbound messages, replacing any previous one.
    fn receive(&self, handler: Arc<dyn MessageHandler>);

    fn channel_id(&self) -> &str;
}
