//! Outbound ports (SPI): what the message queue needs from its collaborators.

use std::sync::Arc;
use tokio::sync::oneshot;

use crate::domain::MessageCode;
use crate::error::TransportError;

/// Completion signal for a single write.
///
/// Resolves once the transport has flushed (or failed to flush) the message.
/// A dropped sender means the write was abandoned.
pub type WriteAck = oneshot::Receiver<Result<(), TransportError>>;

/// Connection handle to one peer.
///
/// Implemented by the transport adapter. Writes must not block: the message is
/// handed to the transport and the returned [`WriteAck`] completes later.
/// Failures after hand-off are escalated by the transport itself.
pub trait PeerConnection<M>: Send + Sync {
    /// Hands `message` to the transport for writing and flushing.
    fn write(&self, message: Arc<M>) -> Result<WriteAck, TransportError>;

    /// Closes the link.
    fn close(&self);
}

/// Queue limits and priorities read on every enqueue.
pub trait QueuePolicy: Send + Sync {
    /// Ceiling shared by all three queues.
    fn max_queue_size(&self) -> usize;

    /// Whether fire-and-forget messages with `code` jump the normal queue.
    fn is_prioritized(&self, code: MessageCode) -> bool;
}
