//! Inbound ports (API) for the message queue.

use std::sync::Arc;

use crate::domain::{MessageRecord, QueueKind};
use crate::error::Result;

/// Per-peer outbound queue as used by the peer handler and by application
/// code producing traffic.
pub trait PeerMessageQueue<M>: Send + Sync {
    /// Queues `message` for sending.
    ///
    /// Fails when the queue is inactive, or when a queue is saturated, in which
    /// case the connection is also torn down.
    fn send_message(&self, message: M) -> Result<QueueKind>;

    /// Correlates an inbound message with the outstanding request, if any.
    fn received_message(&self, message: &M) -> Option<Arc<MessageRecord<M>>>;

    /// True when nothing is waiting to be sent or answered.
    fn is_idle(&self) -> bool;

    /// Stops sending without notifying the peer.
    fn close(&self);
}
