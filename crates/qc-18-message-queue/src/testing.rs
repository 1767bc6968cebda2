//! Centralized Testing Utilities
//!
//! Connection fakes used by the unit and integration tests. Available with
//! the `test-utils` feature flag.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::domain::{Message, MessageCode};
use crate::error::TransportError;
use crate::ports::{PeerConnection, WriteAck};

/// How a [`RecordingConnection`] completes writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AckMode {
    /// Acknowledge immediately
    Flush,
    /// Acknowledge with a failure
    Fail(TransportError),
    /// Drop the acknowledgement (the waiter sees an interrupted write)
    Abandon,
    /// Never acknowledge
    Hold,
    /// Refuse the write synchronously; nothing is recorded
    Reject(TransportError),
    /// Refuse only messages with this code, flush the rest
    RejectCode(MessageCode),
}

/// A connection that records everything written to it.
#[derive(Debug)]
pub struct RecordingConnection<M> {
    written: Mutex<Vec<Arc<M>>>,
    ack_mode: Mutex<AckMode>,
    held: Mutex<Vec<oneshot::Sender<Result<(), TransportError>>>>,
    closes: AtomicUsize,
}

impl<M> Default for RecordingConnection<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> RecordingConnection<M> {
    pub fn new() -> Self {
        Self::with_ack_mode(AckMode::Flush)
    }

    pub fn with_ack_mode(mode: AckMode) -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            ack_mode: Mutex::new(mode),
            held: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn set_ack_mode(&self, mode: AckMode) {
        *self.ack_mode.lock() = mode;
    }

    /// Everything written so far, in write order.
    pub fn written(&self) -> Vec<Arc<M>> {
        self.written.lock().clone()
    }

    /// Number of `close()` calls.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

impl<M: Message> RecordingConnection<M> {
    /// Codes of everything written so far, in write order.
    pub fn written_codes(&self) -> Vec<MessageCode> {
        self.written.lock().iter().map(|m| m.code()).collect()
    }
}

impl<M: Message> PeerConnection<M> for RecordingConnection<M> {
    fn write(&self, message: Arc<M>) -> Result<WriteAck, TransportError> {
        let mode = self.ack_mode.lock().clone();
        let (tx, rx) = oneshot::channel();
        match mode {
            AckMode::Reject(err) => return Err(err),
            AckMode::RejectCode(code) if message.code() == code => {
                return Err(TransportError::Closed)
            }
            AckMode::Flush | AckMode::RejectCode(_) => {
                let _ = tx.send(Ok(()));
            }
            AckMode::Fail(err) => {
                let _ = tx.send(Err(err));
            }
            AckMode::Abandon => drop(tx),
            AckMode::Hold => self.held.lock().push(tx),
        }
        self.written.lock().push(message);
        Ok(rx)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
