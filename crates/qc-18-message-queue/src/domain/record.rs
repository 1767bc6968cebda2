//! Outbound record: one queued message and its transmission state.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::Message;

/// A queued outbound message.
///
/// Records are shared between the scheduler tick (which stamps the first
/// transmission) and the inbound read path (which marks a request answered),
/// so all state lives behind atomics.
///
/// Only records whose message declares a response code can become answered.
#[derive(Debug)]
pub struct MessageRecord<M> {
    message: Arc<M>,
    attempts: AtomicU32,
    last_sent_at: Mutex<Option<Instant>>,
    answered: AtomicBool,
}

impl<M: Message> MessageRecord<M> {
    pub fn new(message: M) -> Self {
        Self {
            message: Arc::new(message),
            attempts: AtomicU32::new(0),
            last_sent_at: Mutex::new(None),
            answered: AtomicBool::new(false),
        }
    }

    /// The wrapped message.
    pub fn message(&self) -> &Arc<M> {
        &self.message
    }

    /// Number of times this message has been written to the wire.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Whether the message has been written at least once.
    pub fn is_sent(&self) -> bool {
        self.attempts() > 0
    }

    /// When the message was first written.
    pub fn last_sent_at(&self) -> Option<Instant> {
        *self.last_sent_at.lock()
    }

    pub fn is_answered(&self) -> bool {
        self.answered.load(Ordering::Acquire)
    }

    /// Records a transmission.
    pub fn mark_sent(&self) {
        *self.last_sent_at.lock() = Some(Instant::now());
        self.attempts.fetch_add(1, Ordering::AcqRel);
    }

    /// Marks the request answered.
    ///
    /// Returns `false` without touching state when the message expects no
    /// response.
    pub fn answer(&self) -> bool {
        if self.message.response_code().is_none() {
            return false;
        }
        self.answered.store(true, Ordering::Release);
        true
    }
}
