//! # Message Queue Service
//!
//! Per-connection outbound scheduling. Producers call
//! [`MessageQueue::send_message`], the inbound read path calls
//! [`MessageQueue::received_message`], and the shared [`TickScheduler`] calls
//! [`MessageQueue::tick`] for every active connection.
//!
//! ## Tick order
//!
//! Each tick does, in this order:
//! 1. remove the requests head if it has been answered,
//! 2. write one fire-and-forget message, prioritized first,
//! 3. write the requests head if it has never been sent.
//!
//! A request is written exactly once. It leaves the queue when its answer
//! arrives or when the connection goes away; there is no resend.
//!
//! ## Lifecycle
//!
//! ```text
//! inactive ──activate──→ active ──close | disconnect──→ inactive
//! ```

use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::config::MessageQueueConfig;
use crate::domain::{Message, MessageRecord, QueueKind, QueueSet, QueueStats, ReasonCode};
use crate::error::{MessageQueueError, Result};
use crate::metrics::{Metrics, QueueMetrics};
use crate::ports::{PeerConnection, PeerMessageQueue, QueuePolicy};
use crate::scheduler::{TickRegistration, TickScheduler};


/// What a single tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// An answered request was removed from the head
    pub reaped: bool,
    /// Queue of the fire-and-forget message written, if any
    pub written: Option<QueueKind>,
    /// The requests head was written for the first time
    pub request_sent: bool,
}

struct Binding<M> {
    connection: Option<Arc<dyn PeerConnection<M>>>,
    registration: Option<TickRegistration>,
}

struct Inner<M> {
    policy: Arc<dyn QueuePolicy>,
    scheduler: Arc<TickScheduler>,
    disconnect_timeout: Duration,
    queues: QueueSet<M>,
    active: AtomicBool,
    binding: Mutex<Binding<M>>,
    metrics: Metrics,
}

/// Outbound message queue of one peer connection.
///
/// Cheap to clone; clones share the same queues and binding.
///
/// ## Thread Safety
///
/// All operations take `&self` and may be called concurrently from producer
/// tasks, the inbound read path and the scheduler.
pub struct MessageQueue<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for MessageQueue<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Message> MessageQueue<M> {
    /// Creates an inactive queue.
    pub fn new(config: MessageQueueConfig, scheduler: Arc<TickScheduler>) -> Self {
        let disconnect_timeout = config.disconnect_timeout();
        Self::with_policy(Arc::new(config), scheduler, disconnect_timeout)
    }

    /// Creates an inactive queue reading limits from an external policy.
    pub fn with_policy(
        policy: Arc<dyn QueuePolicy>,
        scheduler: Arc<TickScheduler>,
        disconnect_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                policy,
                scheduler,
                disconnect_timeout,
                queues: QueueSet::new(),
                active: AtomicBool::new(false),
                binding: Mutex::new(Binding {
                    connection: None,
                    registration: None,
                }),
                metrics: Metrics::new(),
            }),
        }
    }

    /// Binds the queue to `connection` and starts its recurring tick.
    ///
    /// No-op while already active.
    pub fn activate(&self, connection: Arc<dyn PeerConnection<M>>) {
        let mut binding = self.inner.binding.lock();
        if self.inner.active.load(Ordering::Acquire) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let registration = self.inner.scheduler.schedule(move || {
            let Some(inner) = weak.upgrade() else {
                return ControlFlow::Break(());
            };
            if let Err(e) = inner.tick() {
                error!(error = %e, "[qc-18] Exception in message queue tick");
            }
            ControlFlow::Continue(())
        });

        binding.connection = Some(connection);
        binding.registration = Some(registration);
        self.inner.active.store(true, Ordering::Release);
        debug!("[qc-18] Message queue activated");
    }

    /// Stops the recurring tick. The link itself stays open.
    ///
    /// No-op while already inactive.
    pub fn close(&self) {
        let mut binding = self.inner.binding.lock();
        self.inner.deactivate(&mut binding);
    }

    /// Whether the queue is bound and ticking.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// True iff all three queues are empty.
    pub fn is_idle(&self) -> bool {
        self.inner.queues.is_empty()
    }

    /// Queues `message` for sending and returns the queue it joined.
    ///
    /// When any queue has reached the configured ceiling nothing is admitted
    /// and the connection is disconnected with [`ReasonCode::BadPeer`]; the
    /// reason-code flush runs on the scheduler so this call never waits.
    pub fn send_message(&self, message: M) -> Result<QueueKind> {
        let inner = &self.inner;
        if !inner.active.load(Ordering::Acquire) {
            return Err(MessageQueueError::Inactive);
        }

        let max = inner.policy.max_queue_size();
        if let Some((kind, size)) = inner.queues.saturated(max) {
            warn!(queue = %kind, size, max, "[qc-18] Outbound queue full, dropping peer");
            inner.metrics.record_rejected();
            self.disconnect_in_background(ReasonCode::BadPeer);
            return Err(MessageQueueError::QueueFull { kind, size, max });
        }

        let kind = QueueKind::classify(&message, inner.policy.is_prioritized(message.code()));
        inner.queues.push(kind, message);
        Ok(kind)
    }

    /// Correlates an inbound message with the head of the requests queue.
    ///
    /// Only the head is considered. On a match the head is marked answered
    /// and returned; it is removed by the next tick.
    pub fn received_message(&self, message: &M) -> Option<Arc<MessageRecord<M>>> {
        let head = self.inner.queues.request_head()?;
        let expected = head.message().response_code()?;
        if message.code() != expected {
            return None;
        }

        head.answer();
        self.inner.metrics.record_answered();
        trace!(code = ?expected, "[qc-18] Request answered");
        Some(head)
    }

    /// Runs one scheduling cycle. Normally called by the scheduler.
    pub fn tick(&self) -> Result<TickReport> {
        self.inner.tick()
    }

    /// Stops the tick, sends `reason` to the peer and closes the link.
    ///
    /// Waits at most the configured disconnect timeout for the reason code to
    /// flush. The connection is closed on every path, including when this
    /// future is dropped mid-wait.
    pub async fn disconnect(&self, reason: ReasonCode) {
        if let Some(guard) = self.inner.begin_disconnect(reason) {
            flush_and_close(guard, reason, self.inner.disconnect_timeout).await;
        }
    }

    /// Same as [`disconnect`](Self::disconnect), with the flush running on
    /// the scheduler. The queue is inactive when this returns.
    ///
    /// The link is closed even if the flush task never runs, e.g. when the
    /// scheduler's runtime has shut down.
    pub fn disconnect_in_background(&self, reason: ReasonCode) {
        if let Some(guard) = self.inner.begin_disconnect(reason) {
            let timeout = self.inner.disconnect_timeout;
            self.inner
                .scheduler
                .spawn(flush_and_close(guard, reason, timeout));
        }
    }

    /// Current length of each queue.
    pub fn stats(&self) -> QueueStats {
        self.inner.queues.stats()
    }

    /// Snapshot of this queue's counters.
    pub fn metrics(&self) -> QueueMetrics {
        self.inner.metrics.snapshot()
    }
}

impl<M: Message> Inner<M> {
    /// Marks inactive and cancels the tick.
    fn deactivate(&self, binding: &mut Binding<M>) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registration) = binding.registration.take() {
            registration.cancel();
        }
        debug!("[qc-18] Message queue closed");
    }

    /// Deactivates and releases the connection for the reason-code handshake.
    ///
    /// The connection comes back wrapped in a guard that closes it on drop.
    fn begin_disconnect(&self, reason: ReasonCode) -> Option<CloseOnDrop<M>> {
        debug!(?reason, "[qc-18] Disconnect");

        let mut binding = self.binding.lock();
        self.deactivate(&mut binding);
        let Some(connection) = binding.connection.take() else {
            debug!("[qc-18] No connection to disconnect");
            return None;
        };
        self.metrics.record_disconnect();
        Some(CloseOnDrop(connection))
    }

    fn tick(&self) -> Result<TickReport> {
        let mut report = TickReport::default();
        let connection = {
            // Deactivation happens under this lock, so active implies bound.
            let binding = self.binding.lock();
            if !self.active.load(Ordering::Acquire) {
                return Ok(report);
            }
            match binding.connection.clone() {
                Some(connection) => connection,
                None => return Ok(report),
            }
        };

        if self.queues.reap_answered().is_some() {
            self.metrics.record_reaped();
            report.reaped = true;
        }

        // A refused response write does not hold back the request step.
        let mut response_result = Ok(());
        if let Some((kind, record)) = self.queues.pop_response() {
            response_result = self.write(connection.as_ref(), &record);
            if response_result.is_ok() {
                report.written = Some(kind);
            }
        }

        if let Some(record) = self.queues.request_head() {
            if !record.is_sent() {
                // Stamped even when the transport refuses: requests go out once.
                let written = self.write(connection.as_ref(), &record);
                record.mark_sent();
                if let Err(e) = written {
                    response_result?;
                    return Err(e);
                }
                report.request_sent = true;
            }
        }

        response_result.map(|()| report)
    }

    fn write(&self, connection: &dyn PeerConnection<M>, record: &MessageRecord<M>) -> Result<()> {
        trace!(message = ?record.message(), "[qc-18] Wiring message");
        // Delivery failures surface through the transport, not the ack.
        let _ack = connection.write(Arc::clone(record.message()))?;
        self.metrics.record_written();
        Ok(())
    }
}

/// Closes the wrapped connection when dropped.
struct CloseOnDrop<M>(Arc<dyn PeerConnection<M>>);

impl<M> Drop for CloseOnDrop<M> {
    fn drop(&mut self) {
        self.0.close();
    }
}

async fn flush_and_close<M: Message>(
    guard: CloseOnDrop<M>,
    reason: ReasonCode,
    timeout: Duration,
) {
    match guard.0.write(Arc::new(M::disconnect(reason))) {
        Ok(ack) => match tokio::time::timeout(timeout, ack).await {
            Ok(Ok(Ok(()))) => debug!(?reason, "[qc-18] Disconnect reason flushed"),
            Ok(Ok(Err(e))) => warn!(?reason, error = %e, "[qc-18] Disconnect reason write failed"),
            Ok(Err(_)) => warn!(?reason, "[qc-18] Disconnect reason write interrupted"),
            Err(_) => warn!(
                ?reason,
                timeout_ms = timeout.as_millis() as u64,
                "[qc-18] Disconnect reason flush timed out"
            ),
        },
        Err(e) => warn!(?reason, error = %e, "[qc-18] Disconnect reason write rejected"),
    }

    drop(guard);
}

impl<M: Message> PeerMessageQueue<M> for MessageQueue<M> {
    fn send_message(&self, message: M) -> Result<QueueKind> {
        MessageQueue::send_message(self, message)
    }

    fn received_message(&self, message: &M) -> Option<Arc<MessageRecord<M>>> {
        MessageQueue::received_message(self, message)
    }

    fn is_idle(&self) -> bool {
        MessageQueue::is_idle(self)
    }

    fn close(&self) {
        MessageQueue::close(self)
    }
}

impl<M> std::fmt::Debug for MessageQueue<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("active", &self.inner.active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
