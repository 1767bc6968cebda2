//! The three per-connection outbound queues.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{Message, MessageRecord, QueueKind};

type RecordQueue<M> = Mutex<VecDeque<Arc<MessageRecord<M>>>>;

/// Snapshot of queue lengths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub requests: usize,
    pub responses: usize,
    pub prioritized_responses: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.requests + self.responses + self.prioritized_responses
    }
}

/// Requests, responses and prioritized responses of one connection.
///
/// Each queue is guarded by its own lock, held only for the push, peek or pop
/// itself. A message instance lives in exactly one queue.
#[derive(Debug)]
pub struct QueueSet<M> {
    requests: RecordQueue<M>,
    responses: RecordQueue<M>,
    prioritized_responses: RecordQueue<M>,
}

impl<M: Message> Default for QueueSet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> QueueSet<M> {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(VecDeque::new()),
            responses: Mutex::new(VecDeque::new()),
            prioritized_responses: Mutex::new(VecDeque::new()),
        }
    }

    fn queue(&self, kind: QueueKind) -> &RecordQueue<M> {
        match kind {
            QueueKind::Requests => &self.requests,
            QueueKind::Responses => &self.responses,
            QueueKind::PrioritizedResponses => &self.prioritized_responses,
        }
    }

    /// Appends a fresh record for `message` to the tail of `kind`.
    pub fn push(&self, kind: QueueKind, message: M) -> Arc<MessageRecord<M>> {
        let record = Arc::new(MessageRecord::new(message));
        self.queue(kind).lock().push_back(Arc::clone(&record));
        record
    }

    pub fn len(&self, kind: QueueKind) -> usize {
        self.queue(kind).lock().len()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            requests: self.len(QueueKind::Requests),
            responses: self.len(QueueKind::Responses),
            prioritized_responses: self.len(QueueKind::PrioritizedResponses),
        }
    }

    /// True iff all three queues are empty.
    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
            && self.responses.lock().is_empty()
            && self.prioritized_responses.lock().is_empty()
    }

    /// First queue whose length has reached `max`, with that length.
    pub fn saturated(&self, max: usize) -> Option<(QueueKind, usize)> {
        [
            QueueKind::Requests,
            QueueKind::Responses,
            QueueKind::PrioritizedResponses,
        ]
        .into_iter()
        .map(|kind| (kind, self.len(kind)))
        .find(|(_, len)| *len >= max)
    }

    /// Head of the requests queue, left in place.
    pub fn request_head(&self) -> Option<Arc<MessageRecord<M>>> {
        self.requests.lock().front().cloned()
    }

    /// Removes the requests head if, and only if, it has been answered.
    pub fn reap_answered(&self) -> Option<Arc<MessageRecord<M>>> {
        let mut requests = self.requests.lock();
        if requests.front().is_some_and(|head| head.is_answered()) {
            requests.pop_front()
        } else {
            None
        }
    }

    /// Dequeues the next fire-and-forget record, prioritized first.
    pub fn pop_response(&self) -> Option<(QueueKind, Arc<MessageRecord<M>>)> {
        if let Some(record) = self.prioritized_responses.lock().pop_front() {
            return Some((QueueKind::PrioritizedResponses, record));
        }
        self.responses
            .lock()
            .pop_front()
            .map(|record| (QueueKind::Responses, record))
    }
}
