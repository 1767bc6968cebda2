//! # Peer Message Queue Subsystem (qc-18)
//!
//! Outbound message scheduling for a single peer connection. Every connected
//! peer owns one [`MessageQueue`]; a process-wide [`TickScheduler`] drives all
//! of them from a small shared worker pool.
//!
//! ## Architecture Role
//!
//! ```text
//! [Sync / Consensus / Gossip] ──send_message──→ [MessageQueue (per peer)]
//!                                                      │ tick (1 ms)
//! [Peer read loop] ──received_message──────────────────┤
//!                                                      ↓
//!                                              [PeerConnection] → wire
//! ```
//!
//! ## Queues
//!
//! - **requests**: messages expecting an answer. Only the head is ever in
//!   flight and only the head is matched against inbound traffic.
//! - **prioritized responses**: fire-and-forget codes named in config
//!   (BFT traffic by default), always sent before normal responses.
//! - **responses**: all other fire-and-forget traffic.
//!
//! ## Backpressure
//!
//! When any queue reaches `max_queue_size` the next enqueue is refused and the
//! peer is disconnected with [`ReasonCode::BadPeer`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use qc_18_message_queue::{
//!     p2p::NetMessage, MessageQueue, MessageQueueConfig, QueueKind, TickScheduler,
//! };
//!
//! let scheduler = TickScheduler::shared().unwrap();
//! let queue: MessageQueue<NetMessage> =
//!     MessageQueue::new(MessageQueueConfig::default(), scheduler);
//!
//! // Nothing can be queued before a connection is bound.
//! assert!(queue.send_message(NetMessage::GetNodes).is_err());
//! assert!(queue.is_idle());
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod p2p;
pub mod ports;
pub mod scheduler;
pub mod service;

/// Test utilities (RecordingConnection)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::MessageQueueConfig;
pub use domain::{Message, MessageCode, MessageRecord, QueueKind, QueueSet, QueueStats, ReasonCode};
pub use error::{ConfigError, MessageQueueError, Result, TransportError};
pub use metrics::QueueMetrics;
pub use ports::{PeerConnection, PeerMessageQueue, QueuePolicy, WriteAck};
pub use scheduler::{TickRegistration, TickScheduler};
pub use service::{MessageQueue, TickReport};
