//! Error types for the outbound message queue

use crate::domain::QueueKind;
use thiserror::Error;

/// Result type alias for message queue operations
pub type Result<T> = std::result::Result<T, MessageQueueError>;

/// Errors surfaced by the message queue
#[derive(Debug, Error)]
pub enum MessageQueueError {
    /// The queue is not bound to a live connection
    #[error("Message queue is not active")]
    Inactive,

    /// A queue reached its ceiling; the connection has been condemned
    #[error("Queue {kind} is full: {size} messages (max: {max})")]
    QueueFull {
        /// The saturated queue
        kind: QueueKind,
        /// Current size
        size: usize,
        /// Configured ceiling
        max: usize,
    },

    /// The transport rejected a write
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The tick scheduler could not be started or used
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

/// Errors reported by a connection handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The underlying link is closed
    #[error("connection closed")]
    Closed,

    /// The write was refused by the transport
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a config
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed values are out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
