//! # Domain Layer for the Message Queue
//!
//! Pure queueing logic with no I/O. The service layer drives it from the
//! scheduler tick and from producer/inbound call paths.
//!
//! ## Contents
//!
//! - **entities**: Protocol facts (`MessageCode`, `ReasonCode`, `QueueKind`, `Message`)
//! - **record**: `MessageRecord`, one outbound message plus its transmission state
//! - **queues**: `QueueSet`, the three per-connection FIFO queues

mod entities;
mod queues;
mod record;

pub use entities::*;
pub use queues::*;
pub use record::*;
