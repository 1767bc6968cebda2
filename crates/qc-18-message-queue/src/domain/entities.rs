//! # Core Domain Entities
//!
//! - [`MessageCode`]: one-byte identifier of a p2p message kind
//! - [`ReasonCode`]: cause carried by a `Disconnect` control message
//! - [`QueueKind`]: which of the three outbound queues a message belongs to
//! - [`Message`]: what the queue needs to know about an outbound payload

use serde::Deserialize;
use std::fmt;

/// One-byte p2p message code.
///
/// Codes are grouped by range: `0x0_` for the peer handshake and liveness
/// traffic, `0x3_` for block sync and `0x4_` for BFT consensus traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCode {
    Disconnect,
    Hello,
    World,
    Ping,
    Pong,
    GetNodes,
    Nodes,
    Transaction,
    GetBlock,
    Block,
    GetBlockHeader,
    BlockHeader,
    BftNewHeight,
    BftNewView,
    BftProposal,
    BftVote,
}

impl MessageCode {
    /// Wire value of this code.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Disconnect => 0x00,
            Self::Hello => 0x01,
            Self::World => 0x02,
            Self::Ping => 0x03,
            Self::Pong => 0x04,
            Self::GetNodes => 0x05,
            Self::Nodes => 0x06,
            Self::Transaction => 0x07,
            Self::GetBlock => 0x31,
            Self::Block => 0x32,
            Self::GetBlockHeader => 0x33,
            Self::BlockHeader => 0x34,
            Self::BftNewHeight => 0x40,
            Self::BftNewView => 0x41,
            Self::BftProposal => 0x42,
            Self::BftVote => 0x43,
        }
    }

    /// Parses a wire value. Returns `None` for unknown codes.
    pub fn from_u8(value: u8) -> Option<Self> {
        let code = match value {
            0x00 => Self::Disconnect,
            0x01 => Self::Hello,
            0x02 => Self::World,
            0x03 => Self::Ping,
            0x04 => Self::Pong,
            0x05 => Self::GetNodes,
            0x06 => Self::Nodes,
            0x07 => Self::Transaction,
            0x31 => Self::GetBlock,
            0x32 => Self::Block,
            0x33 => Self::GetBlockHeader,
            0x34 => Self::BlockHeader,
            0x40 => Self::BftNewHeight,
            0x41 => Self::BftNewView,
            0x42 => Self::BftProposal,
            0x43 => Self::BftVote,
            _ => return None,
        };
        Some(code)
    }

    /// BFT consensus traffic, prioritized by default.
    pub fn is_bft(self) -> bool {
        matches!(
            self,
            Self::BftNewHeight | Self::BftNewView | Self::BftProposal | Self::BftVote
        )
    }
}

/// Reason a connection is being severed.
///
/// Sent to the peer in a `Disconnect` control message immediately before the
/// link is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    /// Peer is on a different network
    BadNetwork,
    /// Peer runs an incompatible protocol version
    BadNetworkVersion,
    /// Connection slots exhausted
    TooManyPeers,
    /// Handshake failed verification
    InvalidHandshake,
    /// Peer id already connected
    DuplicatedPeerId,
    /// Peer's inbound message queue overflowed
    MessageQueueFull,
    /// Too many validators behind one IP
    ValidatorIpLimited,
    /// Handshake already in progress
    HandshakeExists,
    /// Peer misbehaved (protocol violation, outbound backpressure)
    BadPeer,
}

impl ReasonCode {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::BadNetwork => 0x00,
            Self::BadNetworkVersion => 0x01,
            Self::TooManyPeers => 0x02,
            Self::InvalidHandshake => 0x03,
            Self::DuplicatedPeerId => 0x04,
            Self::MessageQueueFull => 0x05,
            Self::ValidatorIpLimited => 0x06,
            Self::HandshakeExists => 0x07,
            Self::BadPeer => 0x08,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        let reason = match value {
            0x00 => Self::BadNetwork,
            0x01 => Self::BadNetworkVersion,
            0x02 => Self::TooManyPeers,
            0x03 => Self::InvalidHandshake,
            0x04 => Self::DuplicatedPeerId,
            0x05 => Self::MessageQueueFull,
            0x06 => Self::ValidatorIpLimited,
            0x07 => Self::HandshakeExists,
            0x08 => Self::BadPeer,
            _ => return None,
        };
        Some(reason)
    }
}

/// The three outbound queues of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Messages awaiting a response (head-of-line correlated)
    Requests,
    /// Fire-and-forget, normal priority
    Responses,
    /// Fire-and-forget, preempts `Responses`
    PrioritizedResponses,
}

impl QueueKind {
    /// Picks the queue for `message`.
    ///
    /// A declared response code always wins; otherwise `prioritized` decides
    /// between the two fire-and-forget queues.
    pub fn classify<M: Message>(message: &M, prioritized: bool) -> Self {
        if message.response_code().is_some() {
            Self::Requests
        } else if prioritized {
            Self::PrioritizedResponses
        } else {
            Self::Responses
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requests => write!(f, "requests"),
            Self::Responses => write!(f, "responses"),
            Self::PrioritizedResponses => write!(f, "prioritized-responses"),
        }
    }
}

/// An outbound p2p message as seen by the queue.
///
/// Payload encoding belongs to the protocol layer; the queue only needs the
/// message code, the code of the expected answer (if any), and a way to build
/// the disconnect control message.
pub trait Message: fmt::Debug + Send + Sync + 'static {
    /// Code of this message.
    fn code(&self) -> MessageCode;

    /// Code of the message that answers this one, `None` for fire-and-forget.
    fn response_code(&self) -> Option<MessageCode>;

    /// Builds the control message announcing a disconnect.
    fn disconnect(reason: ReasonCode) -> Self
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Probe(Option<MessageCode>);

    impl Message for Probe {
        fn code(&self) -> MessageCode {
            MessageCode::Ping
        }

        fn response_code(&self) -> Option<MessageCode> {
            self.0
        }

        fn disconnect(_reason: ReasonCode) -> Self {
            Probe(None)
        }
    }

    #[test]
    fn test_message_code_wire_values() {
        for value in 0..=u8::MAX {
            if let Some(code) = MessageCode::from_u8(value) {
                assert_eq!(code.as_u8(), value);
            }
        }
        assert_eq!(MessageCode::from_u8(0xFF), None);
    }

    #[test]
    fn test_reason_code_wire_values() {
        assert_eq!(ReasonCode::BadPeer.as_u8(), 0x08);
        assert_eq!(ReasonCode::from_u8(0x08), Some(ReasonCode::BadPeer));
        assert_eq!(ReasonCode::from_u8(0x09), None);
    }

    #[test]
    fn test_classify_request_wins_over_priority() {
        let request = Probe(Some(MessageCode::Pong));
        assert_eq!(QueueKind::classify(&request, true), QueueKind::Requests);
    }

    #[test]
    fn test_classify_fire_and_forget() {
        let push = Probe(None);
        assert_eq!(
            QueueKind::classify(&push, true),
            QueueKind::PrioritizedResponses
        );
        assert_eq!(QueueKind::classify(&push, false), QueueKind::Responses);
    }

    #[test]
    fn test_bft_codes() {
        assert!(MessageCode::BftVote.is_bft());
        assert!(!MessageCode::Block.is_bft());
    }
}
