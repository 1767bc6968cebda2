//! P2P message set carried over a peer link.
//!
//! Payloads are kept as already-encoded bytes or plain numbers; framing and
//! encoding belong to the transport.

use crate::domain::{Message, MessageCode, ReasonCode};

/// Messages exchanged with a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetMessage {
    /// Control message sent right before closing the link
    Disconnect { reason: ReasonCode },
    /// Handshake initiation
    Hello { peer_id: [u8; 20], height: u64 },
    /// Handshake reply
    World { peer_id: [u8; 20], height: u64 },
    Ping { timestamp: u64 },
    Pong { timestamp: u64 },
    GetNodes,
    Nodes { addresses: Vec<String> },
    /// Transaction gossip
    Transaction { data: Vec<u8> },
    GetBlock { number: u64 },
    Block { number: u64, data: Vec<u8> },
    GetBlockHeader { number: u64 },
    BlockHeader { number: u64, data: Vec<u8> },
    BftNewHeight { height: u64 },
    BftNewView { height: u64, view: u32 },
    BftProposal { height: u64, view: u32, data: Vec<u8> },
    BftVote { height: u64, view: u32 },
}

impl Message for NetMessage {
    fn code(&self) -> MessageCode {
        match self {
            Self::Disconnect { .. } => MessageCode::Disconnect,
            Self::Hello { .. } => MessageCode::Hello,
            Self::World { .. } => MessageCode::World,
            Self::Ping { .. } => MessageCode::Ping,
            Self::Pong { .. } => MessageCode::Pong,
            Self::GetNodes => MessageCode::GetNodes,
            Self::Nodes { .. } => MessageCode::Nodes,
            Self::Transaction { .. } => MessageCode::Transaction,
            Self::GetBlock { .. } => MessageCode::GetBlock,
            Self::Block { .. } => MessageCode::Block,
            Self::GetBlockHeader { .. } => MessageCode::GetBlockHeader,
            Self::BlockHeader { .. } => MessageCode::BlockHeader,
            Self::BftNewHeight { .. } => MessageCode::BftNewHeight,
            Self::BftNewView { .. } => MessageCode::BftNewView,
            Self::BftProposal { .. } => MessageCode::BftProposal,
            Self::BftVote { .. } => MessageCode::BftVote,
        }
    }

    fn response_code(&self) -> Option<MessageCode> {
        match self {
            Self::Hello { .. } => Some(MessageCode::World),
            Self::Ping { .. } => Some(MessageCode::Pong),
            Self::GetNodes => Some(MessageCode::Nodes),
            Self::GetBlock { .. } => Some(MessageCode::Block),
            Self::GetBlockHeader { .. } => Some(MessageCode::BlockHeader),
            _ => None,
        }
    }

    fn disconnect(reason: ReasonCode) -> Self {
        Self::Disconnect { reason }
    }
}
