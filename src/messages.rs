/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between replicas.
//!
//! This includes the messages [driving consensus](ConsensusMessage) and those
//! [used in the block sync protocol](crate::block_sync::messages::BlockSyncMessage).
//!
//! Consensus messages reach the processor along two paths:
//! 1. [`BlockMessage`] and [`CommitMessage`] arrive through the collective-signing reactor
//!    ([`Processor::invoke`](crate::processor::Processor::invoke)), which answers with the bytes
//!    the signing module aggregates signatures over.
//! 2. [`GenesisMessage`], [`PropagateGenesis`], [`DoneMessage`], and [`ViewMessage`] arrive as
//!    plain remote procedure calls ([`Processor::process`](crate::processor::Processor::process)).
//!
//! The enums are decoded exhaustively; a variant arriving on the wrong path is reported as
//! unsupported rather than dropped silently, which keeps forward-compatible decoders honest.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::block_sync::messages::{
    BlockSyncAdvertise, BlockSyncMessage, BlockSyncRequest, BlockSyncResponse,
};
use crate::types::basic::{BlockIndex, Digest, LeaderIndex};
use crate::types::block::{Block, Genesis};
use crate::types::certificate::CollectiveSignature;

#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub enum Message {
    ConsensusMessage(ConsensusMessage),
    BlockSyncMessage(BlockSyncMessage),
}

/// A message that serves to advance a block through the prepare, commit, and done phases, or to
/// bootstrap and repair the consensus (genesis propagation, view change).
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub enum ConsensusMessage {
    GenesisMessage(GenesisMessage),
    PropagateGenesis(PropagateGenesis),
    BlockMessage(BlockMessage),
    CommitMessage(CommitMessage),
    DoneMessage(DoneMessage),
    ViewMessage(ViewMessage),
}

/// Request to store the given bootstrap record, addressed to a single replica.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct GenesisMessage {
    pub genesis: Genesis,
}

/// One-shot bootstrap broadcast of the bootstrap record. Re-deliveries are answered with success.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct PropagateGenesis {
    pub genesis: Genesis,
}

/// The leader's candidate block for the prepare phase. `latest` piggybacks the sender's view of
/// the highest block index observed anywhere, so lagging receivers notice they must catch up
/// before evaluating the proposal.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct BlockMessage {
    pub block: Block,
    pub latest: BlockIndex,
}

/// The leader's announcement that the prepare phase for the block with digest `id` produced the
/// given collective signature.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct CommitMessage {
    pub id: Digest,
    pub signature: CollectiveSignature,
}

/// The leader's announcement that the commit phase for the block with digest `id` produced the
/// given collective signature, so the block can be finalized.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct DoneMessage {
    pub id: Digest,
    pub signature: CollectiveSignature,
}

/// A replica's vote to abandon the in-flight proposal with digest `id` and hand leadership to the
/// roster member designated by `leader`.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct ViewMessage {
    pub id: Digest,
    pub leader: LeaderIndex,
}

impl From<ConsensusMessage> for Message {
    fn from(value: ConsensusMessage) -> Self {
        Message::ConsensusMessage(value)
    }
}

impl From<GenesisMessage> for Message {
    fn from(value: GenesisMessage) -> Self {
        Message::ConsensusMessage(ConsensusMessage::GenesisMessage(value))
    }
}

impl From<PropagateGenesis> for Message {
    fn from(value: PropagateGenesis) -> Self {
        Message::ConsensusMessage(ConsensusMessage::PropagateGenesis(value))
    }
}

impl From<BlockMessage> for Message {
    fn from(value: BlockMessage) -> Self {
        Message::ConsensusMessage(ConsensusMessage::BlockMessage(value))
    }
}

impl From<CommitMessage> for Message {
    fn from(value: CommitMessage) -> Self {
        Message::ConsensusMessage(ConsensusMessage::CommitMessage(value))
    }
}

impl From<DoneMessage> for Message {
    fn from(value: DoneMessage) -> Self {
        Message::ConsensusMessage(ConsensusMessage::DoneMessage(value))
    }
}

impl From<ViewMessage> for Message {
    fn from(value: ViewMessage) -> Self {
        Message::ConsensusMessage(ConsensusMessage::ViewMessage(value))
    }
}

impl From<BlockSyncRequest> for Message {
    fn from(value: BlockSyncRequest) -> Self {
        Message::BlockSyncMessage(BlockSyncMessage::BlockSyncRequest(value))
    }
}

impl From<BlockSyncResponse> for Message {
    fn from(value: BlockSyncResponse) -> Self {
        Message::BlockSyncMessage(BlockSyncMessage::BlockSyncResponse(value))
    }
}

impl From<BlockSyncAdvertise> for Message {
    fn from(value: BlockSyncAdvertise) -> Self {
        Message::BlockSyncMessage(BlockSyncMessage::BlockSyncAdvertise(value))
    }
}
