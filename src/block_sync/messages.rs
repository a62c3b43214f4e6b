/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between replicas as part of the block sync
//! protocol.
//!
//! The protocol defines two categories of messages:
//! 1. Request/response pairs ([`BlockSyncRequest`], [`BlockSyncResponse`]) exchanged between a
//!    sync client and a sync server while the client is catching up. Responses are streamed: the
//!    server sends one response per link, in ascending index order.
//! 2. Advertisements ([`BlockSyncAdvertise`]) periodically broadcast by sync servers, announcing
//!    the head index they can serve. Advertisements feed every replica's view of the highest
//!    block index observed anywhere.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::basic::BlockIndex;
use crate::types::block::BlockLink;

#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub enum BlockSyncMessage {
    BlockSyncRequest(BlockSyncRequest),
    BlockSyncResponse(BlockSyncResponse),
    BlockSyncAdvertise(BlockSyncAdvertise),
}

/// Sync request sent by a sync client to a sync server, asking for the links in the half-open
/// index range `[from, to)`.
#[derive(Clone, Copy, BorshSerialize, BorshDeserialize)]
pub struct BlockSyncRequest {
    pub from: BlockIndex,
    pub to: BlockIndex,
}

/// One element of a sync server's streamed answer to a [`BlockSyncRequest`]: a single finalized
/// link. The client verifies the link's collective signatures before installing it.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct BlockSyncResponse {
    pub link: BlockLink,
}

/// Broadcast by a sync server to announce the highest block index it holds.
#[derive(Clone, Copy, BorshSerialize, BorshDeserialize)]
pub struct BlockSyncAdvertise {
    pub latest: BlockIndex,
}
