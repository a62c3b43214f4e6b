/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [Trait definition](App) for the pluggable execution engine: the component that produces block
//! payloads from pending transactions and deterministically turns payloads into state-tree
//! updates.
//!
//! Implementors of `App` are expected to be *deterministic*: [`execute_payload`](App::execute_payload)
//! must evaluate to the same response every time it is called with the same payload over the same
//! tree. Consensus depends on every replica deriving the same staged root from the same block.

use crate::tree::StateTree;
use crate::types::basic::{BlockIndex, Data, Digest, TreeUpdates};
use crate::types::block::Block;

pub trait App<T: StateTree>: Send + 'static {
    /// Called on the leader to assemble the payload of the next block from the transaction pool.
    fn produce_payload(&mut self, request: ProducePayloadRequest<T>) -> ProducePayloadResponse;

    /// Called on every replica during the prepare phase (and during catch-up) to check that a
    /// block's payload is executable, and to compute the tree updates it implies.
    fn execute_payload(&mut self, request: ExecutePayloadRequest<T>) -> ExecutePayloadResponse;
}

/// Request for the execution engine to produce the payload of the block at `index`, reading the
/// committed state from `tree`.
pub struct ProducePayloadRequest<'a, T: StateTree> {
    index: BlockIndex,
    tree: &'a T,
}

impl<'a, T: StateTree> ProducePayloadRequest<'a, T> {
    pub fn new(index: BlockIndex, tree: &'a T) -> ProducePayloadRequest<'a, T> {
        Self { index, tree }
    }

    pub fn index(&self) -> BlockIndex {
        self.index
    }

    pub fn tree(&self) -> &T {
        self.tree
    }
}

/// Response to a [`ProducePayloadRequest`]: the payload, its fingerprint, and the tree updates
/// that executing it over the request's tree produces.
pub struct ProducePayloadResponse {
    pub data: Data,
    pub data_hash: Digest,
    pub updates: TreeUpdates,
}

/// Request for the execution engine to execute the payload of `block` over the committed state
/// read from `tree`.
pub struct ExecutePayloadRequest<'a, T: StateTree> {
    block: &'a Block,
    tree: &'a T,
}

impl<'a, T: StateTree> ExecutePayloadRequest<'a, T> {
    pub fn new(block: &'a Block, tree: &'a T) -> ExecutePayloadRequest<'a, T> {
        Self { block, tree }
    }

    pub fn block(&self) -> &Block {
        self.block
    }

    pub fn tree(&self) -> &T {
        self.tree
    }
}

/// Response to an [`ExecutePayloadRequest`]: either the tree updates the payload produces, or a
/// rejection of the payload.
pub enum ExecutePayloadResponse {
    Valid { updates: TreeUpdates },
    Invalid,
}
