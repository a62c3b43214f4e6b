/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for [`Block`], [`Genesis`], and [`BlockLink`]: the building material of the
//! ordered chain.
//!
//! A block's digest is a hash over its header fields: index, backlink, tree root, and the payload
//! fingerprint. The payload itself does not enter the digest directly; its fingerprint stands in
//! for it, so the digest can be recomputed without the (potentially large) payload at hand.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest as _, Sha256};

use super::basic::{BlockIndex, Data, Digest};
use super::certificate::CollectiveSignature;
use super::roster::Roster;

/// A proposed or finalized block. Blocks are immutable: every field is fixed at construction and
/// the digest is computed then.
#[derive(Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Block {
    /// Position of the block in the chain. The genesis block has index 0.
    pub index: BlockIndex,

    /// Digest of this block's header, over (index, backlink, tree_root, data_hash).
    pub hash: Digest,

    /// Digest of the parent block's header. Zero for genesis.
    pub backlink: Digest,

    /// Root of the state tree after applying this block's payload.
    pub tree_root: Digest,

    /// Fingerprint of the payload, supplied by the execution engine.
    pub data_hash: Digest,

    /// The payload.
    pub data: Data,
}

impl Block {
    pub fn new(
        index: BlockIndex,
        backlink: Digest,
        tree_root: Digest,
        data_hash: Digest,
        data: Data,
    ) -> Block {
        Block {
            index,
            hash: Block::hash(index, &backlink, &tree_root, &data_hash),
            backlink,
            tree_root,
            data_hash,
            data,
        }
    }

    /// Checks whether the block's stored digest matches a recomputation over its header fields.
    pub fn is_correct(&self) -> bool {
        self.hash == Block::hash(self.index, &self.backlink, &self.tree_root, &self.data_hash)
    }

    fn hash(index: BlockIndex, backlink: &Digest, tree_root: &Digest, data_hash: &Digest) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(index.to_le_bytes());
        hasher.update(backlink.bytes());
        hasher.update(tree_root.bytes());
        hasher.update(data_hash.bytes());
        Digest::new(hasher.finalize().into())
    }
}

/// The bootstrap record: the initial roster and the root of the state tree holding it. Stored in
/// the genesis store's singleton slot, immutable once set.
#[derive(Clone, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct Genesis {
    pub roster: Roster,
    pub root: Digest,
}

impl Genesis {
    pub fn new(roster: Roster, root: Digest) -> Genesis {
        Genesis { roster, root }
    }

    /// The block occupying index 0 of the chain for this genesis: empty payload, zero backlink,
    /// and the genesis tree root.
    pub fn to_block(&self) -> Block {
        Block::new(
            BlockIndex::new(0),
            Digest::zero(),
            self.root,
            Digest::zero(),
            Data::default(),
        )
    }
}

/// A finalized element of the chain: a block together with the collective signatures produced in
/// its prepare and commit phases.
///
/// For every link at index `i > 0`:
/// 1. `block.backlink` equals the digest of the block at index `i - 1`.
/// 2. `prepare_sig` verifies over `block.hash` under the roster active at index `i`.
/// 3. `commit_sig` verifies over the binary encoding of `prepare_sig` under the same roster.
#[derive(Clone, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct BlockLink {
    pub block: Block,
    pub prepare_sig: CollectiveSignature,
    pub commit_sig: CollectiveSignature,
}

impl BlockLink {
    pub fn new(
        block: Block,
        prepare_sig: CollectiveSignature,
        commit_sig: CollectiveSignature,
    ) -> BlockLink {
        BlockLink {
            block,
            prepare_sig,
            commit_sig,
        }
    }

    /// The link for a genesis block. Genesis carries no collective signatures.
    pub fn genesis(block: Block) -> BlockLink {
        BlockLink {
            block,
            prepare_sig: CollectiveSignature::genesis(),
            commit_sig: CollectiveSignature::genesis(),
        }
    }
}
