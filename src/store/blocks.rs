/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`BlockStore`]: a durable, append-only log of finalized [`BlockLink`]s, indexed by block
//! index and by block digest, with a change watcher delivering newly appended links to all live
//! subscribers.
//!
//! ## State variables
//!
//! The store keeps its state in tuples at key prefixes of the backing KV store:
//! - **Links** ([`BlockIndex`] -> [`BlockLink`]).
//! - **Index by Digest** ([`Digest`] -> [`BlockIndex`]).
//! - **Length** (the number of stored links).
//!
//! ## Invariants
//!
//! Links occupy indices 0..length with no gaps, each link's backlink equals the digest of its
//! predecessor, and a stored link is never mutated. For any two replicas that both hold index
//! `i`, the links are bit-equal, since both satisfy the same chain of digest equations.
//!
//! All writes go through the single writer holding the state-machine lock; reads may happen
//! concurrently from any thread.

use borsh::{BorshDeserialize, BorshSerialize};
use std::sync::mpsc::Receiver;

use crate::types::basic::{BlockIndex, Digest};
use crate::types::block::BlockLink;
use crate::watcher::Watcher;

use super::pluggables::{KVStore, WriteBatch};
use super::{combine, StoreError};

/// An append-only log of finalized block links.
pub struct BlockStore<K: KVStore> {
    kv: K,
    watcher: Watcher<BlockLink>,
}

impl<K: KVStore> BlockStore<K> {
    pub fn new(kv: K) -> BlockStore<K> {
        Self {
            kv,
            watcher: Watcher::new(),
        }
    }

    /// The number of stored links, which is also the index the next link must carry.
    pub fn len(&self) -> u64 {
        match self.kv.get(&paths::LEN) {
            Some(bytes) => u64::deserialize(&mut bytes.as_slice()).unwrap_or(0),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The link at the given index.
    pub fn get(&self, index: BlockIndex) -> Option<BlockLink> {
        let bytes = self.kv.get(&combine(&paths::LINKS, &index.to_le_bytes()))?;
        BlockLink::deserialize(&mut bytes.as_slice()).ok()
    }

    /// The link whose block has the given digest.
    pub fn get_by_digest(&self, digest: &Digest) -> Option<BlockLink> {
        let bytes = self
            .kv
            .get(&combine(&paths::INDEX_BY_DIGEST, &digest.bytes()))?;
        let index = BlockIndex::deserialize(&mut bytes.as_slice()).ok()?;
        self.get(index)
    }

    /// The most recently appended link.
    pub fn last(&self) -> Option<BlockLink> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.get(BlockIndex::new(len - 1))
    }

    /// Append a link to the log and deliver it to all watchers.
    ///
    /// Fails with [`StoreError::AlreadyFinal`] if a link at the link's index already exists, and
    /// with [`StoreError::BadLink`] if the link does not extend the head: its index must equal
    /// [`len`](Self::len) and its backlink must equal the head's digest (or zero for the first
    /// link).
    pub fn store(&mut self, link: BlockLink) -> Result<(), StoreError> {
        let len = self.len();

        if link.block.index.int() < len {
            return Err(StoreError::AlreadyFinal);
        }
        if link.block.index.int() != len {
            return Err(StoreError::BadLink);
        }

        let expected_backlink = match self.last() {
            Some(head) => head.block.hash,
            None => Digest::zero(),
        };
        if link.block.backlink != expected_backlink {
            return Err(StoreError::BadLink);
        }

        let mut wb = K::WriteBatch::new();
        wb.set(
            &combine(&paths::LINKS, &link.block.index.to_le_bytes()),
            &link.try_to_vec().unwrap(),
        );
        wb.set(
            &combine(&paths::INDEX_BY_DIGEST, &link.block.hash.bytes()),
            &link.block.index.try_to_vec().unwrap(),
        );
        wb.set(&paths::LEN, &(len + 1).try_to_vec().unwrap());
        self.kv.write(wb);

        self.watcher.notify(link);

        Ok(())
    }

    /// Subscribe to appended links. The returned receiver yields every link appended after this
    /// call, in append order, until it is dropped. History is not replayed.
    pub fn watch(&self) -> Receiver<BlockLink> {
        self.watcher.subscribe()
    }
}

impl<K: KVStore> Clone for BlockStore<K> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
            watcher: self.watcher.clone(),
        }
    }
}

mod paths {
    pub(super) const LINKS: [u8; 1] = [0];
    pub(super) const INDEX_BY_DIGEST: [u8; 1] = [1];
    pub(super) const LEN: [u8; 1] = [2];
}
