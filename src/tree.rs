/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [Trait definition](StateTree) for the pluggable Merkleized state tree, and the
//! [`TreeCache`] that tracks the tree committed by the latest finalized block.
//!
//! The tree implementation is provided by the library user. The ordering core only relies on the
//! contract fixed here:
//! 1. [`StateTree::stage`] derives a new, uncommitted tree by applying an update set. The staged
//!    tree exposes the root it would have once committed, but is invisible to readers of the
//!    original.
//! 2. [`StateTree::commit`] atomically persists a staged tree.
//! 3. Reading a key from a committed tree returns the last committed value.
//!
//! Staged trees are plain values: dropping one on an error path discards the stage, which is how
//! every failing prepare unwinds without leaving partial state behind.
//!
//! ## The reserved roster key
//!
//! The value at [`ROSTER_KEY`], the all-zero 32-byte key, is the serialized roster in force after
//! the owning tree's block. Each block commit may therefore rotate the collective authority.

use std::sync::{Arc, Mutex};

use crate::types::basic::{Digest, TreeUpdates};
use crate::types::roster::{Roster, RosterError};

/// The reserved state-tree key holding the serialized current roster.
pub const ROSTER_KEY: [u8; 32] = [0u8; 32];

/// A Merkleized key→value store producing a root digest after each commit.
pub trait StateTree: Clone + Send + 'static {
    /// Read the value at a key. On a committed tree this returns the last committed value; on a
    /// staged tree it reflects the staged updates.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// The root digest of the tree.
    fn root(&self) -> Digest;

    /// Derive a staged (uncommitted) tree by applying the given updates. The receiver is left
    /// untouched.
    fn stage(&self, updates: &TreeUpdates) -> Self;

    /// Atomically persist a staged tree.
    fn commit(&mut self);
}

/// Shared handle to the tree committed by the latest finalized block.
///
/// All mutations go through the single writer holding the state-machine lock; readers may
/// [`get`](TreeCache::get) a committed snapshot at any time.
pub struct TreeCache<T: StateTree> {
    current: Arc<Mutex<T>>,
}

impl<T: StateTree> TreeCache<T> {
    pub fn new(tree: T) -> TreeCache<T> {
        Self {
            current: Arc::new(Mutex::new(tree)),
        }
    }

    /// The current committed tree.
    pub fn get(&self) -> T {
        self.current.lock().unwrap().clone()
    }

    /// Install a newly committed tree. Must only be called after a successful
    /// [`commit`](StateTree::commit) on the argument.
    pub fn set(&self, tree: T) {
        *self.current.lock().unwrap() = tree;
    }
}

impl<T: StateTree> Clone for TreeCache<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

/// Decode the roster committed in the given tree from the reserved key.
pub fn read_roster<T: StateTree>(tree: &T) -> Result<Roster, RosterError> {
    let value = tree.get(&ROSTER_KEY).ok_or(RosterError::MissingValue)?;
    Roster::decode(&value)
}
