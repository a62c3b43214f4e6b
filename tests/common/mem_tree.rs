//! A simple, volatile, in-memory implementation of [`StateTree`].
//!
//! The "Merkleization" is intentionally naive: the root is a single hash over the sorted
//! key-value entries. It satisfies the contract the ordering core relies on: equal content gives
//! equal roots, staged derivations leave the original untouched, and commit atomically replaces
//! the durable state.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use cosipbft_rs::tree::StateTree;
use cosipbft_rs::types::basic::{Digest, TreeUpdates};
use sha2::{Digest as _, Sha256};

#[derive(Clone)]
pub(crate) struct MemTree {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    durable: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemTree {
    /// Create a new, empty `MemTree`.
    pub(crate) fn new() -> MemTree {
        MemTree {
            entries: BTreeMap::new(),
            durable: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// The last committed value at a key, independent of any staged derivation.
    pub(crate) fn durable_value(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.durable.lock().unwrap().get(key).cloned()
    }
}

impl StateTree for MemTree {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn root(&self) -> Digest {
        let mut hasher = Sha256::new();
        for (key, value) in &self.entries {
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value);
        }
        Digest::new(hasher.finalize().into())
    }

    fn stage(&self, updates: &TreeUpdates) -> MemTree {
        let mut entries = self.entries.clone();
        for (key, value) in updates.writes() {
            entries.insert(key.clone(), value.clone());
        }
        for key in updates.removals() {
            entries.remove(key);
        }
        MemTree {
            entries,
            durable: Arc::clone(&self.durable),
        }
    }

    fn commit(&mut self) {
        *self.durable.lock().unwrap() = self.entries.clone();
    }
}
