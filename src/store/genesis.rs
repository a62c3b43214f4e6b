/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`GenesisStore`]: a singleton slot holding the bootstrap record. Setting it is the
//! bootstrap barrier: until the slot is filled, the processor refuses all consensus messages.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::block::Genesis;

use super::pluggables::{KVStore, WriteBatch};
use super::StoreError;

// The genesis slot shares the KV keyspace with the block store's prefixes, so its path must not
// collide with any of them.
const GENESIS: [u8; 1] = [3];

pub struct GenesisStore<K: KVStore> {
    kv: K,
}

impl<K: KVStore> GenesisStore<K> {
    pub fn new(kv: K) -> GenesisStore<K> {
        Self { kv }
    }

    pub fn exists(&self) -> bool {
        self.kv.get(&GENESIS).is_some()
    }

    pub fn get(&self) -> Option<Genesis> {
        let bytes = self.kv.get(&GENESIS)?;
        Genesis::deserialize(&mut bytes.as_slice()).ok()
    }

    /// Fill the singleton slot. Fails with [`StoreError::AlreadySet`] if a genesis is already
    /// present; the slot is immutable once set.
    pub fn set(&mut self, genesis: &Genesis) -> Result<(), StoreError> {
        if self.exists() {
            return Err(StoreError::AlreadySet);
        }

        let mut wb = K::WriteBatch::new();
        wb.set(&GENESIS, &genesis.try_to_vec().unwrap());
        self.kv.write(wb);

        Ok(())
    }
}

impl<K: KVStore> Clone for GenesisStore<K> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
        }
    }
}
