/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits that the library user's chosen key-value store must implement in order to back the
//! block and genesis stores.
//!
//! Writes are batched and applied atomically: a [`WriteBatch`] collects sets and deletes, and
//! [`KVStore::write`] applies the whole batch or none of it.

pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;

    /// Atomically apply a write batch.
    fn write(&mut self, wb: Self::WriteBatch);
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}
