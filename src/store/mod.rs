/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Persistent storage for the ordered chain: the append-only [`BlockStore`](blocks::BlockStore)
//! and the singleton [`GenesisStore`](genesis::GenesisStore), both persisted through a key-value
//! store of the library user's own choosing (any type implementing
//! [`KVStore`](pluggables::KVStore)).

pub mod blocks;

pub mod genesis;

pub mod pluggables;

/// Takes references to two byteslices and returns a vector containing the bytes of the first one,
/// and then the bytes of the second one.
pub(crate) fn combine(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}

/// Failure modes of the stores.
#[derive(Debug, PartialEq, Eq)]
pub enum StoreError {
    /// A link is already finalized at the index being stored to.
    AlreadyFinal,

    /// The link being stored does not extend the head of the chain: its index is not the current
    /// length, or its backlink does not match the head's digest.
    BadLink,

    /// The genesis slot is already occupied.
    AlreadySet,

    /// A stored value failed to deserialize. The store is corrupted.
    Corrupted,
}
