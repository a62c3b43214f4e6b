/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! "Inert" types that are sent around and inspected but have no active behavior. These follow the
//! newtype pattern, and the API for using them is defined in this module.
//!
//! The module also defines [`TreeUpdates`], the write set that executing a block's payload
//! schedules against the state tree.

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    collections::{btree_map, btree_set, BTreeMap, BTreeSet},
    fmt::{self, Debug, Display, Formatter},
    ops::Add,
};

/// Index of a block in the chain. The genesis block has index 0, and indices are assigned without
/// gaps from there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct BlockIndex(u64);

impl BlockIndex {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl Display for BlockIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Add<u64> for BlockIndex {
    type Output = BlockIndex;
    fn add(self, rhs: u64) -> Self::Output {
        BlockIndex::new(self.0.add(rhs))
    }
}

/// A 256-bit content hash, compared by value. Identifies blocks (over their header fields),
/// payloads, and state-tree roots.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The all-zero digest. Serves as the backlink of the genesis block.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An opaque transport endpoint identifier. Addresses are equality-comparable and
/// text-serializable; the networking provider gives them meaning.
#[derive(Clone, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Address(String);

impl Address {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Position of the current leader in the roster. The effective leader is the roster member at
/// `index mod roster.len()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct LeaderIndex(u64);

impl LeaderIndex {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for LeaderIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A scalar signature represented in bytes. Signatures are produced outside this crate (by the
/// collective-signing module or its stand-in) and enter it only to be aggregated and verified.
#[derive(Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

/// Set of signatures, represented as a vector with the size of a given roster.
/// The value at a particular position is either:
/// 1. None: if a valid signature from the roster member at the given position has not been
///    obtained, or
/// 2. Some(signature_bytes): if signature_bytes has been obtained from the roster member at the
///    given position.
#[derive(Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureSet(Vec<Option<SignatureBytes>>);

impl SignatureSet {
    pub(crate) fn new(len: usize) -> Self {
        Self(vec![None; len])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Option<SignatureBytes>> {
        self.0.iter()
    }

    pub fn get(&self, pos: usize) -> &Option<SignatureBytes> {
        &self.0[pos]
    }

    pub(crate) fn set(&mut self, pos: usize, value: Option<SignatureBytes>) {
        self.0[pos] = value
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Payload of a block: an ordered sequence of opaque datums supplied by the execution engine.
#[derive(Clone, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize, Default)]
pub struct Data(Vec<Datum>);

impl Data {
    pub fn new(datum_vec: Vec<Datum>) -> Self {
        Self(datum_vec)
    }

    pub const fn vec(&self) -> &Vec<Datum> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datum> {
        self.0.iter()
    }
}

/// Single datum stored in a block's [`Data`].
#[derive(Clone, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Datum(Vec<u8>);

impl Datum {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> &Vec<u8> {
        &self.0
    }
}

/// The writes that executing a payload schedules against the state tree: keys given a new value,
/// and keys torn out. A key sits on at most one side; scheduling it again moves it over.
///
/// Backed by ordered maps, so walking a `TreeUpdates` visits keys in key order and staging the
/// same updates twice touches the tree identically.
#[derive(Clone, Default, BorshSerialize, BorshDeserialize)]
pub struct TreeUpdates {
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
    removals: BTreeSet<Vec<u8>>,
}

impl TreeUpdates {
    pub fn new() -> TreeUpdates {
        TreeUpdates::default()
    }

    /// Schedule `key` to take `value`, superseding any removal of the same key.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.removals.remove(&key);
        self.writes.insert(key, value);
    }

    /// Schedule `key` to be torn out, superseding any pending write to it.
    pub fn remove(&mut self, key: Vec<u8>) {
        self.writes.remove(&key);
        self.removals.insert(key);
    }

    /// The value `key` is scheduled to take, if any.
    pub fn write(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.writes.get(key)
    }

    /// Whether `key` is scheduled to be torn out.
    pub fn removes(&self, key: &[u8]) -> bool {
        self.removals.contains(key)
    }

    /// Walk the scheduled writes in key order.
    pub fn writes(&self) -> btree_map::Iter<'_, Vec<u8>, Vec<u8>> {
        self.writes.iter()
    }

    /// Walk the keys scheduled for removal in key order.
    pub fn removals(&self) -> btree_set::Iter<'_, Vec<u8>> {
        self.removals.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.removals.is_empty()
    }
}
