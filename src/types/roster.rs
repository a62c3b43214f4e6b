/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`Roster`] type: the collective authority whose members sign consensus
//! decisions at a given block height.
//!
//! A roster is an ordered sequence of (address, public key) pairs. The iteration order is
//! deterministic and doubles as the quorum order: position `i` in a [`SignatureSet`][super::basic::SignatureSet]
//! belongs to the roster member at position `i`.
//!
//! The current roster lives inside the state tree, at the reserved all-zero key
//! ([`ROSTER_KEY`][crate::tree::ROSTER_KEY]), serialized with [`Roster::encode`]. Committing a
//! block may therefore replace it; the roster in force for verifying a block's signatures is
//! always the one committed by the previous block.

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::VerifyingKey;
use rand::seq::SliceRandom;
use std::io;

use super::basic::{Address, LeaderIndex};

/// Internal type used for serializing and deserializing values of type [`VerifyingKey`].
type VerifyingKeyBytes = [u8; 32];

/// An ordered collective authority of (address, public key) pairs.
#[derive(Clone, PartialEq, Eq)]
pub struct Roster {
    addrs: Vec<Address>,
    pubkeys: Vec<VerifyingKey>,
}

impl Roster {
    pub fn new(members: Vec<(Address, VerifyingKey)>) -> Roster {
        let (addrs, pubkeys) = members.into_iter().unzip();
        Self { addrs, pubkeys }
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Look up a member by address. Returns its public key and its position in the quorum order.
    pub fn get(&self, target: &Address) -> Option<(&VerifyingKey, usize)> {
        self.addrs
            .iter()
            .position(|addr| addr == target)
            .map(|pos| (&self.pubkeys[pos], pos))
    }

    pub fn contains(&self, target: &Address) -> bool {
        self.addrs.iter().any(|addr| addr == target)
    }

    /// The address of the member at the given position in the quorum order.
    pub fn address(&self, pos: usize) -> Option<&Address> {
        self.addrs.get(pos)
    }

    /// The public key of the member at the given position in the quorum order.
    pub fn public_key(&self, pos: usize) -> Option<&VerifyingKey> {
        self.pubkeys.get(pos)
    }

    /// The member that a leader index designates: the one at `index mod len`.
    pub fn leader(&self, index: LeaderIndex) -> &Address {
        &self.addrs[(index.int() % self.len() as u64) as usize]
    }

    /// Returns the subset of the roster selected by the given positions, preserving the quorum
    /// order.
    pub fn take(&self, positions: &[usize]) -> Roster {
        let mut addrs = Vec::with_capacity(positions.len());
        let mut pubkeys = Vec::with_capacity(positions.len());
        for &pos in positions {
            addrs.push(self.addrs[pos].clone());
            pubkeys.push(self.pubkeys[pos]);
        }
        Self { addrs, pubkeys }
    }

    /// Get an iterator over the members in quorum order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &VerifyingKey)> {
        self.addrs.iter().zip(self.pubkeys.iter())
    }

    pub(crate) fn random(&self) -> Option<&Address> {
        self.addrs.choose(&mut rand::thread_rng())
    }

    /// The maximum number of faulty members the roster tolerates: ⌊(n - 1) / 3⌋.
    pub fn faulty(&self) -> usize {
        (self.len().saturating_sub(1)) / 3
    }

    /// The number of members that constitutes a quorum: 2f + 1.
    pub fn quorum(&self) -> usize {
        2 * self.faulty() + 1
    }

    /// Serialize the roster into the value stored at the reserved state-tree key.
    pub fn encode(&self) -> Vec<u8> {
        // Safety: serializing an owned, in-memory value cannot fail.
        self.try_to_vec().unwrap()
    }

    /// Decode a roster from the value stored at the reserved state-tree key.
    pub fn decode(mut value: &[u8]) -> Result<Roster, RosterError> {
        Roster::deserialize(&mut value).map_err(|_| RosterError::MalformedValue)
    }
}

/// Intermediate representation of [`Roster`] for safe serialization and deserialization.
#[derive(BorshSerialize, BorshDeserialize)]
struct RosterBytes {
    addrs: Vec<Address>,
    pubkeys: Vec<VerifyingKeyBytes>,
}

impl BorshSerialize for Roster {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let bytes = RosterBytes {
            addrs: self.addrs.clone(),
            pubkeys: self.pubkeys.iter().map(|pk| pk.to_bytes()).collect(),
        };
        bytes.serialize(writer)
    }
}

impl BorshDeserialize for Roster {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let bytes = RosterBytes::deserialize_reader(reader)?;
        if bytes.addrs.len() != bytes.pubkeys.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "mismatching roster array lengths",
            ));
        }

        let pubkeys = bytes
            .pubkeys
            .iter()
            .map(VerifyingKey::from_bytes)
            .collect::<Result<Vec<VerifyingKey>, _>>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed public key"))?;

        Ok(Roster {
            addrs: bytes.addrs,
            pubkeys,
        })
    }
}

#[derive(Debug)]
pub enum RosterError {
    /// The value at the reserved state-tree key does not decode into a roster.
    MalformedValue,

    /// The reserved state-tree key holds no value.
    MissingValue,
}
