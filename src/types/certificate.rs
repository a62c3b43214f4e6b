/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`CollectiveSignature`] type: the aggregate of per-member signatures that
//! the collective-signing module produces over a PBFT phase.
//!
//! A collective signature is position-aligned with a [`Roster`]: the signature at position `i`
//! (if present) must verify under the public key of the roster member at position `i`. The
//! signature as a whole verifies when at least a quorum (2f + 1) of positions carry a valid
//! signature over the message.

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signature, Verifier};

use super::basic::{SignatureBytes, SignatureSet};
use super::roster::Roster;

/// Evidence that a quorum of roster members signed a message. Produced by the collective-signing
/// module during the prepare and commit phases, and stored in every finalized
/// [`BlockLink`][super::block::BlockLink].
#[derive(Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct CollectiveSignature {
    signatures: SignatureSet,
}

impl CollectiveSignature {
    /// An empty aggregate sized for the given roster, with no signatures collected yet.
    pub fn new(roster_len: usize) -> CollectiveSignature {
        Self {
            signatures: SignatureSet::new(roster_len),
        }
    }

    /// The aggregate carried by a genesis link: zero-length, verifiable by nothing. Genesis is
    /// authenticated out of band.
    pub fn genesis() -> CollectiveSignature {
        Self {
            signatures: SignatureSet::new(0),
        }
    }

    /// Record the signature contributed by the roster member at the given position.
    pub fn set(&mut self, pos: usize, signature: SignatureBytes) {
        self.signatures.set(pos, Some(signature))
    }

    /// The number of positions that carry a signature.
    pub fn count(&self) -> usize {
        self.signatures.iter().filter(|sig| sig.is_some()).count()
    }

    /// Returns whether the aggregate is a valid collective signature by the given roster over the
    /// given message: every present signature verifies under the key at its position, and at
    /// least a quorum of positions are present.
    pub fn verify(&self, roster: &Roster, message: &[u8]) -> bool {
        if self.signatures.len() != roster.len() {
            return false;
        }

        let mut valid = 0;
        for (pos, signature) in self.signatures.iter().enumerate() {
            if let Some(signature_bytes) = signature {
                let signature = Signature::from_bytes(&signature_bytes.bytes());
                // Safety: positions up to signatures.len() == roster.len() are in bounds.
                let pubkey = roster.public_key(pos).unwrap();
                if pubkey.verify(message, &signature).is_err() {
                    return false;
                }
                valid += 1;
            }
        }

        valid >= roster.quorum()
    }

    /// Binary encoding of the aggregate. The commit-phase collective signature signs over this
    /// encoding of the prepare-phase one.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Safety: serializing an owned, in-memory value cannot fail.
        self.try_to_vec().unwrap()
    }
}
