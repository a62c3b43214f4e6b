/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The block sync subprotocol, which lets a lagging replica reach the cluster's observed head
//! before it votes.
//!
//! A replica might be lagging for various reasons, such as network outage, downtime, or
//! deliberate action by Byzantine leaders. Lag is detected through the [`Synchronizer`]'s
//! watermark: the highest block index observed anywhere, fed by sync-server advertisements and by
//! metadata piggybacked on incoming proposals. When the watermark runs ahead of the local store,
//! the [client](client::BlockSyncClient) requests the missing links from a peer, verifies each
//! link's collective signatures against the roster active at its index, and installs it, which
//! re-applies the payload and advances the tree cache. The [server](server) side answers such
//! requests from the local store, streaming one link per response in ascending index order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub mod client;

pub mod messages;

pub mod server;

/// Tracks the highest block index observed anywhere. The watermark is monotonically
/// non-decreasing over the lifetime of a replica.
pub struct Synchronizer {
    latest: Arc<AtomicU64>,
}

impl Synchronizer {
    pub fn new() -> Synchronizer {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The highest block index observed so far.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Fold an observed block index into the watermark.
    pub fn observe(&self, index: u64) {
        self.latest.fetch_max(index, Ordering::SeqCst);
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Synchronizer {
    fn clone(&self) -> Self {
        Self {
            latest: Arc::clone(&self.latest),
        }
    }
}
