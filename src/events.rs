/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Notifications that are emitted when significant things happen in the local replica.
//!
//! ## Event enum
//!
//! Significant occurrences include storing the genesis, moving a proposal through the prepare and
//! commit phases, finalizing a block, rotating the leader, and the phases of a block sync.
//!
//! Each occurrence corresponds to a variant of the [event enum](Event), whose inner struct stores
//! information summarizing the event, always including a timestamp taken when the event occurred.
//!
//! Events are always emitted **after** the corresponding occurrence is completed. For example,
//! [`FinalizeEvent`] is only emitted after the staged tree is committed and the link persisted.
//!
//! ## Ordering events
//!
//! Separately from the event bus, the processor exposes a plain ordering stream of
//! [`OrderingEvent`]s: one `{ index }` per finalized block (and one for genesis). This is the
//! stream outer services consume to follow the chain; the event bus is for observability.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::basic::{Address, BlockIndex, Digest, LeaderIndex};

/// Delivered on the processor's ordering stream for each block the replica finalizes, in index
/// order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderingEvent {
    pub index: BlockIndex,
}

/// Enumerates all events defined for the ordering service.
pub enum Event {
    // Events that change persistent state.
    StoreGenesis(StoreGenesisEvent),
    Finalize(FinalizeEvent),
    UpdateRoster(UpdateRosterEvent),

    // Progress events within a block attempt.
    Prepare(PrepareEvent),
    Commit(CommitEvent),
    ViewChange(ViewChangeEvent),

    // Sync events.
    StartSync(StartSyncEvent),
    EndSync(EndSyncEvent),
    ReceiveSyncRequest(ReceiveSyncRequestEvent),
    SendSyncResponse(SendSyncResponseEvent),
}

impl Event {
    /// Publishes a given instance of the [`Event`] enum on the event publisher channel (if the
    /// channel is defined).
    pub fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(self);
        }
    }
}

/// The genesis slot was filled and the chain bootstrapped with the given initial roster size and
/// state root.
pub struct StoreGenesisEvent {
    pub timestamp: SystemTime,
    pub root: Digest,
    pub roster_len: usize,
}

/// A block was finalized: its staged tree committed, its link appended, and the ordering stream
/// notified.
pub struct FinalizeEvent {
    pub timestamp: SystemTime,
    pub index: BlockIndex,
    pub id: Digest,
}

/// Finalizing a block replaced the value at the reserved roster key, rotating the collective
/// authority.
pub struct UpdateRosterEvent {
    pub timestamp: SystemTime,
    pub index: BlockIndex,
    pub roster_len: usize,
}

/// A candidate block was validated and its state transition staged.
pub struct PrepareEvent {
    pub timestamp: SystemTime,
    pub index: BlockIndex,
    pub id: Digest,
}

/// A valid prepare-phase collective signature was observed for the in-flight proposal.
pub struct CommitEvent {
    pub timestamp: SystemTime,
    pub id: Digest,
}

/// A quorum of matching views was accumulated: the contested proposal was abandoned and the
/// leader index rotated.
pub struct ViewChangeEvent {
    pub timestamp: SystemTime,
    pub id: Digest,
    pub leader: LeaderIndex,
}

/// The replica started syncing missing links from the given peer.
pub struct StartSyncEvent {
    pub timestamp: SystemTime,
    pub peer: Address,
    pub from: BlockIndex,
    pub to: BlockIndex,
}

/// The replica finished a sync attempt, having installed the given number of links.
pub struct EndSyncEvent {
    pub timestamp: SystemTime,
    pub peer: Address,
    pub links_synced: u64,
}

/// The replica's sync server received a request for a range of links.
pub struct ReceiveSyncRequestEvent {
    pub timestamp: SystemTime,
    pub peer: Address,
    pub from: BlockIndex,
    pub to: BlockIndex,
}

/// The replica's sync server answered a request, streaming the given number of links.
pub struct SendSyncResponseEvent {
    pub timestamp: SystemTime,
    pub peer: Address,
    pub links_sent: u64,
}
