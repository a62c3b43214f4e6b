/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Implements the [`BlockSyncClient`], which is responsible for:
//! 1. Noticing that the replica is lagging (the synchronizer's watermark runs ahead of the local
//!    store), and
//! 2. Selecting a peer to sync with from the current roster, and
//! 3. The syncing process with that peer: requesting the missing range, then installing each
//!    streamed link after its collective signatures verify against the roster active at its
//!    index.
//!
//! Links are installed through the processor's catch-up path, so they pass through the same
//! single-writer discipline as ordinary finalization. An [`StoreError::AlreadyFinal`]-flavoured
//! rejection simply means another path (usually the watch-gated prepare) got there first, and is
//! not counted as progress but not treated as a failure either.

use std::time::{Duration, Instant, SystemTime};

use crate::app::App;
use crate::events::{EndSyncEvent, Event, StartSyncEvent};
use crate::networking::{BlockSyncClientStub, Network, SenderHandle};
use crate::pbft::PbftError;
use crate::processor::{Processor, ProcessorError};
use crate::store::pluggables::KVStore;
use crate::store::StoreError;
use crate::tree::StateTree;
use crate::types::basic::{Address, BlockIndex};
use crate::block_sync::messages::BlockSyncRequest;

pub(crate) struct BlockSyncClient<K: KVStore, T: StateTree, A: App<T>, N: Network> {
    config: BlockSyncClientConfiguration,
    me: Address,
    processor: Processor<K, T, A, N>,
    receiver: BlockSyncClientStub,
    sender: SenderHandle<N>,
}

impl<K: KVStore, T: StateTree, A: App<T>, N: Network> BlockSyncClient<K, T, A, N> {
    pub(crate) fn new(
        config: BlockSyncClientConfiguration,
        me: Address,
        processor: Processor<K, T, A, N>,
        receiver: BlockSyncClientStub,
        sender: SenderHandle<N>,
    ) -> Self {
        Self {
            config,
            me,
            processor,
            receiver,
            sender,
        }
    }

    /// Called periodically by the replica's message loop. Starts a sync attempt whenever the
    /// watermark runs ahead of the local store.
    pub(crate) fn tick(&mut self) {
        if self.processor.synchronizer().latest() > self.processor.blocks().len() {
            if let Err(error) = self.sync() {
                log::debug!("sync attempt failed: {:?}", error);
            }
        }
    }

    /// One sync attempt: pick a peer, request the missing half-open range, install streamed links
    /// until the range is exhausted or the response deadline fires.
    fn sync(&mut self) -> Result<(), BlockSyncClientError> {
        let roster = self.processor.current_roster()?;

        // Exclude ourselves from the candidate sync servers.
        let positions: Vec<usize> = roster
            .iter()
            .enumerate()
            .filter(|(_, (addr, _))| **addr != self.me)
            .map(|(pos, _)| pos)
            .collect();
        let candidates = roster.take(&positions);
        let peer = match candidates.random() {
            Some(peer) => peer.clone(),
            None => return Err(BlockSyncClientError::NoPeer),
        };

        let from = BlockIndex::new(self.processor.blocks().len());
        let to = BlockIndex::new(
            (self.processor.synchronizer().latest() + 1)
                .min(from.int() + self.config.request_limit as u64),
        );
        if to.int() <= from.int() {
            return Ok(());
        }

        Event::StartSync(StartSyncEvent {
            timestamp: SystemTime::now(),
            peer: peer.clone(),
            from,
            to,
        })
        .publish(self.processor.event_publisher());

        self.sender.send(&peer, BlockSyncRequest { from, to });

        let mut links_synced = 0;
        let deadline = Instant::now() + self.config.response_timeout;
        let mut next = from;
        while next.int() < to.int() {
            let response = match self.receiver.recv_response(&peer, deadline) {
                Ok(response) => response,
                Err(_) => break,
            };

            // Streams must arrive in ascending index order; anything else ends the attempt.
            if response.link.block.index != next {
                break;
            }

            match self.processor.catch_up_link(response.link) {
                Ok(()) => links_synced += 1,
                // Another path installed this index concurrently; move on to the next one.
                Err(ProcessorError::Pbft(PbftError::Store(StoreError::AlreadyFinal))) => (),
                Err(error) => {
                    Event::EndSync(EndSyncEvent {
                        timestamp: SystemTime::now(),
                        peer,
                        links_synced,
                    })
                    .publish(self.processor.event_publisher());
                    return Err(BlockSyncClientError::Processor(error));
                }
            }
            next = next + 1;
        }

        Event::EndSync(EndSyncEvent {
            timestamp: SystemTime::now(),
            peer,
            links_synced,
        })
        .publish(self.processor.event_publisher());

        Ok(())
    }
}

/// Immutable parameters that define the behaviour of the [`BlockSyncClient`].
pub(crate) struct BlockSyncClientConfiguration {
    /// Maximum number of links requested in a single sync attempt.
    pub(crate) request_limit: u32,

    /// How long to keep receiving streamed responses before giving up on the attempt.
    pub(crate) response_timeout: Duration,
}

#[derive(Debug)]
pub(crate) enum BlockSyncClientError {
    /// The roster contains no peer other than this replica.
    NoPeer,

    Processor(ProcessorError),
}

impl From<ProcessorError> for BlockSyncClientError {
    fn from(value: ProcessorError) -> Self {
        BlockSyncClientError::Processor(value)
    }
}
