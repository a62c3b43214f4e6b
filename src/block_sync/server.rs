/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The server side of the block sync protocol.
//!
//! The server answers any received [`BlockSyncRequest`] with the links it holds inside the
//! requested half-open range, streaming one [`BlockSyncResponse`] per link in ascending index
//! order. The number of links sent back is limited by a configurable limit.
//!
//! The server also periodically broadcasts a [`BlockSyncAdvertise`] announcing its head index,
//! so that lagging replicas notice they are behind and know the server can supply the missing
//! links. The client side of the protocol is explained [here](crate::block_sync::client).

use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crate::block_sync::messages::{BlockSyncAdvertise, BlockSyncResponse};
use crate::events::{Event, ReceiveSyncRequestEvent, SendSyncResponseEvent};
use crate::networking::{BlockSyncServerStub, Network, SenderHandle};
use crate::store::blocks::BlockStore;
use crate::store::pluggables::KVStore;
use crate::types::basic::BlockIndex;

pub(crate) fn start_sync_server<K: KVStore, N: Network>(
    config: BlockSyncServerConfiguration,
    blocks: BlockStore<K>,
    receiver: BlockSyncServerStub,
    network: N,
    shutdown_signal: Receiver<()>,
    event_publisher: Option<Sender<Event>>,
) -> JoinHandle<()> {
    let mut sender = SenderHandle::new(network);
    let mut last_advertisement = Instant::now();

    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Sync server thread disconnected from main thread")
            }
        }

        if let Ok((origin, request)) = receiver.recv_request() {
            Event::ReceiveSyncRequest(ReceiveSyncRequestEvent {
                timestamp: SystemTime::now(),
                peer: origin.clone(),
                from: request.from,
                to: request.to,
            })
            .publish(&event_publisher);

            // Serve the intersection of the requested range, the links we hold, and the
            // configured limit.
            let to = request
                .to
                .int()
                .min(blocks.len())
                .min(request.from.int() + config.request_limit as u64);

            let mut links_sent = 0;
            for index in request.from.int()..to {
                match blocks.get(BlockIndex::new(index)) {
                    Some(link) => {
                        sender.send(&origin, BlockSyncResponse { link });
                        links_sent += 1;
                    }
                    None => break,
                }
            }

            Event::SendSyncResponse(SendSyncResponseEvent {
                timestamp: SystemTime::now(),
                peer: origin,
                links_sent,
            })
            .publish(&event_publisher);
        }

        if Instant::now() - last_advertisement >= config.advertise_time {
            let len = blocks.len();
            if len > 0 {
                sender.broadcast(BlockSyncAdvertise {
                    latest: BlockIndex::new(len - 1),
                });
            }
            last_advertisement = Instant::now();
        }

        thread::yield_now();
    })
}

/// Parameters that are used to configure the behaviour of the sync server. These should not
/// change after the server starts.
pub(crate) struct BlockSyncServerConfiguration {
    /// Maximum number of links that this server provides in answer to a single request.
    pub(crate) request_limit: u32,

    /// How often the server broadcasts [`BlockSyncAdvertise`] messages.
    pub(crate) advertise_time: Duration,
}
