/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [Trait definition](Network) for the pluggable messaging fabric, as well as the internal types
//! and functions that replicas use to interact with it.
//!
//! Networking is modular: each peer is reachable by its [`Address`], and providers interact with
//! the replica's threads through implementations of the [`Network`] trait. The provider is kept
//! informed of the roster as it evolves, so it can maintain connectivity to the collective
//! authority (and to any listeners it chooses to serve besides).
//!
//! The collective-signing module is *not* driven through this trait: it calls
//! [`Processor::invoke`](crate::processor::Processor::invoke) directly and aggregates the
//! returned bytes out of band.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::block_sync::messages::{BlockSyncMessage, BlockSyncRequest, BlockSyncResponse};
use crate::block_sync::Synchronizer;
use crate::messages::{ConsensusMessage, Message};
use crate::types::basic::Address;
use crate::types::roster::Roster;

pub trait Network: Clone + Send + 'static {
    /// Informs the network provider of the roster on wake-up.
    fn init_roster(&mut self, roster: Roster);

    /// Informs the networking provider of a rotation of the roster.
    fn update_roster(&mut self, roster: Roster);

    /// Send a message to all peers (including listeners) without blocking.
    fn broadcast(&mut self, message: Message);

    /// Send a message to the specified peer without blocking.
    fn send(&mut self, peer: &Address, message: Message);

    /// Receive a message from any peer. Returns immediately with a None if no message is
    /// available now.
    fn recv(&mut self) -> Option<(Address, Message)>;
}

/// Spawn the poller thread, which polls the [`Network`] for messages and distributes them into
/// receivers for:
/// 1. Consensus messages (processed by the replica's message loop), and
/// 2. Block sync requests (processed by the [sync server](crate::block_sync::server)), and
/// 3. Block sync responses (processed by the [sync client](crate::block_sync::client::BlockSyncClient)).
///
/// Sync advertisements are folded into the [`Synchronizer`]'s latest-index watermark right here,
/// so every component observing the watermark sees gossip without its own subscription.
pub(crate) fn start_polling<N: Network>(
    mut network: N,
    sync: Synchronizer,
    shutdown_signal: Receiver<()>,
) -> (
    JoinHandle<()>,
    Receiver<(Address, ConsensusMessage)>,
    Receiver<(Address, BlockSyncRequest)>,
    Receiver<(Address, BlockSyncResponse)>,
) {
    let (to_consensus_receiver, consensus_receiver) = mpsc::channel();
    let (to_sync_request_receiver, sync_request_receiver) = mpsc::channel();
    let (to_sync_response_receiver, sync_response_receiver) = mpsc::channel();

    let poller_thread = thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Poller thread disconnected from main thread")
            }
        }

        if let Some((origin, msg)) = network.recv() {
            match msg {
                Message::ConsensusMessage(c_msg) => {
                    let _ = to_consensus_receiver.send((origin, c_msg));
                }
                Message::BlockSyncMessage(s_msg) => match s_msg {
                    BlockSyncMessage::BlockSyncRequest(s_req) => {
                        let _ = to_sync_request_receiver.send((origin, s_req));
                    }
                    BlockSyncMessage::BlockSyncResponse(s_res) => {
                        let _ = to_sync_response_receiver.send((origin, s_res));
                    }
                    BlockSyncMessage::BlockSyncAdvertise(advertise) => {
                        sync.observe(advertise.latest.int());
                    }
                },
            }
        } else {
            thread::yield_now()
        }
    });

    (
        poller_thread,
        consensus_receiver,
        sync_request_receiver,
        sync_response_receiver,
    )
}

/// Handle for sending and broadcasting messages to the [`Network`]. Can be used with any message
/// type that implements `Into<Message>`.
#[derive(Clone)]
pub(crate) struct SenderHandle<N: Network> {
    network: N,
}

impl<N: Network> SenderHandle<N> {
    pub(crate) fn new(network: N) -> Self {
        Self { network }
    }

    pub(crate) fn send<S: Into<Message>>(&mut self, peer: &Address, msg: S) {
        self.network.send(peer, msg.into())
    }

    pub(crate) fn broadcast<S: Into<Message>>(&mut self, msg: S) {
        self.network.broadcast(msg.into())
    }
}

/// Handle for informing the network provider about rotations of the roster.
pub struct RosterUpdateHandle<N: Network> {
    network: std::sync::Mutex<N>,
}

impl<N: Network> RosterUpdateHandle<N> {
    pub(crate) fn new(network: N) -> Self {
        Self {
            network: std::sync::Mutex::new(network),
        }
    }

    pub(crate) fn update(&self, roster: Roster) {
        self.network.lock().unwrap().update_roster(roster)
    }
}

impl<N: Network> Clone for RosterUpdateHandle<N> {
    fn clone(&self) -> Self {
        Self {
            network: std::sync::Mutex::new(self.network.lock().unwrap().clone()),
        }
    }
}

/// A receiving end for sync responses. The [`recv_response`](Self::recv_response) method returns
/// the received response.
pub(crate) struct BlockSyncClientStub {
    responses: Receiver<(Address, BlockSyncResponse)>,
}

impl BlockSyncClientStub {
    pub(crate) fn new(responses: Receiver<(Address, BlockSyncResponse)>) -> BlockSyncClientStub {
        BlockSyncClientStub { responses }
    }

    /// Receive a [`BlockSyncResponse`] from a given peer. Waits for the response until the
    /// deadline is reached, and if no response is received by then, returns
    /// [`BlockSyncResponseReceiveError::Timeout`].
    pub(crate) fn recv_response(
        &self,
        peer: &Address,
        deadline: Instant,
    ) -> Result<BlockSyncResponse, BlockSyncResponseReceiveError> {
        while Instant::now() < deadline {
            match self.responses.recv_timeout(deadline - Instant::now()) {
                Ok((sender, sync_response)) => {
                    if &sender == peer {
                        return Ok(sync_response);
                    }
                }
                Err(RecvTimeoutError::Timeout) => thread::yield_now(),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BlockSyncResponseReceiveError::Disconnected)
                }
            }
        }

        Err(BlockSyncResponseReceiveError::Timeout)
    }
}

#[derive(Debug)]
pub enum BlockSyncResponseReceiveError {
    Disconnected,
    Timeout,
}

/// A receiving end for sync requests. The [`recv_request`](Self::recv_request) method returns the
/// received request.
pub(crate) struct BlockSyncServerStub {
    requests: Receiver<(Address, BlockSyncRequest)>,
}

impl BlockSyncServerStub {
    pub(crate) fn new(requests: Receiver<(Address, BlockSyncRequest)>) -> BlockSyncServerStub {
        BlockSyncServerStub { requests }
    }

    /// Receive a [`BlockSyncRequest`] if available, else return
    /// [`BlockSyncRequestReceiveError::NotAvailable`].
    pub(crate) fn recv_request(
        &self,
    ) -> Result<(Address, BlockSyncRequest), BlockSyncRequestReceiveError> {
        match self.requests.try_recv() {
            Ok((origin, request)) => Ok((origin, request)),
            Err(TryRecvError::Empty) => Err(BlockSyncRequestReceiveError::NotAvailable),
            Err(TryRecvError::Disconnected) => Err(BlockSyncRequestReceiveError::Disconnected),
        }
    }
}

#[derive(Debug)]
pub enum BlockSyncRequestReceiveError {
    Disconnected,
    NotAvailable,
}
