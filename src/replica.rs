/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that [start](Replica::start) a replica, as well as [the type](Replica) which keeps
//! the replica alive.
//!
//! A replica of the ordering service is a process that keeps a totally ordered chain of
//! collectively signed blocks, in lock-step with a Merkleized state tree. Replicas are reachable
//! by [`Address`](crate::types::basic::Address) through the messaging fabric the library user
//! plugs in.
//!
//! ## Threads
//!
//! `Replica::start` spawns:
//! 1. The **poller**, which drains the network and distributes messages into per-component
//!    channels.
//! 2. The **message loop**, which dispatches remote procedure calls into the
//!    [`Processor`](crate::processor::Processor) and ticks the sync client whenever the replica
//!    observes that it is lagging.
//! 3. The **sync server**, which answers block requests from peers.
//! 4. The **event bus**, which hands emitted events to registered handlers (only if any handler
//!    is registered or logging is enabled).
//!
//! The collective-signing module is not a thread of the replica: it invokes the processor
//! directly through the handle returned by [`Replica::processor`].

use std::sync::mpsc::{self, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::app::App;
use crate::block_sync::client::{BlockSyncClient, BlockSyncClientConfiguration};
use crate::block_sync::server::{start_sync_server, BlockSyncServerConfiguration};
use crate::block_sync::Synchronizer;
use crate::config::Configuration;
use crate::event_bus::{start_event_bus, EventHandlers, UserDefinedHandlers};
use crate::networking::{
    start_polling, BlockSyncClientStub, BlockSyncServerStub, Network, RosterUpdateHandle,
    SenderHandle,
};
use crate::processor::Processor;
use crate::store::blocks::BlockStore;
use crate::store::genesis::GenesisStore;
use crate::store::pluggables::KVStore;
use crate::tree::{read_roster, StateTree, TreeCache};
use crate::watcher::Watcher;

pub struct Replica<K: KVStore, T: StateTree, A: App<T>, N: Network> {
    processor: Processor<K, T, A, N>,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
    msg_loop: Option<JoinHandle<()>>,
    msg_loop_shutdown: Sender<()>,
    sync_server: Option<JoinHandle<()>>,
    sync_server_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Sender<()>,
}

impl<K: KVStore, T: StateTree, A: App<T>, N: Network> Replica<K, T, A, N> {
    pub fn start(
        app: A,
        mut network: N,
        kv_store: K,
        tree: T,
        configuration: Configuration,
        handlers: UserDefinedHandlers,
    ) -> Replica<K, T, A, N> {
        let blocks = BlockStore::new(kv_store.clone());
        let genesis = GenesisStore::new(kv_store);
        let tree_cache = TreeCache::new(tree);
        let sync = Synchronizer::new();

        // A replica restarted after bootstrap already knows the roster; one started fresh learns
        // it when genesis arrives.
        if genesis.exists() {
            if let Ok(roster) = read_roster(&tree_cache.get()) {
                network.init_roster(roster);
            }
            sync.observe(blocks.len().saturating_sub(1));
        }

        let event_handlers = EventHandlers::new(configuration.log_events, handlers);
        let (event_publisher, event_bus, event_bus_shutdown) = if event_handlers.is_empty() {
            let (shutdown, _) = mpsc::channel();
            (None, None, shutdown)
        } else {
            let (publisher, subscriber) = mpsc::channel();
            let (shutdown, shutdown_receiver) = mpsc::channel();
            let bus = start_event_bus(event_handlers, subscriber, shutdown_receiver);
            (Some(publisher), Some(bus), shutdown)
        };

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let (poller, consensus_msgs, sync_requests, sync_responses) =
            start_polling(network.clone(), sync.clone(), poller_shutdown_receiver);

        let processor = Processor::new(
            app,
            blocks.clone(),
            genesis,
            tree_cache,
            sync,
            RosterUpdateHandle::new(network.clone()),
            Watcher::new(),
            configuration.catch_up_timeout,
            event_publisher.clone(),
        );

        let (sync_server_shutdown, sync_server_shutdown_receiver) = mpsc::channel();
        let sync_server = start_sync_server(
            BlockSyncServerConfiguration {
                request_limit: configuration.sync_request_limit,
                advertise_time: configuration.sync_advertise_time,
            },
            blocks,
            BlockSyncServerStub::new(sync_requests),
            network.clone(),
            sync_server_shutdown_receiver,
            event_publisher.clone(),
        );

        let sync_client = BlockSyncClient::new(
            BlockSyncClientConfiguration {
                request_limit: configuration.sync_request_limit,
                response_timeout: configuration.sync_response_timeout,
            },
            configuration.me.clone(),
            processor.clone(),
            BlockSyncClientStub::new(sync_responses),
            SenderHandle::new(network),
        );

        let (msg_loop_shutdown, msg_loop_shutdown_receiver) = mpsc::channel();
        let msg_loop = {
            let processor = processor.clone();
            let mut sync_client = sync_client;
            thread::spawn(move || loop {
                match msg_loop_shutdown_receiver.try_recv() {
                    Ok(()) => return,
                    Err(TryRecvError::Empty) => (),
                    Err(TryRecvError::Disconnected) => {
                        panic!("Message loop thread disconnected from main thread")
                    }
                }

                match consensus_msgs.try_recv() {
                    Ok((origin, msg)) => {
                        if let Err(error) = processor.process(&origin, msg) {
                            log::debug!("processing message from {} failed: {:?}", origin, error);
                        }
                    }
                    Err(TryRecvError::Empty) => thread::yield_now(),
                    Err(TryRecvError::Disconnected) => return,
                }

                sync_client.tick();
            })
        };

        Replica {
            processor,
            poller: Some(poller),
            poller_shutdown,
            msg_loop: Some(msg_loop),
            msg_loop_shutdown,
            sync_server: Some(sync_server),
            sync_server_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }

    /// The handle through which the collective-signing module and the outer service reach this
    /// replica: `invoke`, `process`, `start`, the ordering stream, and read access to the stores
    /// and the tree cache.
    pub fn processor(&self) -> &Processor<K, T, A, N> {
        &self.processor
    }
}

impl<K: KVStore, T: StateTree, A: App<T>, N: Network> Drop for Replica<K, T, A, N> {
    fn drop(&mut self) {
        // Safety: the order of thread shutdown is important, as the threads make assumptions
        // about the validity of their channels based on it. The message loop and sync server
        // receive messages from the poller, which must therefore outlive them.

        if let Some(event_bus) = self.event_bus.take() {
            let _ = self.event_bus_shutdown.send(());
            let _ = event_bus.join();
        }

        let _ = self.msg_loop_shutdown.send(());
        if let Some(msg_loop) = self.msg_loop.take() {
            let _ = msg_loop.join();
        }

        let _ = self.sync_server_shutdown.send(());
        if let Some(sync_server) = self.sync_server.take() {
            let _ = sync_server.join();
        }

        let _ = self.poller_shutdown.send(());
        if let Some(poller) = self.poller.take() {
            let _ = poller.join();
        }
    }
}
