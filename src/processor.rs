/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Processor`]: the message reactor exposed to the messaging fabric. It dispatches inbound
//! messages into the PBFT state machine and the stores, and owns the `started` latch that gates
//! the outer service on genesis.
//!
//! ## Dispatch
//!
//! | Incoming            | Entry point           | Action                                   | Reply          |
//! |---------------------|-----------------------|------------------------------------------|----------------|
//! | `BlockMessage`      | [`Processor::invoke`] | catch-up gate, then `pbft.prepare`       | digest bytes   |
//! | `CommitMessage`     | [`Processor::invoke`] | `pbft.commit`                            | binary(sig)    |
//! | `GenesisMessage`    | [`Processor::process`]| idempotent genesis bootstrap             | none           |
//! | `PropagateGenesis`  | [`Processor::process`]| idempotent genesis bootstrap             | none           |
//! | `DoneMessage`       | [`Processor::process`]| `pbft.finalize`                          | none           |
//! | `ViewMessage`       | [`Processor::process`]| `pbft.accept`                            | none           |
//!
//! Any other combination fails with [`ProcessorError::Unsupported`].
//!
//! ## Locking
//!
//! Every mutating path acquires the single-writer lock over the state machine and the execution
//! engine. The lock is *not* held across the catch-up wait: the prepare path subscribes to the
//! block watch, waits unlocked for the head to reach the latest observed index, and only then
//! locks to run `pbft.prepare`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime};

use crate::app::App;
use crate::block_sync::Synchronizer;
use crate::events::{Event, OrderingEvent, StoreGenesisEvent};
use crate::messages::ConsensusMessage;
use crate::networking::{Network, RosterUpdateHandle};
use crate::pbft::{Pbft, PbftError, State, View};
use crate::store::blocks::BlockStore;
use crate::store::genesis::GenesisStore;
use crate::store::pluggables::KVStore;
use crate::store::StoreError;
use crate::tree::{StateTree, TreeCache, ROSTER_KEY};
use crate::types::basic::{Address, BlockIndex, Digest, LeaderIndex, TreeUpdates};
use crate::types::block::{BlockLink, Genesis};
use crate::types::roster::Roster;
use crate::watcher::Watcher;

/// The state guarded by the single-writer lock: the PBFT machine and the execution engine it
/// drives.
pub(crate) struct Core<K: KVStore, T: StateTree, A: App<T>> {
    pub(crate) pbft: Pbft<K, T>,
    pub(crate) app: A,
}

pub struct Processor<K: KVStore, T: StateTree, A: App<T>, N: Network> {
    core: Arc<Mutex<Core<K, T, A>>>,
    blocks: BlockStore<K>,
    genesis: GenesisStore<K>,
    tree: TreeCache<T>,
    sync: Synchronizer,
    roster_updates: RosterUpdateHandle<N>,
    ordering: Watcher<OrderingEvent>,
    started: Latch,
    catch_up_timeout: Duration,
    event_publisher: Option<Sender<Event>>,
}

impl<K: KVStore, T: StateTree, A: App<T>, N: Network> Processor<K, T, A, N> {
    pub(crate) fn new(
        app: A,
        blocks: BlockStore<K>,
        genesis: GenesisStore<K>,
        tree: TreeCache<T>,
        sync: Synchronizer,
        roster_updates: RosterUpdateHandle<N>,
        ordering: Watcher<OrderingEvent>,
        catch_up_timeout: Duration,
        event_publisher: Option<Sender<Event>>,
    ) -> Processor<K, T, A, N> {
        let pbft = Pbft::new(
            blocks.clone(),
            tree.clone(),
            ordering.clone(),
            event_publisher.clone(),
        );

        Self {
            core: Arc::new(Mutex::new(Core { pbft, app })),
            blocks,
            genesis,
            tree,
            sync,
            roster_updates,
            ordering,
            started: Latch::new(),
            catch_up_timeout,
            event_publisher,
        }
    }

    /// Process a message from the collective-signing module. The reply bytes are what the module
    /// aggregates signatures over: the block digest in the prepare phase, the marshalled prepare
    /// signature in the commit phase.
    pub fn invoke(
        &self,
        _from: &Address,
        msg: ConsensusMessage,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, ProcessorError> {
        match msg {
            ConsensusMessage::BlockMessage(block_msg) => {
                if !self.genesis.exists() {
                    return Err(ProcessorError::NoGenesis);
                }

                self.sync.observe(block_msg.latest.int());
                self.sync.observe(block_msg.block.index.int());

                // In case the replica is falling behind the chain, give it a chance to catch up
                // before evaluating the proposal. Subscribing before the length check closes the
                // race with links appended in between.
                let watch = self.blocks.watch();
                if self.sync.latest() > self.blocks.len() {
                    self.wait_for_catch_up(watch, cancel)?;
                }

                let mut core = self.core.lock().unwrap();
                let Core { pbft, app } = &mut *core;
                let digest = pbft.prepare(block_msg.block, app)?;
                Ok(digest.bytes().to_vec())
            }
            ConsensusMessage::CommitMessage(commit_msg) => {
                if !self.genesis.exists() {
                    return Err(ProcessorError::NoGenesis);
                }

                let mut core = self.core.lock().unwrap();
                core.pbft.commit(commit_msg.id, commit_msg.signature.clone())?;
                Ok(commit_msg.signature.to_bytes())
            }
            _ => Err(ProcessorError::Unsupported),
        }
    }

    /// Process a remote procedure call from the messaging fabric.
    pub fn process(&self, from: &Address, msg: ConsensusMessage) -> Result<(), ProcessorError> {
        match msg {
            ConsensusMessage::GenesisMessage(genesis_msg) => {
                self.store_genesis(genesis_msg.genesis.roster, Some(genesis_msg.genesis.root))
            }
            ConsensusMessage::PropagateGenesis(propagate) => {
                self.store_genesis(propagate.genesis.roster, Some(propagate.genesis.root))
            }
            ConsensusMessage::DoneMessage(done_msg) => {
                if !self.genesis.exists() {
                    return Err(ProcessorError::NoGenesis);
                }

                let new_roster = self
                    .core
                    .lock()
                    .unwrap()
                    .pbft
                    .finalize(done_msg.id, done_msg.signature)?;
                if let Some(roster) = new_roster {
                    self.roster_updates.update(roster);
                }
                Ok(())
            }
            ConsensusMessage::ViewMessage(view_msg) => {
                if !self.genesis.exists() {
                    return Err(ProcessorError::NoGenesis);
                }

                let view = View {
                    from: from.clone(),
                    id: view_msg.id,
                    leader: view_msg.leader,
                };
                self.core.lock().unwrap().pbft.accept(view)?;
                Ok(())
            }
            _ => Err(ProcessorError::Unsupported),
        }
    }

    /// Establish the bootstrap record: stage the roster at the reserved key, enforce the expected
    /// root, commit, fill the genesis slot, append link 0, and open the `started` latch.
    ///
    /// Re-deliveries succeed without re-executing anything.
    pub fn store_genesis(
        &self,
        roster: Roster,
        expected_root: Option<Digest>,
    ) -> Result<(), ProcessorError> {
        let core = self.core.lock().unwrap();

        // Checked under the lock: concurrent re-deliveries must collapse into a single
        // bootstrap.
        if self.genesis.exists() {
            return Ok(());
        }

        let mut updates = TreeUpdates::new();
        updates.set(ROSTER_KEY.to_vec(), roster.encode());

        let mut staged = self.tree.get().stage(&updates);
        let root = staged.root();
        if let Some(expected) = expected_root {
            if expected != root {
                return Err(ProcessorError::GenesisRootMismatch {
                    expected,
                    computed: root,
                });
            }
        }

        staged.commit();
        self.tree.set(staged);

        let genesis = Genesis::new(roster.clone(), root);
        let mut genesis_store = self.genesis.clone();
        genesis_store.set(&genesis)?;

        let mut blocks = self.blocks.clone();
        blocks.store(BlockLink::genesis(genesis.to_block()))?;

        drop(core);

        self.roster_updates.update(roster.clone());
        self.ordering.notify(OrderingEvent {
            index: BlockIndex::new(0),
        });
        Event::StoreGenesis(StoreGenesisEvent {
            timestamp: SystemTime::now(),
            root,
            roster_len: roster.len(),
        })
        .publish(&self.event_publisher);

        self.started.open();

        Ok(())
    }

    /// Install a fully signed link fetched by the sync client.
    pub fn catch_up_link(&self, link: BlockLink) -> Result<(), ProcessorError> {
        let mut core = self.core.lock().unwrap();
        let Core { pbft, app } = &mut *core;
        let new_roster = pbft.catch_up(link, app)?;
        drop(core);

        if let Some(roster) = new_roster {
            self.roster_updates.update(roster);
        }
        Ok(())
    }

    /// Block until the genesis is established. This is the outer service's start barrier.
    pub fn start(&self) {
        self.started.wait();
    }

    /// Subscribe to the ordering stream: one event per finalized block, in index order, starting
    /// with the events finalized after this call.
    pub fn watch(&self) -> Receiver<OrderingEvent> {
        self.ordering.subscribe()
    }

    pub fn blocks(&self) -> &BlockStore<K> {
        &self.blocks
    }

    pub fn genesis(&self) -> &GenesisStore<K> {
        &self.genesis
    }

    pub fn tree(&self) -> &TreeCache<T> {
        &self.tree
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    /// The roster in force for the next block.
    pub fn current_roster(&self) -> Result<Roster, ProcessorError> {
        Ok(self.core.lock().unwrap().pbft.current_roster()?)
    }

    /// The state the PBFT machine is currently in.
    pub fn state(&self) -> State {
        self.core.lock().unwrap().pbft.state()
    }

    /// The current leader index of the PBFT machine.
    pub fn leader(&self) -> LeaderIndex {
        self.core.lock().unwrap().pbft.leader()
    }

    pub(crate) fn event_publisher(&self) -> &Option<Sender<Event>> {
        &self.event_publisher
    }

    fn wait_for_catch_up(
        &self,
        watch: Receiver<BlockLink>,
        cancel: &CancelToken,
    ) -> Result<(), ProcessorError> {
        let deadline = Instant::now() + self.catch_up_timeout;

        while self.sync.latest() > self.blocks.len() {
            if cancel.is_cancelled() {
                return Err(ProcessorError::Cancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProcessorError::SyncTimeout);
            }

            // Wake up at least every poll interval to observe cancellation.
            let wait = std::cmp::min(deadline - now, CANCEL_POLL_INTERVAL);
            match watch.recv_timeout(wait) {
                Ok(link) => {
                    if link.block.index.int() + 1 >= self.sync.latest() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => return Err(ProcessorError::Cancelled),
            }
        }

        Ok(())
    }
}

impl<K: KVStore, T: StateTree, A: App<T>, N: Network> Clone for Processor<K, T, A, N> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            blocks: self.blocks.clone(),
            genesis: self.genesis.clone(),
            tree: self.tree.clone(),
            sync: self.sync.clone(),
            roster_updates: self.roster_updates.clone(),
            ordering: self.ordering.clone(),
            started: self.started.clone(),
            catch_up_timeout: self.catch_up_timeout,
            event_publisher: self.event_publisher.clone(),
        }
    }
}

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A one-shot latch: many waiters, one opener. Once open, it stays open.
#[derive(Clone)]
pub(crate) struct Latch {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Latch {
    fn new() -> Latch {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    fn open(&self) {
        let (flag, condvar) = &*self.inner;
        let mut open = flag.lock().unwrap();
        if !*open {
            *open = true;
            condvar.notify_all();
        }
    }

    fn wait(&self) {
        let (flag, condvar) = &*self.inner;
        let mut open = flag.lock().unwrap();
        while !*open {
            open = condvar.wait(open).unwrap();
        }
    }
}

/// Cooperative cancellation for the processor's blocking operations. Cloning yields handles to
/// the same token.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Failure modes of the processor.
#[derive(Debug)]
pub enum ProcessorError {
    /// The message variant is not handled on the path it arrived on.
    Unsupported,

    /// No genesis has been established; consensus messages are refused.
    NoGenesis,

    /// The genesis root declared by the sender disagrees with the root computed from staging the
    /// roster.
    GenesisRootMismatch { expected: Digest, computed: Digest },

    /// The catch-up deadline elapsed before the replica reached the latest observed index.
    SyncTimeout,

    /// The surrounding operation was cancelled.
    Cancelled,

    /// The state machine rejected the operation.
    Pbft(PbftError),

    /// A store rejected a write.
    Store(StoreError),
}

impl From<PbftError> for ProcessorError {
    fn from(value: PbftError) -> Self {
        ProcessorError::Pbft(value)
    }
}

impl From<StoreError> for ProcessorError {
    fn from(value: StoreError) -> Self {
        ProcessorError::Store(value)
    }
}
