/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The PBFT state machine: the deterministic engine that turns prepare, commit, done, and view
//! messages into an append-only, collectively signed chain of blocks, keeping the state tree in
//! lock-step.
//!
//! ## States
//!
//! The machine is always in one of four states:
//! - [`State::None`]: no proposal in flight.
//! - [`State::Prepare`]: a candidate block was validated and its state transition staged.
//! - [`State::Commit`]: a valid prepare-phase collective signature was observed for the staged
//!   candidate.
//! - [`State::ViewChange`]: a quorum of matching views was accumulated; the machine rotates the
//!   leader and returns to `None` before the call that triggered the rotation returns.
//!
//! ## Single-writer discipline
//!
//! The machine owns the only mutable references to the tree cache and the block store. All
//! state-changing calls are serialized by the processor's lock; the machine itself performs no
//! blocking operation, so the lock is never held across a suspension point.
//!
//! ## Atomicity
//!
//! [`prepare`](Pbft::prepare) stages a tree but commits nothing: on any failure the staged tree
//! is dropped and every key keeps its committed value. [`finalize`](Pbft::finalize) is the only
//! place a staged tree is committed, immediately followed by the link append and the ordering
//! notification; on any failure it discards the stage and resets to `None`, so no partial state
//! is ever observable.

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::app::{App, ExecutePayloadRequest, ExecutePayloadResponse};
use crate::events::{
    CommitEvent, Event, FinalizeEvent, OrderingEvent, PrepareEvent, UpdateRosterEvent,
    ViewChangeEvent,
};
use crate::store::blocks::BlockStore;
use crate::store::pluggables::KVStore;
use crate::store::StoreError;
use crate::tree::{read_roster, StateTree, TreeCache};
use crate::types::basic::{Address, BlockIndex, Digest, LeaderIndex};
use crate::types::block::{Block, BlockLink};
use crate::types::certificate::CollectiveSignature;
use crate::types::roster::{Roster, RosterError};
use crate::watcher::Watcher;

/// The externally observable state of the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    None,
    Prepare,
    Commit,
    ViewChange,
}

/// A view vote: `from` proposes to abandon the contested block `id` and make the roster member
/// designated by `leader` the next proposer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    pub from: Address,
    pub id: Digest,
    pub leader: LeaderIndex,
}

/// The deterministic consensus core.
pub struct Pbft<K: KVStore, T: StateTree> {
    state: State,
    round: Round<T>,
    blocks: BlockStore<K>,
    tree: TreeCache<T>,
    ordering: Watcher<OrderingEvent>,
    event_publisher: Option<Sender<Event>>,
}

/// Per-attempt bookkeeping. `leader` survives resets; everything else belongs to the current
/// block attempt and is cleared when the machine returns to [`State::None`].
struct Round<T: StateTree> {
    leader: LeaderIndex,
    block: Option<Block>,
    staged: Option<T>,
    prepare_sig: Option<CollectiveSignature>,
    views: HashMap<Address, View>,
}

impl<T: StateTree> Round<T> {
    fn new() -> Round<T> {
        Self {
            leader: LeaderIndex::new(0),
            block: None,
            staged: None,
            prepare_sig: None,
            views: HashMap::new(),
        }
    }

    fn reset(&mut self) {
        self.block = None;
        self.staged = None;
        self.prepare_sig = None;
        self.views.clear();
    }
}

impl<K: KVStore, T: StateTree> Pbft<K, T> {
    pub fn new(
        blocks: BlockStore<K>,
        tree: TreeCache<T>,
        ordering: Watcher<OrderingEvent>,
        event_publisher: Option<Sender<Event>>,
    ) -> Pbft<K, T> {
        Self {
            state: State::None,
            round: Round::new(),
            blocks,
            tree,
            ordering,
            event_publisher,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The current leader index. The effective proposer is the roster member at
    /// `leader mod roster.len()`.
    pub fn leader(&self) -> LeaderIndex {
        self.round.leader
    }

    /// The roster in force for the next block: the one committed by the latest finalized block.
    pub fn current_roster(&self) -> Result<Roster, PbftError> {
        Ok(read_roster(&self.tree.get())?)
    }

    /// Validate a candidate block and stage its state transition.
    ///
    /// Only valid in [`State::None`], except that re-presenting the block already staged is
    /// idempotent and returns the same digest. Any other block while a proposal is in flight
    /// fails with [`PbftError::Busy`].
    pub fn prepare(&mut self, block: Block, app: &mut impl App<T>) -> Result<Digest, PbftError> {
        if let Some(pending) = &self.round.block {
            if pending.hash == block.hash {
                // Re-presentation of the staged block, or of a block abandoned by a view change
                // whose stage was kept because the quorum contested this very id.
                if self.state == State::None && self.round.staged.is_some() {
                    self.state = State::Prepare;
                }
                return Ok(block.hash);
            }
            return Err(PbftError::Busy);
        }
        if self.state != State::None {
            return Err(PbftError::Busy);
        }

        if !block.is_correct() {
            return Err(PbftError::InvalidBlock);
        }
        if block.index.int() != self.blocks.len() {
            return Err(PbftError::InvalidBlock);
        }
        let head = self.blocks.last().ok_or(PbftError::MissingGenesis)?;
        if block.backlink != head.block.hash {
            return Err(PbftError::InvalidBlock);
        }

        let current = self.tree.get();
        let updates = match app.execute_payload(ExecutePayloadRequest::new(&block, &current)) {
            ExecutePayloadResponse::Valid { updates } => updates,
            ExecutePayloadResponse::Invalid => return Err(PbftError::InvalidPayload),
        };

        let staged = current.stage(&updates);
        if staged.root() != block.tree_root {
            // The stage is dropped here; the committed tree is untouched.
            return Err(PbftError::RootMismatch {
                declared: block.tree_root,
                computed: staged.root(),
            });
        }

        let id = block.hash;
        Event::Prepare(PrepareEvent {
            timestamp: SystemTime::now(),
            index: block.index,
            id,
        })
        .publish(&self.event_publisher);

        self.round.block = Some(block);
        self.round.staged = Some(staged);
        self.state = State::Prepare;

        Ok(id)
    }

    /// Record the prepare-phase collective signature for the staged proposal.
    ///
    /// Only valid in [`State::Prepare`] for the staged id; repeating the call in
    /// [`State::Commit`] for the same id is idempotent.
    pub fn commit(
        &mut self,
        id: Digest,
        signature: CollectiveSignature,
    ) -> Result<(), PbftError> {
        match self.state {
            State::Commit if self.pending_id() == Some(id) => return Ok(()),
            State::Prepare => (),
            _ => return Err(PbftError::Unexpected),
        }
        if self.pending_id() != Some(id) {
            return Err(PbftError::Unexpected);
        }

        let roster = self.current_roster()?;
        if !signature.verify(&roster, &id.bytes()) {
            return Err(PbftError::SigInvalid);
        }

        self.round.prepare_sig = Some(signature);
        self.state = State::Commit;

        Event::Commit(CommitEvent {
            timestamp: SystemTime::now(),
            id,
        })
        .publish(&self.event_publisher);

        Ok(())
    }

    /// Finalize the committed proposal: commit the staged tree, advance the tree cache, append
    /// the link, and notify the ordering stream, atomically with respect to observers.
    ///
    /// Only valid in [`State::Commit`] for the committed id. On any failure the staged tree is
    /// discarded and the machine returns to [`State::None`].
    ///
    /// Returns the new roster if finalizing the block replaced the value at the reserved roster
    /// key.
    pub fn finalize(
        &mut self,
        id: Digest,
        signature: CollectiveSignature,
    ) -> Result<Option<Roster>, PbftError> {
        if self.state != State::Commit || self.pending_id() != Some(id) {
            return Err(PbftError::Unexpected);
        }

        let result = self.try_finalize(id, signature);
        if result.is_err() {
            self.round.reset();
            self.state = State::None;
        }
        result
    }

    fn try_finalize(
        &mut self,
        id: Digest,
        signature: CollectiveSignature,
    ) -> Result<Option<Roster>, PbftError> {
        let roster = self.current_roster()?;

        // Safety: state is Commit, so the prepare signature and the staged round are present.
        let prepare_sig = self.round.prepare_sig.take().unwrap();
        if !signature.verify(&roster, &prepare_sig.to_bytes()) {
            return Err(PbftError::SigInvalid);
        }

        let block = self.round.block.take().unwrap();
        let mut staged = self.round.staged.take().unwrap();

        staged.commit();
        self.tree.set(staged.clone());

        let index = block.index;
        let link = BlockLink::new(block, prepare_sig, signature);
        self.blocks.store(link)?;

        let new_roster = self.roster_after_commit(&staged, &roster, index);

        self.round.reset();
        self.state = State::None;

        self.ordering.notify(OrderingEvent { index });
        Event::Finalize(FinalizeEvent {
            timestamp: SystemTime::now(),
            index,
            id,
        })
        .publish(&self.event_publisher);

        Ok(new_roster)
    }

    /// Install a fully signed link fetched by the sync client: the whole prepare → commit →
    /// finalize sequence verified and applied in one step.
    ///
    /// Only valid in [`State::None`]; a replica that is mid-proposal must not be installing
    /// foreign links underneath its own stage.
    pub fn catch_up(
        &mut self,
        link: BlockLink,
        app: &mut impl App<T>,
    ) -> Result<Option<Roster>, PbftError> {
        if self.state != State::None {
            return Err(PbftError::Busy);
        }

        if !link.block.is_correct() {
            return Err(PbftError::InvalidBlock);
        }
        if link.block.index.int() < self.blocks.len() {
            return Err(PbftError::Store(StoreError::AlreadyFinal));
        }
        if link.block.index.int() != self.blocks.len() {
            return Err(PbftError::InvalidBlock);
        }
        let head = self.blocks.last().ok_or(PbftError::MissingGenesis)?;
        if link.block.backlink != head.block.hash {
            return Err(PbftError::InvalidBlock);
        }

        let roster = self.current_roster()?;
        if !link.prepare_sig.verify(&roster, &link.block.hash.bytes()) {
            return Err(PbftError::SigInvalid);
        }
        if !link.commit_sig.verify(&roster, &link.prepare_sig.to_bytes()) {
            return Err(PbftError::SigInvalid);
        }

        let current = self.tree.get();
        let updates =
            match app.execute_payload(ExecutePayloadRequest::new(&link.block, &current)) {
                ExecutePayloadResponse::Valid { updates } => updates,
                ExecutePayloadResponse::Invalid => return Err(PbftError::InvalidPayload),
            };

        let mut staged = current.stage(&updates);
        if staged.root() != link.block.tree_root {
            return Err(PbftError::RootMismatch {
                declared: link.block.tree_root,
                computed: staged.root(),
            });
        }

        staged.commit();
        self.tree.set(staged.clone());

        let index = link.block.index;
        let id = link.block.hash;
        self.blocks.store(link)?;

        let new_roster = self.roster_after_commit(&staged, &roster, index);

        self.ordering.notify(OrderingEvent { index });
        Event::Finalize(FinalizeEvent {
            timestamp: SystemTime::now(),
            index,
            id,
        })
        .publish(&self.event_publisher);

        Ok(new_roster)
    }

    /// Record a view vote. Votes from non-members are ignored; votes accumulate per (id, leader)
    /// pair, a later vote from the same sender replacing its earlier one.
    ///
    /// When 2f + 1 matching votes are accumulated, any staged tree for a different id is
    /// discarded, the leader index advances to the vote's leader, and the machine returns to
    /// [`State::None`] so the new leader may re-propose.
    pub fn accept(&mut self, view: View) -> Result<(), PbftError> {
        let roster = self.current_roster()?;
        if !roster.contains(&view.from) {
            log::debug!("ignoring view vote from non-member {}", view.from);
            return Ok(());
        }

        let (id, leader) = (view.id, view.leader);
        self.round.views.insert(view.from.clone(), view);

        let matching = self
            .round
            .views
            .values()
            .filter(|vote| vote.id == id && vote.leader == leader)
            .count();
        if matching < roster.quorum() {
            return Ok(());
        }

        self.state = State::ViewChange;

        if self.round.block.as_ref().map(|block| block.hash) != Some(id) {
            self.round.block = None;
            self.round.staged = None;
        }
        self.round.prepare_sig = None;
        self.round.views.clear();
        self.round.leader = leader;
        self.state = State::None;

        Event::ViewChange(ViewChangeEvent {
            timestamp: SystemTime::now(),
            id,
            leader,
        })
        .publish(&self.event_publisher);

        Ok(())
    }

    fn pending_id(&self) -> Option<Digest> {
        self.round.block.as_ref().map(|block| block.hash)
    }

    /// Reads the roster out of a freshly committed tree and reports it if it differs from the
    /// roster that signed the block.
    fn roster_after_commit(
        &self,
        committed: &T,
        signing_roster: &Roster,
        index: BlockIndex,
    ) -> Option<Roster> {
        match read_roster(committed) {
            Ok(new_roster) if &new_roster != signing_roster => {
                Event::UpdateRoster(UpdateRosterEvent {
                    timestamp: SystemTime::now(),
                    index,
                    roster_len: new_roster.len(),
                })
                .publish(&self.event_publisher);
                Some(new_roster)
            }
            _ => None,
        }
    }
}

/// Failure modes of the state machine.
#[derive(Debug)]
pub enum PbftError {
    /// The machine already holds a different staged proposal. The caller may retry after a view
    /// change.
    Busy,

    /// The declared tree root disagrees with the recomputation over the staged tree.
    RootMismatch { declared: Digest, computed: Digest },

    /// A collective signature failed verification under the current roster.
    SigInvalid,

    /// The operation does not apply to the machine's current state, or names a different id than
    /// the proposal in flight.
    Unexpected,

    /// The block's digest, index, or backlink is inconsistent with the chain head.
    InvalidBlock,

    /// The execution engine rejected the payload.
    InvalidPayload,

    /// No genesis has been established; the machine cannot evaluate proposals.
    MissingGenesis,

    /// The current roster could not be read from the state tree.
    Roster(RosterError),

    /// Appending to the block store failed.
    Store(StoreError),
}

impl From<RosterError> for PbftError {
    fn from(value: RosterError) -> Self {
        PbftError::Roster(value)
    }
}

impl From<StoreError> for PbftError {
    fn from(value: StoreError) -> Self {
        PbftError::Store(value)
    }
}
