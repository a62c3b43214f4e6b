//! Tests the storage layer on its own: chain continuity checks in the block store, watch
//! semantics, the genesis singleton, and the sync watermark.

mod common;

use cosipbft_rs::{
    block_sync::Synchronizer,
    store::{blocks::BlockStore, genesis::GenesisStore, StoreError},
    types::{
        basic::{BlockIndex, Data, Digest},
        block::{Block, BlockLink, Genesis},
        roster::Roster,
    },
};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use common::mem_db::MemDB;

fn link(index: u64, backlink: Digest) -> BlockLink {
    // Store-level tests do not verify signatures, so an unsigned link suffices.
    BlockLink::genesis(Block::new(
        BlockIndex::new(index),
        backlink,
        Digest::zero(),
        Digest::zero(),
        Data::default(),
    ))
}

#[test]
fn append_only_log_invariants() {
    let mut store = BlockStore::new(MemDB::new());
    assert_eq!(store.len(), 0);
    assert!(store.last().is_none());

    let link0 = link(0, Digest::zero());
    store.store(link0.clone()).unwrap();

    // A link at an occupied index is refused.
    assert_eq!(
        store.store(link(0, Digest::zero())),
        Err(StoreError::AlreadyFinal)
    );

    // A link skipping ahead is refused.
    assert_eq!(
        store.store(link(5, link0.block.hash)),
        Err(StoreError::BadLink)
    );

    // A link with a broken backlink is refused.
    assert_eq!(store.store(link(1, Digest::zero())), Err(StoreError::BadLink));

    let link1 = link(1, link0.block.hash);
    store.store(link1.clone()).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.last().unwrap().block.hash, link1.block.hash);
    assert_eq!(
        store.get(BlockIndex::new(0)).unwrap().block.hash,
        link0.block.hash
    );
    assert_eq!(
        store.get_by_digest(&link1.block.hash).unwrap().block.index,
        BlockIndex::new(1)
    );
    assert!(store.get_by_digest(&Digest::zero()).is_none());
}

#[test]
fn watch_sees_only_future_appends() {
    let mut store = BlockStore::new(MemDB::new());

    let link0 = link(0, Digest::zero());
    store.store(link0.clone()).unwrap();

    // A subscriber registered at length 1 sees appends 1 and 2, but not the history.
    let watch = store.watch();

    let link1 = link(1, link0.block.hash);
    let link2 = link(2, link1.block.hash);
    store.store(link1.clone()).unwrap();
    store.store(link2.clone()).unwrap();

    assert_eq!(watch.try_recv().unwrap().block.index, BlockIndex::new(1));
    assert_eq!(watch.try_recv().unwrap().block.index, BlockIndex::new(2));
    assert!(watch.try_recv().is_err());

    // A dropped subscriber does not obstruct later appends.
    drop(watch);
    store.store(link(3, link2.block.hash)).unwrap();
}

#[test]
fn genesis_store_is_singleton() {
    let mut store = GenesisStore::new(MemDB::new());
    assert!(!store.exists());
    assert!(store.get().is_none());

    let signing_key = SigningKey::generate(&mut OsRng);
    let roster = Roster::new(vec![(
        cosipbft_rs::types::basic::Address::new("/replica/0"),
        signing_key.verifying_key(),
    )]);
    let genesis = Genesis::new(roster, Digest::zero());

    store.set(&genesis).unwrap();
    assert!(store.exists());
    assert_eq!(store.set(&genesis), Err(StoreError::AlreadySet));
    assert!(store.get().unwrap() == genesis);
}

#[test]
fn synchronizer_watermark_is_monotonic() {
    let sync = Synchronizer::new();
    assert_eq!(sync.latest(), 0);

    sync.observe(3);
    assert_eq!(sync.latest(), 3);

    // Older observations never move the watermark backwards.
    sync.observe(1);
    assert_eq!(sync.latest(), 3);

    sync.observe(7);
    assert_eq!(sync.latest(), 7);
}
