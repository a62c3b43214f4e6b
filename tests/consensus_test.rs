//! Tests the consensus processor end to end: the happy path through prepare, commit, and done,
//! the idempotence and exclusivity of prepare, root-mismatch rejection, and roster rotation
//! through the reserved state-tree key.

mod common;

use std::time::Duration;

use log::LevelFilter;

use cosipbft_rs::{
    events::OrderingEvent,
    messages::{BlockMessage, ConsensusMessage},
    pbft::{PbftError, State},
    processor::{CancelToken, ProcessorError},
    types::{
        basic::{BlockIndex, Digest},
        block::Block,
    },
};

use common::cluster::{
    genesis_roster, new_cluster, propagate_genesis, propose_block, run_round, run_round_among,
};
use common::counter_app::{counter_value, CounterTransaction};
use common::logging::setup_logger;

#[test]
fn happy_path_single_block() {
    setup_logger(LevelFilter::Warn);

    let nodes = new_cluster(4);
    let roster = genesis_roster(&nodes);
    propagate_genesis(&nodes, &roster);

    let watches: Vec<_> = nodes
        .iter()
        .map(|node| node.replica.processor().watch())
        .collect();

    nodes[0].app.submit(CounterTransaction::Increment(b"x".to_vec()));
    let id = run_round(&nodes, 0).unwrap();

    for node in &nodes {
        let processor = node.replica.processor();
        assert_eq!(processor.blocks().len(), 2);
        assert_eq!(counter_value(&processor.tree().get(), b"x"), 1);
        assert_eq!(processor.state(), State::None);

        let genesis_link = processor.blocks().get(BlockIndex::new(0)).unwrap();
        let link = processor.blocks().get(BlockIndex::new(1)).unwrap();
        assert_eq!(link.block.index, BlockIndex::new(1));
        assert_eq!(link.block.hash, id);
        assert_eq!(link.block.backlink, genesis_link.block.hash);
        assert!(link.prepare_sig.verify(&roster, &id.bytes()));
        assert!(link
            .commit_sig
            .verify(&roster, &link.prepare_sig.to_bytes()));
    }

    // A single {index: 1} event is delivered to every subscriber.
    for watch in &watches {
        assert_eq!(
            watch.recv_timeout(Duration::from_secs(1)).unwrap(),
            OrderingEvent {
                index: BlockIndex::new(1)
            }
        );
        assert!(watch.try_recv().is_err());
    }
}

#[test]
fn prepare_is_idempotent_and_exclusive() {
    setup_logger(LevelFilter::Warn);

    let nodes = new_cluster(4);
    let roster = genesis_roster(&nodes);
    propagate_genesis(&nodes, &roster);
    let cancel = CancelToken::new();

    nodes[0].app.submit(CounterTransaction::Increment(b"a".to_vec()));
    let block_a = propose_block(&nodes[0]);

    let follower = nodes[1].replica.processor();
    let prepare = |block: &Block| {
        follower.invoke(
            &nodes[0].address,
            ConsensusMessage::BlockMessage(BlockMessage {
                block: block.clone(),
                latest: block.index,
            }),
            &cancel,
        )
    };

    // Re-presenting the same block returns the same digest.
    let digest = prepare(&block_a).unwrap();
    assert_eq!(digest, block_a.hash.bytes().to_vec());
    assert_eq!(prepare(&block_a).unwrap(), digest);
    assert_eq!(follower.state(), State::Prepare);

    // Any other block while a proposal is staged is refused.
    nodes[0].app.submit(CounterTransaction::Increment(b"b".to_vec()));
    let block_b = propose_block(&nodes[0]);
    assert_ne!(block_a.hash, block_b.hash);
    assert!(matches!(
        prepare(&block_b),
        Err(ProcessorError::Pbft(PbftError::Busy))
    ));
    assert_eq!(follower.state(), State::Prepare);
}

#[test]
fn root_mismatch_leaves_no_trace() {
    setup_logger(LevelFilter::Warn);

    let nodes = new_cluster(4);
    let roster = genesis_roster(&nodes);
    propagate_genesis(&nodes, &roster);
    let cancel = CancelToken::new();

    nodes[0].app.submit(CounterTransaction::Increment(b"x".to_vec()));
    let good = propose_block(&nodes[0]);
    let bad = Block::new(
        good.index,
        good.backlink,
        Digest::zero(),
        good.data_hash,
        good.data.clone(),
    );

    let follower = nodes[1].replica.processor();
    let result = follower.invoke(
        &nodes[0].address,
        ConsensusMessage::BlockMessage(BlockMessage {
            block: bad,
            latest: good.index,
        }),
        &cancel,
    );
    assert!(matches!(
        result,
        Err(ProcessorError::Pbft(PbftError::RootMismatch { .. }))
    ));

    // The machine is back in `None` and the staged values are not visible anywhere, neither in
    // the cache nor in the durable store.
    assert_eq!(follower.state(), State::None);
    assert_eq!(counter_value(&follower.tree().get(), b"x"), 0);
    assert!(follower.tree().get().durable_value(b"x").is_none());

    // The same proposal with the correct root is accepted afterwards.
    let digest = follower
        .invoke(
            &nodes[0].address,
            ConsensusMessage::BlockMessage(BlockMessage {
                block: good.clone(),
                latest: good.index,
            }),
            &cancel,
        )
        .unwrap();
    assert_eq!(digest, good.hash.bytes().to_vec());
}

#[test]
fn roster_rotation_takes_effect_at_the_next_block() {
    setup_logger(LevelFilter::Warn);

    let nodes = new_cluster(4);
    let roster = genesis_roster(&nodes);
    propagate_genesis(&nodes, &roster);

    // Block 1 shrinks the roster to the first three members.
    let new_roster = genesis_roster(&nodes[..3]);
    nodes[0]
        .app
        .submit(CounterTransaction::SetRoster(new_roster.encode()));
    run_round(&nodes, 0).unwrap();

    for node in &nodes {
        let current = node.replica.processor().current_roster().unwrap();
        assert_eq!(current.len(), 3);
        assert!(current == new_roster);
    }

    // Block 1 itself was signed under the genesis roster.
    let link1 = nodes[0]
        .replica
        .processor()
        .blocks()
        .get(BlockIndex::new(1))
        .unwrap();
    assert!(link1.prepare_sig.verify(&roster, &link1.block.hash.bytes()));

    // Block 2 is driven by, and verified against, the new roster.
    nodes[0].app.submit(CounterTransaction::Increment(b"y".to_vec()));
    let id = run_round_among(&nodes, &[0, 1, 2], 0).unwrap();

    let link2 = nodes[0]
        .replica
        .processor()
        .blocks()
        .get(BlockIndex::new(2))
        .unwrap();
    assert_eq!(link2.block.hash, id);
    assert!(link2.prepare_sig.verify(&new_roster, &id.bytes()));
    assert!(link2
        .commit_sig
        .verify(&new_roster, &link2.prepare_sig.to_bytes()));
    assert!(!link2.prepare_sig.verify(&roster, &id.bytes()));
}
