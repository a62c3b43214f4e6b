//! Tests the view-change path: 2f + 1 matching view votes discard the contested stage, rotate
//! the leader, and let the new leader re-propose.

mod common;

use log::LevelFilter;

use cosipbft_rs::{
    messages::{BlockMessage, ConsensusMessage, ViewMessage},
    pbft::{PbftError, State},
    processor::{CancelToken, ProcessorError},
    types::basic::{Address, LeaderIndex},
};

use common::cluster::{genesis_roster, new_cluster, propagate_genesis, propose_block};
use common::counter_app::CounterTransaction;
use common::logging::setup_logger;

#[test]
fn quorum_of_views_rotates_the_leader() {
    setup_logger(LevelFilter::Warn);

    // n = 4, f = 1, so a view change needs 2f + 1 = 3 matching votes.
    let nodes = new_cluster(4);
    let roster = genesis_roster(&nodes);
    propagate_genesis(&nodes, &roster);
    let cancel = CancelToken::new();

    // Put the follower under test into Prepare for block A.
    nodes[0].app.submit(CounterTransaction::Increment(b"a".to_vec()));
    let block_a = propose_block(&nodes[0]);

    let follower = nodes[1].replica.processor();
    follower
        .invoke(
            &nodes[0].address,
            ConsensusMessage::BlockMessage(BlockMessage {
                block: block_a.clone(),
                latest: block_a.index,
            }),
            &cancel,
        )
        .unwrap();
    assert_eq!(follower.state(), State::Prepare);
    assert_eq!(follower.leader(), LeaderIndex::new(0));

    // The new leader's candidate, contested by the view votes.
    nodes[0].app.submit(CounterTransaction::Increment(b"b".to_vec()));
    let block_b = propose_block(&nodes[0]);
    assert_ne!(block_a.hash, block_b.hash);

    let view_vote = ConsensusMessage::ViewMessage(ViewMessage {
        id: block_b.hash,
        leader: LeaderIndex::new(2),
    });

    // A vote from a non-member is ignored entirely.
    follower
        .process(&Address::new("/stranger"), view_vote.clone())
        .unwrap();

    // Two member votes are not enough.
    follower.process(&nodes[0].address, view_vote.clone()).unwrap();
    follower.process(&nodes[2].address, view_vote.clone()).unwrap();
    assert_eq!(follower.state(), State::Prepare);
    assert!(matches!(
        follower.invoke(
            &nodes[2].address,
            ConsensusMessage::BlockMessage(BlockMessage {
                block: block_b.clone(),
                latest: block_b.index,
            }),
            &cancel,
        ),
        Err(ProcessorError::Pbft(PbftError::Busy))
    ));

    // The third vote reaches the quorum: the stage for A is discarded, the leader rotates, and
    // the machine returns to None.
    follower.process(&nodes[3].address, view_vote).unwrap();
    assert_eq!(follower.state(), State::None);
    assert_eq!(follower.leader(), LeaderIndex::new(2));

    // A prepare from the new leader for the contested id now succeeds.
    let digest = follower
        .invoke(
            &nodes[2].address,
            ConsensusMessage::BlockMessage(BlockMessage {
                block: block_b.clone(),
                latest: block_b.index,
            }),
            &cancel,
        )
        .unwrap();
    assert_eq!(digest, block_b.hash.bytes().to_vec());
    assert_eq!(follower.state(), State::Prepare);
}
