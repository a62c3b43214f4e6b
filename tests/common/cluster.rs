//! Helpers for assembling local clusters of replicas and driving them through consensus rounds.
//!
//! The round driver below plays the role of the collective-signing module: it invokes every
//! participant's processor, collects the returned bytes, signs them with each participant's
//! signing key, and aggregates the signatures into the phase's collective signature.

use std::sync::{Arc, Mutex};

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use cosipbft_rs::{
    app::{App, ProducePayloadRequest},
    config::Configuration,
    event_bus::UserDefinedHandlers,
    messages::{BlockMessage, CommitMessage, ConsensusMessage, DoneMessage, PropagateGenesis},
    processor::{CancelToken, ProcessorError},
    replica::Replica,
    tree::{StateTree, ROSTER_KEY},
    types::{
        basic::{Address, BlockIndex, Digest, SignatureBytes, TreeUpdates},
        block::{Block, Genesis},
        certificate::CollectiveSignature,
        roster::Roster,
    },
};

use crate::common::{
    counter_app::CounterApp,
    mem_db::MemDB,
    mem_tree::MemTree,
    network::{mock_network, NetworkStub},
};

pub(crate) struct Node {
    pub(crate) address: Address,
    pub(crate) signing_key: SigningKey,
    pub(crate) app: CounterApp,
    pub(crate) replica: Replica<MemDB, MemTree, CounterApp, NetworkStub>,
}

impl Node {
    fn new(address: Address, signing_key: SigningKey, network: NetworkStub, configuration: Configuration) -> Node {
        let tx_queue = Arc::new(Mutex::new(Vec::new()));
        let app = CounterApp::new(tx_queue);

        let replica = Replica::start(
            app.clone(),
            network,
            MemDB::new(),
            MemTree::new(),
            configuration,
            UserDefinedHandlers::default(),
        );

        Node {
            address,
            signing_key,
            app,
            replica,
        }
    }
}

pub(crate) fn new_cluster(n: usize) -> Vec<Node> {
    new_cluster_with(n, |_| {})
}

pub(crate) fn new_cluster_with(n: usize, configure: impl Fn(&mut Configuration)) -> Vec<Node> {
    let addresses: Vec<Address> = (0..n)
        .map(|i| Address::new(format!("/replica/{}", i)))
        .collect();
    let network_stubs = mock_network(addresses.iter().cloned());

    addresses
        .into_iter()
        .zip(network_stubs)
        .map(|(address, network)| {
            let mut configuration = Configuration::new(address.clone());
            configure(&mut configuration);
            Node::new(
                address,
                SigningKey::generate(&mut OsRng),
                network,
                configuration,
            )
        })
        .collect()
}

/// The roster putting every node of the cluster in construction order.
pub(crate) fn genesis_roster(nodes: &[Node]) -> Roster {
    Roster::new(
        nodes
            .iter()
            .map(|node| (node.address.clone(), node.signing_key.verifying_key()))
            .collect(),
    )
}

/// The tree root the bootstrap produces for the given roster, computed the same way every
/// replica computes it: by staging the roster at the reserved key over an empty tree.
pub(crate) fn genesis_root(roster: &Roster) -> Digest {
    let mut updates = TreeUpdates::new();
    updates.set(ROSTER_KEY.to_vec(), roster.encode());
    MemTree::new().stage(&updates).root()
}

/// Deliver the one-shot bootstrap broadcast to every node.
pub(crate) fn propagate_genesis(nodes: &[Node], roster: &Roster) {
    let genesis = Genesis::new(roster.clone(), genesis_root(roster));
    for node in nodes {
        node.replica
            .processor()
            .process(
                &nodes[0].address,
                ConsensusMessage::PropagateGenesis(PropagateGenesis {
                    genesis: genesis.clone(),
                }),
            )
            .unwrap();
    }
}

/// The candidate block the given leader proposes for its queued transactions. Draining the
/// transaction pool into a payload is the execution engine's job.
pub(crate) fn propose_block(leader: &Node) -> Block {
    let processor = leader.replica.processor();
    let tree = processor.tree().get();
    let index = BlockIndex::new(processor.blocks().len());
    let backlink = processor.blocks().last().unwrap().block.hash;

    let response = leader
        .app
        .clone()
        .produce_payload(ProducePayloadRequest::new(index, &tree));
    let tree_root = tree.stage(&response.updates).root();

    Block::new(index, backlink, tree_root, response.data_hash, response.data)
}

/// Drive one full consensus round (prepare, commit, done) over all nodes, with the given node
/// acting as leader. Returns the digest of the finalized block.
pub(crate) fn run_round(nodes: &[Node], leader: usize) -> Result<Digest, ProcessorError> {
    let participants: Vec<usize> = (0..nodes.len()).collect();
    run_round_among(nodes, &participants, leader)
}

/// Drive one full consensus round over a subset of the cluster. Participants must all be members
/// of the current roster.
pub(crate) fn run_round_among(
    nodes: &[Node],
    participants: &[usize],
    leader: usize,
) -> Result<Digest, ProcessorError> {
    let leader_node = &nodes[leader];
    let block = propose_block(leader_node);
    let id = block.hash;
    let latest = block.index;
    let roster = leader_node.replica.processor().current_roster().unwrap();
    let cancel = CancelToken::new();

    // Prepare phase: every participant validates and stages the candidate, then signs the
    // digest it returns.
    let mut prepare_sig = CollectiveSignature::new(roster.len());
    for &i in participants {
        let node = &nodes[i];
        let digest_bytes = node.replica.processor().invoke(
            &leader_node.address,
            ConsensusMessage::BlockMessage(BlockMessage {
                block: block.clone(),
                latest,
            }),
            &cancel,
        )?;
        let (_, pos) = roster.get(&node.address).unwrap();
        prepare_sig.set(pos, sign(&node.signing_key, &digest_bytes));
    }

    // Commit phase: every participant verifies the prepare signature and signs its marshalled
    // form.
    let mut commit_sig = CollectiveSignature::new(roster.len());
    for &i in participants {
        let node = &nodes[i];
        let marshalled = node.replica.processor().invoke(
            &leader_node.address,
            ConsensusMessage::CommitMessage(CommitMessage {
                id,
                signature: prepare_sig.clone(),
            }),
            &cancel,
        )?;
        let (_, pos) = roster.get(&node.address).unwrap();
        commit_sig.set(pos, sign(&node.signing_key, &marshalled));
    }

    // Done: every participant finalizes.
    for &i in participants {
        nodes[i].replica.processor().process(
            &leader_node.address,
            ConsensusMessage::DoneMessage(DoneMessage {
                id,
                signature: commit_sig.clone(),
            }),
        )?;
    }

    Ok(id)
}

// A participant's contribution to a collective signature.
fn sign(key: &SigningKey, message: &[u8]) -> SignatureBytes {
    SignatureBytes::new(key.sign(message).to_bytes())
}
