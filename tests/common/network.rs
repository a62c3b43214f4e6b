//! A "mock" (totally local) network for passing around ordering-service messages.

use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use cosipbft_rs::{
    messages::Message,
    networking::Network,
    types::{basic::Address, roster::Roster},
};

/// A network stub that passes messages to and from nodes using channels.
///
/// ## Limitations
///
/// `NetworkStub`'s implementation of the [`Network`] trait's `init_roster` and `update_roster`
/// methods are no-ops. As a consequence, the set of peers reachable from a given `NetworkStub` is
/// fixed on construction by [`mock_network`]. Tests that rotate the roster must "plan ahead" and
/// create the mock network with every address that will ever be a member.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    my_address: Address,
    all_peers: HashMap<Address, Sender<(Address, Message)>>,
    inbox: Arc<Mutex<Receiver<(Address, Message)>>>,
}

impl Network for NetworkStub {
    fn init_roster(&mut self, _: Roster) {}

    fn update_roster(&mut self, _: Roster) {}

    fn send(&mut self, peer: &Address, message: Message) {
        if let Some(peer) = self.all_peers.get(peer) {
            let _ = peer.send((self.my_address.clone(), message));
        }
    }

    fn broadcast(&mut self, message: Message) {
        for (_, peer) in &self.all_peers {
            let _ = peer.send((self.my_address.clone(), message.clone()));
        }
    }

    fn recv(&mut self) -> Option<(Address, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

/// Create a vector of `NetworkStub`s, connecting the provided set of `peers`.
///
/// `NetworkStub`s feature in the returned vector in the same order as the provided `peers`, i.e.,
/// the i-th network stub is the network stub for the i-th peer.
pub(crate) fn mock_network(peers: impl Iterator<Item = Address>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(Address, Receiver<(Address, Message)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer.clone(), sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(my_address, inbox)| NetworkStub {
            my_address,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
