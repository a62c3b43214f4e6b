//! A small execution engine for driving the ordering core in tests: payloads are lists of
//! transactions that increment 64-bit counters at arbitrary keys, or replace the roster stored at
//! the reserved key.

use std::sync::{Arc, Mutex};

use borsh::{BorshDeserialize, BorshSerialize};
use cosipbft_rs::{
    app::{
        App, ExecutePayloadRequest, ExecutePayloadResponse, ProducePayloadRequest,
        ProducePayloadResponse,
    },
    tree::{StateTree, ROSTER_KEY},
    types::basic::{Data, Datum, Digest, TreeUpdates},
};
use sha2::{Digest as _, Sha256};

use crate::common::mem_tree::MemTree;

#[derive(Clone)]
pub(crate) struct CounterApp {
    tx_queue: Arc<Mutex<Vec<CounterTransaction>>>,
}

#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub(crate) enum CounterTransaction {
    Increment(Vec<u8>),
    SetRoster(Vec<u8>),
}

impl App<MemTree> for CounterApp {
    fn produce_payload(&mut self, request: ProducePayloadRequest<MemTree>) -> ProducePayloadResponse {
        let transactions = {
            let mut tx_queue = self.tx_queue.lock().unwrap();
            let transactions = tx_queue.clone();
            tx_queue.clear();
            transactions
        };

        let (data, data_hash) = encode_payload(&transactions);
        let updates = execute(&transactions, request.tree());

        ProducePayloadResponse {
            data,
            data_hash,
            updates,
        }
    }

    fn execute_payload(&mut self, request: ExecutePayloadRequest<MemTree>) -> ExecutePayloadResponse {
        let block = request.block();
        if block.data.len() != 1 {
            return ExecutePayloadResponse::Invalid;
        }

        let datum = &block.data.vec()[0];
        let transactions =
            match Vec::<CounterTransaction>::deserialize(&mut datum.bytes().as_slice()) {
                Ok(transactions) => transactions,
                Err(_) => return ExecutePayloadResponse::Invalid,
            };

        let (_, data_hash) = encode_payload(&transactions);
        if block.data_hash != data_hash {
            return ExecutePayloadResponse::Invalid;
        }

        ExecutePayloadResponse::Valid {
            updates: execute(&transactions, request.tree()),
        }
    }
}

impl CounterApp {
    pub(crate) fn new(tx_queue: Arc<Mutex<Vec<CounterTransaction>>>) -> CounterApp {
        Self { tx_queue }
    }

    pub(crate) fn submit(&self, transaction: CounterTransaction) {
        self.tx_queue.lock().unwrap().push(transaction);
    }
}

pub(crate) fn counter_value(tree: &MemTree, key: &[u8]) -> u64 {
    match tree.get(key) {
        Some(bytes) => u64::from_le_bytes(bytes.try_into().unwrap()),
        None => 0,
    }
}

fn encode_payload(transactions: &Vec<CounterTransaction>) -> (Data, Digest) {
    let datum = Datum::new(transactions.try_to_vec().unwrap());
    let mut hasher = Sha256::new();
    hasher.update(datum.bytes());
    let data_hash = Digest::new(hasher.finalize().into());
    (Data::new(vec![datum]), data_hash)
}

fn execute(transactions: &[CounterTransaction], tree: &MemTree) -> TreeUpdates {
    let mut updates = TreeUpdates::new();
    for transaction in transactions {
        match transaction {
            CounterTransaction::Increment(key) => {
                let current = match updates.write(key) {
                    Some(bytes) => u64::from_le_bytes(bytes.clone().try_into().unwrap()),
                    None => counter_value(tree, key),
                };
                updates.set(key.clone(), (current + 1).to_le_bytes().to_vec());
            }
            CounterTransaction::SetRoster(encoded) => {
                updates.set(ROSTER_KEY.to_vec(), encoded.clone());
            }
        }
    }
    updates
}
