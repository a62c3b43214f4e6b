/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the replica's
//! [config](crate::config::Configuration).
//!
//! Logging goes through the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values
//! are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. Digests and addresses are
//! rendered as the first seven characters of their Base64 encoding.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const STORE_GENESIS: &str = "StoreGenesis";
pub const FINALIZE: &str = "Finalize";
pub const UPDATE_ROSTER: &str = "UpdateRoster";

pub const PREPARE: &str = "Prepare";
pub const COMMIT: &str = "Commit";
pub const VIEW_CHANGE: &str = "ViewChange";

pub const START_SYNC: &str = "StartSync";
pub const END_SYNC: &str = "EndSync";
pub const RECEIVE_SYNC_REQUEST: &str = "ReceiveSyncRequest";
pub const SEND_SYNC_RESPONSE: &str = "SendSyncResponse";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for StoreGenesisEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |store_genesis_event: &StoreGenesisEvent| {
            log::info!(
                "{}, {}, {}, {}",
                STORE_GENESIS,
                secs_since_unix_epoch(store_genesis_event.timestamp),
                first_seven_base64_chars(&store_genesis_event.root.bytes()),
                store_genesis_event.roster_len
            )
        };
        Box::new(logger)
    }
}

impl Logger for FinalizeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |finalize_event: &FinalizeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                FINALIZE,
                secs_since_unix_epoch(finalize_event.timestamp),
                first_seven_base64_chars(&finalize_event.id.bytes()),
                finalize_event.index
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateRosterEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_roster_event: &UpdateRosterEvent| {
            log::info!(
                "{}, {}, {}, {}",
                UPDATE_ROSTER,
                secs_since_unix_epoch(update_roster_event.timestamp),
                update_roster_event.index,
                update_roster_event.roster_len
            )
        };
        Box::new(logger)
    }
}

impl Logger for PrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prepare_event: &PrepareEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PREPARE,
                secs_since_unix_epoch(prepare_event.timestamp),
                first_seven_base64_chars(&prepare_event.id.bytes()),
                prepare_event.index
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_event: &CommitEvent| {
            log::info!(
                "{}, {}, {}",
                COMMIT,
                secs_since_unix_epoch(commit_event.timestamp),
                first_seven_base64_chars(&commit_event.id.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ViewChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |view_change_event: &ViewChangeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                VIEW_CHANGE,
                secs_since_unix_epoch(view_change_event.timestamp),
                first_seven_base64_chars(&view_change_event.id.bytes()),
                view_change_event.leader
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartSyncEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_sync_event: &StartSyncEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                START_SYNC,
                secs_since_unix_epoch(start_sync_event.timestamp),
                first_seven_base64_chars(start_sync_event.peer.as_str().as_bytes()),
                start_sync_event.from,
                start_sync_event.to
            )
        };
        Box::new(logger)
    }
}

impl Logger for EndSyncEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |end_sync_event: &EndSyncEvent| {
            log::info!(
                "{}, {}, {}, {}",
                END_SYNC,
                secs_since_unix_epoch(end_sync_event.timestamp),
                first_seven_base64_chars(end_sync_event.peer.as_str().as_bytes()),
                end_sync_event.links_synced
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveSyncRequestEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_sync_request_event: &ReceiveSyncRequestEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_SYNC_REQUEST,
                secs_since_unix_epoch(receive_sync_request_event.timestamp),
                first_seven_base64_chars(receive_sync_request_event.peer.as_str().as_bytes()),
                receive_sync_request_event.from,
                receive_sync_request_event.to
            )
        };
        Box::new(logger)
    }
}

impl Logger for SendSyncResponseEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |send_sync_response_event: &SendSyncResponseEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SEND_SYNC_RESPONSE,
                secs_since_unix_epoch(send_sync_response_event.timestamp),
                first_seven_base64_chars(send_sync_response_event.peer.as_str().as_bytes()),
                send_sync_response_event.links_sent
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
