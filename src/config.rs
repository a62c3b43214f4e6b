/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration as specified by the operator. This is split up into smaller, subsystem-specific
//! config structs before being passed to components.

use std::time::Duration;

use crate::types::basic::Address;

#[derive(Clone)]
pub struct Configuration {
    /// The address under which this replica is reachable on the messaging fabric.
    pub me: Address,

    /// Maximum number of links requested from (and served to) a peer in a single sync attempt.
    pub sync_request_limit: u32,

    /// How long the sync client keeps receiving streamed responses before giving up on an
    /// attempt.
    pub sync_response_timeout: Duration,

    /// How often the sync server broadcasts its head index.
    pub sync_advertise_time: Duration,

    /// How long an incoming proposal waits for the replica to catch up with the observed head
    /// before failing with a sync timeout.
    pub catch_up_timeout: Duration,

    /// Whether the default CSV logging handlers are installed on the event bus.
    pub log_events: bool,
}

impl Configuration {
    pub fn new(me: Address) -> Configuration {
        Self {
            me,
            sync_request_limit: 10,
            sync_response_timeout: Duration::from_secs(3),
            sync_advertise_time: Duration::from_secs(10),
            catch_up_timeout: Duration::from_secs(10),
            log_events: false,
        }
    }
}
