/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that receives events emitted by the processor, state machine, and sync threads, and
//! passes them to event handlers.
//!
//! When the thread receives a message containing an [event](crate::events::Event), it triggers
//! the execution of all handlers defined for the contained event type, where the handlers for
//! each event type are stored in [`EventHandlers`].
//!
//! When no handlers are present and logging is disabled, this thread is not started.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::events::*;
use crate::logging::Logger;

/// Pointer to a handler closure, parametrised by the argument (for our use case, event) type.
pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// Stores the two optional handlers enabled for an event type: one logging handler, defined in
/// [`logging`](crate::logging), and one user-defined handler.
pub(crate) struct HandlerPair<T: Logger> {
    user_defined_handler: Option<HandlerPtr<T>>,
    logging_handler: Option<HandlerPtr<T>>,
}

impl<T: Logger> HandlerPair<T> {
    fn new(log: bool, user_defined_handler: Option<HandlerPtr<T>>) -> HandlerPair<T> {
        HandlerPair {
            user_defined_handler,
            logging_handler: if log { Some(T::get_logger()) } else { None },
        }
    }

    fn is_empty(&self) -> bool {
        self.user_defined_handler.is_none() && self.logging_handler.is_none()
    }

    fn handle(&self, event: &T) {
        if let Some(handler) = &self.logging_handler {
            handler(event)
        }
        if let Some(handler) = &self.user_defined_handler {
            handler(event)
        }
    }
}

/// Stores the [`HandlerPair`] of user-defined and optional logging handlers for each pre-defined
/// event type from [events](crate::events).
pub(crate) struct EventHandlers {
    store_genesis_handlers: HandlerPair<StoreGenesisEvent>,
    finalize_handlers: HandlerPair<FinalizeEvent>,
    update_roster_handlers: HandlerPair<UpdateRosterEvent>,
    prepare_handlers: HandlerPair<PrepareEvent>,
    commit_handlers: HandlerPair<CommitEvent>,
    view_change_handlers: HandlerPair<ViewChangeEvent>,
    start_sync_handlers: HandlerPair<StartSyncEvent>,
    end_sync_handlers: HandlerPair<EndSyncEvent>,
    receive_sync_request_handlers: HandlerPair<ReceiveSyncRequestEvent>,
    send_sync_response_handlers: HandlerPair<SendSyncResponseEvent>,
}

impl EventHandlers {
    pub(crate) fn new(log: bool, user_defined: UserDefinedHandlers) -> EventHandlers {
        EventHandlers {
            store_genesis_handlers: HandlerPair::new(log, user_defined.on_store_genesis),
            finalize_handlers: HandlerPair::new(log, user_defined.on_finalize),
            update_roster_handlers: HandlerPair::new(log, user_defined.on_update_roster),
            prepare_handlers: HandlerPair::new(log, user_defined.on_prepare),
            commit_handlers: HandlerPair::new(log, user_defined.on_commit),
            view_change_handlers: HandlerPair::new(log, user_defined.on_view_change),
            start_sync_handlers: HandlerPair::new(log, user_defined.on_start_sync),
            end_sync_handlers: HandlerPair::new(log, user_defined.on_end_sync),
            receive_sync_request_handlers: HandlerPair::new(log, user_defined.on_receive_sync_request),
            send_sync_response_handlers: HandlerPair::new(log, user_defined.on_send_sync_response),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.store_genesis_handlers.is_empty()
            && self.finalize_handlers.is_empty()
            && self.update_roster_handlers.is_empty()
            && self.prepare_handlers.is_empty()
            && self.commit_handlers.is_empty()
            && self.view_change_handlers.is_empty()
            && self.start_sync_handlers.is_empty()
            && self.end_sync_handlers.is_empty()
            && self.receive_sync_request_handlers.is_empty()
            && self.send_sync_response_handlers.is_empty()
    }

    fn handle(&self, event: &Event) {
        match event {
            Event::StoreGenesis(e) => self.store_genesis_handlers.handle(e),
            Event::Finalize(e) => self.finalize_handlers.handle(e),
            Event::UpdateRoster(e) => self.update_roster_handlers.handle(e),
            Event::Prepare(e) => self.prepare_handlers.handle(e),
            Event::Commit(e) => self.commit_handlers.handle(e),
            Event::ViewChange(e) => self.view_change_handlers.handle(e),
            Event::StartSync(e) => self.start_sync_handlers.handle(e),
            Event::EndSync(e) => self.end_sync_handlers.handle(e),
            Event::ReceiveSyncRequest(e) => self.receive_sync_request_handlers.handle(e),
            Event::SendSyncResponse(e) => self.send_sync_response_handlers.handle(e),
        }
    }
}

/// The optional handler closures a library user may register, one per event type.
#[derive(Default)]
pub struct UserDefinedHandlers {
    pub on_store_genesis: Option<HandlerPtr<StoreGenesisEvent>>,
    pub on_finalize: Option<HandlerPtr<FinalizeEvent>>,
    pub on_update_roster: Option<HandlerPtr<UpdateRosterEvent>>,
    pub on_prepare: Option<HandlerPtr<PrepareEvent>>,
    pub on_commit: Option<HandlerPtr<CommitEvent>>,
    pub on_view_change: Option<HandlerPtr<ViewChangeEvent>>,
    pub on_start_sync: Option<HandlerPtr<StartSyncEvent>>,
    pub on_end_sync: Option<HandlerPtr<EndSyncEvent>>,
    pub on_receive_sync_request: Option<HandlerPtr<ReceiveSyncRequestEvent>>,
    pub on_send_sync_response: Option<HandlerPtr<SendSyncResponseEvent>>,
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Event bus thread disconnected from main thread")
            }
        }

        match event_subscriber.try_recv() {
            Ok(event) => event_handlers.handle(&event),
            Err(TryRecvError::Empty) => thread::yield_now(),
            Err(TryRecvError::Disconnected) => (),
        }
    })
}
