/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A one-to-many change watcher: every value passed to [`Watcher::notify`] is delivered, in
//! order, to every subscriber that was registered at the time of the call.
//!
//! Late subscribers do not see history. A subscriber stops receiving by dropping its receiver;
//! the watcher prunes disconnected subscribers on the next notification.

use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc, Mutex,
};

pub(crate) struct Watcher<T: Clone + Send> {
    subscribers: Arc<Mutex<Vec<Sender<T>>>>,
}

impl<T: Clone + Send> Watcher<T> {
    pub(crate) fn new() -> Watcher<T> {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a new subscriber. Only values notified after this call are delivered to it.
    pub(crate) fn subscribe(&self) -> Receiver<T> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.lock().unwrap().push(sender);
        receiver
    }

    /// Deliver a value to every live subscriber, dropping the ones that have disconnected.
    pub(crate) fn notify(&self, value: T) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|subscriber| subscriber.send(value.clone()).is_ok());
    }
}

impl<T: Clone + Send> Clone for Watcher<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}
