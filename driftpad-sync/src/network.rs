//! Network status provider contract and the in-process implementation.
//!
//! The platform shells (browser, mobile) observe connectivity through their
//! own mechanisms and feed transitions into a [`SharedNetworkStatus`]; the
//! sync engine only ever sees this trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Callback invoked with the new connectivity state on every transition.
pub type NetworkCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Reports current connectivity and emits connectivity-change events.
pub trait NetworkStatusProvider: Send + Sync {
    /// Point-in-time connectivity check.
    fn is_online(&self) -> bool;

    /// Registers a callback for connectivity transitions. Dropping or
    /// cancelling the returned [`Subscription`] unregisters it.
    fn subscribe(&self, callback: NetworkCallback) -> Subscription;
}

/// Unsubscribe handle returned by [`NetworkStatusProvider::subscribe`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unregisters the callback. Also runs on drop.
    pub fn cancel(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

type SubscriberMap = Arc<Mutex<HashMap<u64, Arc<NetworkCallback>>>>;

/// In-process [`NetworkStatusProvider`] fed by platform connectivity
/// callbacks via [`set_online`](SharedNetworkStatus::set_online).
pub struct SharedNetworkStatus {
    online: AtomicBool,
    next_id: AtomicU64,
    subscribers: SubscriberMap,
}

impl SharedNetworkStatus {
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
            next_id: AtomicU64::new(0),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records a connectivity transition and notifies subscribers. Setting
    /// the state it already holds notifies nobody.
    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was == online {
            return;
        }
        // Snapshot first; callbacks may re-enter subscribe/unsubscribe.
        let callbacks: Vec<Arc<NetworkCallback>> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers.values().cloned().collect()
        };
        for callback in callbacks {
            callback(online);
        }
    }
}

impl NetworkStatusProvider for SharedNetworkStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self, callback: NetworkCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .unwrap()
            .insert(id, Arc::new(callback));

        let subscribers = Arc::clone(&self.subscribers);
        Subscription::new(move || {
            subscribers.lock().unwrap().remove(&id);
        })
    }
}
