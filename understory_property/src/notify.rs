// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notification servers.
//!
//! A [`ChangeNotificationServer`] belongs to one property and keeps, per
//! target object, the subscribers that want to hear when that property
//! changes on that object. [`ChangeNotifications`] hands out one server per
//! property, creating them on first use.
//!
//! Subscribers are identified by `Arc` pointer identity. Subscribing the
//! same subscriber to the same target twice keeps a single entry. A
//! target's list is dropped from the server as soon as it becomes empty,
//! and emptied lists are kept in a small pool for reuse.
//!
//! Callbacks run on a snapshot taken under the lock and invoked after it is
//! released, so a subscriber may subscribe or unsubscribe while being
//! notified.

use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::id::{ObjectId, PropertyId};

/// Receives change notifications.
pub trait ChangeSubscriber: Send + Sync {
    /// `property` changed its effective value on `target`.
    fn on_change(&self, target: ObjectId, property: PropertyId);
}

impl<F> ChangeSubscriber for F
where
    F: Fn(ObjectId, PropertyId) + Send + Sync,
{
    fn on_change(&self, target: ObjectId, property: PropertyId) {
        self(target, property);
    }
}

type SubscriberList = SmallVec<[Arc<dyn ChangeSubscriber>; 4]>;

/// Emptied lists kept for reuse.
const POOL_LIMIT: usize = 64;

#[derive(Default)]
struct ServerState {
    targets: HashMap<ObjectId, SubscriberList>,
    pool: Vec<SubscriberList>,
}

impl ServerState {
    fn release(&mut self, mut list: SubscriberList) {
        list.clear();
        if self.pool.len() < POOL_LIMIT {
            self.pool.push(list);
        }
    }
}

fn same_subscriber(a: &Arc<dyn ChangeSubscriber>, b: &Arc<dyn ChangeSubscriber>) -> bool {
    core::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Per-property subscription lists, keyed by target object.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use understory_property::{ChangeNotificationServer, ChangeSubscriber, ObjectId, PropertyId};
///
/// let server = ChangeNotificationServer::new(PropertyId::new(0));
/// let target = ObjectId::new(1);
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&hits);
/// let subscriber: Arc<dyn ChangeSubscriber> = Arc::new(move |_: ObjectId, _: PropertyId| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// assert!(server.subscribe(target, Arc::clone(&subscriber)));
/// assert!(!server.subscribe(target, Arc::clone(&subscriber)));
/// assert_eq!(server.notify(target), 1);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
///
/// assert!(server.unsubscribe(target, &subscriber));
/// assert_eq!(server.target_count(), 0);
/// ```
pub struct ChangeNotificationServer {
    property: PropertyId,
    state: Mutex<ServerState>,
}

impl ChangeNotificationServer {
    /// Creates an empty server for `property`.
    #[must_use]
    pub fn new(property: PropertyId) -> Self {
        Self {
            property,
            state: Mutex::new(ServerState::default()),
        }
    }

    /// Returns the property this server reports on.
    #[must_use]
    #[inline]
    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// Subscribes `subscriber` to changes on `target`.
    ///
    /// Returns `false` if it was already subscribed to that target.
    pub fn subscribe(&self, target: ObjectId, subscriber: Arc<dyn ChangeSubscriber>) -> bool {
        let mut state = self.state.lock();
        let ServerState { targets, pool } = &mut *state;
        let list = targets
            .entry(target)
            .or_insert_with(|| pool.pop().unwrap_or_default());
        if list.iter().any(|existing| same_subscriber(existing, &subscriber)) {
            return false;
        }
        list.push(subscriber);
        true
    }

    /// Removes `subscriber` from `target`.
    ///
    /// Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, target: ObjectId, subscriber: &Arc<dyn ChangeSubscriber>) -> bool {
        let mut state = self.state.lock();
        let Some(list) = state.targets.get_mut(&target) else {
            return false;
        };
        let Some(index) = list
            .iter()
            .position(|existing| same_subscriber(existing, subscriber))
        else {
            return false;
        };
        list.remove(index);
        if list.is_empty()
            && let Some(list) = state.targets.remove(&target)
        {
            state.release(list);
        }
        true
    }

    /// Calls every subscriber of `target` and returns how many were called.
    pub fn notify(&self, target: ObjectId) -> usize {
        let snapshot: SubscriberList = match self.state.lock().targets.get(&target) {
            Some(list) => list.clone(),
            None => return 0,
        };
        for subscriber in &snapshot {
            subscriber.on_change(target, self.property);
        }
        snapshot.len()
    }

    /// Drops every subscription for `target`.
    ///
    /// Call this when the target object is destroyed. Returns the number of
    /// subscriptions removed.
    pub fn remove_target(&self, target: ObjectId) -> usize {
        let mut state = self.state.lock();
        match state.targets.remove(&target) {
            Some(list) => {
                let removed = list.len();
                state.release(list);
                removed
            }
            None => 0,
        }
    }

    /// Returns the number of subscribers of `target`.
    #[must_use]
    pub fn subscriber_count(&self, target: ObjectId) -> usize {
        self.state
            .lock()
            .targets
            .get(&target)
            .map_or(0, SmallVec::len)
    }

    /// Returns the number of targets with at least one subscriber.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.state.lock().targets.len()
    }

    /// Returns the number of emptied lists waiting for reuse.
    #[must_use]
    pub fn pooled_lists(&self) -> usize {
        self.state.lock().pool.len()
    }
}

impl fmt::Debug for ChangeNotificationServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ChangeNotificationServer")
            .field("property", &self.property)
            .field("targets", &state.targets.len())
            .field("pooled_lists", &state.pool.len())
            .finish()
    }
}

/// One [`ChangeNotificationServer`] per property, created on first use.
///
/// Digest reports every effective-value change here.
#[derive(Default)]
pub struct ChangeNotifications {
    servers: Mutex<HashMap<PropertyId, Arc<ChangeNotificationServer>>>,
}

impl ChangeNotifications {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the server for `property`, creating it if needed.
    pub fn server(&self, property: PropertyId) -> Arc<ChangeNotificationServer> {
        Arc::clone(
            self.servers
                .lock()
                .entry(property)
                .or_insert_with(|| Arc::new(ChangeNotificationServer::new(property))),
        )
    }

    /// Returns the server for `property`, if one was created.
    #[must_use]
    pub fn get(&self, property: PropertyId) -> Option<Arc<ChangeNotificationServer>> {
        self.servers.lock().get(&property).cloned()
    }

    /// Notifies the subscribers of `property` on `target`.
    pub fn notify(&self, property: PropertyId, target: ObjectId) -> usize {
        self.get(property).map_or(0, |server| server.notify(target))
    }

    /// Drops `target`'s subscriptions on every property.
    pub fn remove_target(&self, target: ObjectId) -> usize {
        let servers: Vec<_> = self.servers.lock().values().cloned().collect();
        servers
            .iter()
            .map(|server| server.remove_target(target))
            .sum()
    }
}

impl fmt::Debug for ChangeNotifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifications")
            .field("servers", &self.servers.lock().len())
            .finish()
    }
}
