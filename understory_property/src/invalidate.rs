// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout invalidation hooks.

use crate::id::ObjectId;

/// Receives layout invalidations from digest.
///
/// Digest calls these after a property whose metadata is flagged
/// `AFFECTS_MEASURE` or `AFFECTS_ARRANGE` changes its effective value.
pub trait InvalidationHook {
    /// A measure-affecting property changed on `owner`.
    fn on_measure_affecting_changed(&mut self, owner: ObjectId);

    /// An arrange-affecting property changed on `owner`.
    fn on_arrange_affecting_changed(&mut self, owner: ObjectId);
}

/// An [`InvalidationHook`] that records invalidated owners in order.
///
/// ```rust
/// use understory_property::{InvalidationHook, InvalidationQueue, ObjectId};
///
/// let mut queue = InvalidationQueue::default();
/// queue.on_measure_affecting_changed(ObjectId::new(3));
/// queue.on_measure_affecting_changed(ObjectId::new(3));
/// assert_eq!(queue.measure(), &[ObjectId::new(3)]);
/// assert!(queue.arrange().is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InvalidationQueue {
    measure: Vec<ObjectId>,
    arrange: Vec<ObjectId>,
}

impl InvalidationQueue {
    /// Owners whose measure was invalidated, without repeats.
    #[must_use]
    pub fn measure(&self) -> &[ObjectId] {
        &self.measure
    }

    /// Owners whose arrange was invalidated, without repeats.
    #[must_use]
    pub fn arrange(&self) -> &[ObjectId] {
        &self.arrange
    }

    /// Returns `true` if nothing was invalidated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measure.is_empty() && self.arrange.is_empty()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&mut self) {
        self.measure.clear();
        self.arrange.clear();
    }
}

impl InvalidationHook for InvalidationQueue {
    fn on_measure_affecting_changed(&mut self, owner: ObjectId) {
        if !self.measure.contains(&owner) {
            self.measure.push(owner);
        }
    }

    fn on_arrange_affecting_changed(&mut self, owner: ObjectId) {
        if !self.arrange.contains(&owner) {
            self.arrange.push(owner);
        }
    }
}
