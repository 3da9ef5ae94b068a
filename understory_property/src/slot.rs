// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-object, per-property value slots.
//!
//! A [`ValueSlot`] holds every source that can contribute a value to one
//! property on one object, plus the cached effective value. Setters only
//! record the source and mark the slot as requiring a digest. The effective
//! value is recomputed, coerced, compared, and announced by
//! [`ValueSlot::digest`].
//!
//! Precedence, highest first:
//!
//! | Source | Notes |
//! |--------|-------|
//! | animated | driven by a tween or set directly |
//! | local or bound | a binding replaces the local source |
//! | triggered | |
//! | styled | |
//! | inherited | only when the metadata has `INHERITS` |
//! | default | from the metadata in effect for the owner type |

use core::fmt;
use core::time::Duration;

use bitflags::bitflags;
use understory_reflect::ErasedValue;

use crate::animation::AnimationDriver;
use crate::bound::BoundValue;
use crate::id::{ObjectId, PropertyId};
use crate::metadata::{ChangedArgs, PropertyMetadata};

bitflags! {
    /// State of a [`ValueSlot`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SlotFlags: u8 {
        /// A local value is set.
        const HAS_LOCAL = 1 << 0;
        /// A styled value is set.
        const HAS_STYLED = 1 << 1;
        /// A triggered value is set.
        const HAS_TRIGGERED = 1 << 2;
        /// An animated value is set.
        const HAS_ANIMATED = 1 << 3;
        /// A bound value replaces the local source.
        const DATA_BOUND = 1 << 4;
        /// The effective value changed and listeners have not all been told.
        const PENDING_CHANGE = 1 << 5;
        /// A source changed since the last digest.
        const REQUIRES_DIGEST = 1 << 6;
    }
}

/// Inputs for one [`ValueSlot::digest`].
#[derive(Debug)]
pub struct SlotContext<'a, T> {
    /// The object that owns the slot.
    pub owner: ObjectId,
    /// The property the slot holds.
    pub property: PropertyId,
    /// Metadata in effect for the owner's type.
    pub metadata: &'a PropertyMetadata<T>,
    /// Data source for the bound value.
    pub data_source: Option<&'a ErasedValue>,
    /// The nearest ancestor's value, when the property inherits.
    pub inherited: Option<T>,
    /// Time since the previous digest, for running animations.
    pub elapsed: Duration,
}

/// Value sources and cached effective value for one property on one object.
///
/// # Example
///
/// ```rust
/// use core::time::Duration;
/// use understory_property::{
///     ObjectId, PropertyId, PropertyMetadata, SlotContext, SlotFlags, ValueSlot,
/// };
///
/// let metadata = PropertyMetadata::new(1.0_f32);
/// let mut slot = ValueSlot::new();
/// slot.set_styled(0.8);
/// slot.set_local(0.5, None);
/// assert!(slot.flags().contains(SlotFlags::REQUIRES_DIGEST));
///
/// let cx = || SlotContext {
///     owner: ObjectId::new(1),
///     property: PropertyId::new(0),
///     metadata: &metadata,
///     data_source: None,
///     inherited: None,
///     elapsed: Duration::ZERO,
/// };
/// assert!(slot.digest(cx()));
/// assert_eq!(slot.effective(), Some(&0.5));
///
/// // Nothing changed, so a second digest reports nothing.
/// assert!(!slot.digest(cx()));
///
/// slot.clear_local();
/// assert!(slot.digest(cx()));
/// assert_eq!(slot.effective(), Some(&0.8));
/// ```
pub struct ValueSlot<T> {
    local: Option<T>,
    styled: Option<T>,
    triggered: Option<T>,
    animated: Option<T>,
    animation: Option<AnimationDriver<T>>,
    bound: Option<Box<dyn BoundValue<T>>>,
    effective: Option<T>,
    flags: SlotFlags,
}

impl<T> Default for ValueSlot<T> {
    fn default() -> Self {
        Self {
            local: None,
            styled: None,
            triggered: None,
            animated: None,
            animation: None,
            bound: None,
            effective: None,
            flags: SlotFlags::empty(),
        }
    }
}

impl<T: Clone + PartialEq> ValueSlot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot state.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> SlotFlags {
        self.flags
    }

    /// Returns the coerced effective value from the last digest.
    ///
    /// This is `None` until the slot has been digested once.
    #[must_use]
    #[inline]
    pub fn effective(&self) -> Option<&T> {
        self.effective.as_ref()
    }

    /// Returns the local value.
    #[must_use]
    pub fn local(&self) -> Option<&T> {
        self.local.as_ref()
    }

    /// Returns the styled value.
    #[must_use]
    pub fn styled(&self) -> Option<&T> {
        self.styled.as_ref()
    }

    /// Returns the triggered value.
    #[must_use]
    pub fn triggered(&self) -> Option<&T> {
        self.triggered.as_ref()
    }

    /// Returns the animated value.
    #[must_use]
    pub fn animated(&self) -> Option<&T> {
        self.animated.as_ref()
    }

    /// Returns `true` if any source other than inheritance is set.
    #[must_use]
    pub fn has_own_source(&self) -> bool {
        self.flags.intersects(
            SlotFlags::HAS_LOCAL
                | SlotFlags::HAS_STYLED
                | SlotFlags::HAS_TRIGGERED
                | SlotFlags::HAS_ANIMATED
                | SlotFlags::DATA_BOUND,
        )
    }

    /// Returns `true` if a binding replaces the local source.
    #[must_use]
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Returns `true` if a tween is still running.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Returns whether the next digest has work to do.
    ///
    /// Bound, animating, and inheriting slots are re-evaluated every time,
    /// because their inputs change without a setter being called.
    #[must_use]
    pub fn requires_digest(&self, inherits: bool) -> bool {
        self.flags.contains(SlotFlags::REQUIRES_DIGEST)
            || self.bound.is_some()
            || self.animation.is_some()
            || (inherits && !self.has_own_source())
    }

    /// Forces the next digest to recompute the effective value.
    pub fn invalidate(&mut self) {
        self.flags.insert(SlotFlags::REQUIRES_DIGEST);
    }

    fn mark(&mut self, flag: SlotFlags, present: bool) {
        self.flags.set(flag, present);
        self.flags.insert(SlotFlags::REQUIRES_DIGEST);
    }

    /// Sets the local value.
    ///
    /// On a bound slot the value is written through the binding instead.
    pub fn set_local(&mut self, value: T, data_source: Option<&ErasedValue>) {
        if let Some(bound) = &mut self.bound {
            bound.set(data_source, value);
            self.flags.insert(SlotFlags::REQUIRES_DIGEST);
            return;
        }
        self.local = Some(value);
        self.mark(SlotFlags::HAS_LOCAL, true);
    }

    /// Clears the local value. Returns `true` if one was set.
    pub fn clear_local(&mut self) -> bool {
        let had = self.local.take().is_some();
        self.mark(SlotFlags::HAS_LOCAL, false);
        had
    }

    /// Sets the styled value.
    pub fn set_styled(&mut self, value: T) {
        self.styled = Some(value);
        self.mark(SlotFlags::HAS_STYLED, true);
    }

    /// Clears the styled value. Returns `true` if one was set.
    pub fn clear_styled(&mut self) -> bool {
        let had = self.styled.take().is_some();
        self.mark(SlotFlags::HAS_STYLED, false);
        had
    }

    /// Sets the triggered value.
    pub fn set_triggered(&mut self, value: T) {
        self.triggered = Some(value);
        self.mark(SlotFlags::HAS_TRIGGERED, true);
    }

    /// Clears the triggered value. Returns `true` if one was set.
    pub fn clear_triggered(&mut self) -> bool {
        let had = self.triggered.take().is_some();
        self.mark(SlotFlags::HAS_TRIGGERED, false);
        had
    }

    /// Sets the animated value directly, stopping any running tween.
    pub fn set_animated(&mut self, value: T) {
        self.animation = None;
        self.animated = Some(value);
        self.mark(SlotFlags::HAS_ANIMATED, true);
    }

    /// Clears the animated value and stops any running tween.
    ///
    /// Returns `true` if an animated value was set.
    pub fn clear_animated(&mut self) -> bool {
        self.animation = None;
        let had = self.animated.take().is_some();
        self.mark(SlotFlags::HAS_ANIMATED, false);
        had
    }

    pub(crate) fn start_animation(&mut self, driver: AnimationDriver<T>) {
        self.animation = Some(driver);
        self.flags.insert(SlotFlags::HAS_ANIMATED);
        self.flags.insert(SlotFlags::REQUIRES_DIGEST);
    }

    /// Installs a bound value in place of the local source.
    ///
    /// Returns the binding it replaced, if any.
    pub fn bind(&mut self, bound: Box<dyn BoundValue<T>>) -> Option<Box<dyn BoundValue<T>>> {
        let previous = self.bound.replace(bound);
        self.mark(SlotFlags::DATA_BOUND, true);
        previous
    }

    /// Removes the bound value, restoring local semantics.
    pub fn unbind(&mut self) -> Option<Box<dyn BoundValue<T>>> {
        let previous = self.bound.take();
        self.mark(SlotFlags::DATA_BOUND, false);
        previous
    }

    /// Returns the installed binding's expression text.
    #[must_use]
    pub fn binding_expression(&self) -> Option<&str> {
        self.bound.as_ref().map(|bound| bound.expression())
    }

    /// Forwards to [`BoundValue::invalidate_display_cache`].
    pub fn invalidate_display_cache(&mut self) {
        if let Some(bound) = &mut self.bound {
            bound.invalidate_display_cache();
            self.flags.insert(SlotFlags::REQUIRES_DIGEST);
        }
    }

    /// Recomputes the effective value.
    ///
    /// The raw value is taken from the highest source present, passed
    /// through the metadata's coerce callback, and compared with the cached
    /// value (the default, before the first digest). On a change the cache
    /// is updated, the changed callbacks run with the old and new values,
    /// [`SlotFlags::PENDING_CHANGE`] is set, and `true` is returned.
    pub fn digest(&mut self, cx: SlotContext<'_, T>) -> bool {
        let SlotContext {
            owner,
            property,
            metadata,
            data_source,
            inherited,
            elapsed,
        } = cx;

        if let Some(driver) = &mut self.animation {
            let (value, finished) = driver.advance(elapsed);
            self.animated = Some(value);
            if finished {
                self.animation = None;
            }
        }

        let raw = if let Some(animated) = &self.animated {
            Some(animated.clone())
        } else if let Some(bound) = &mut self.bound {
            Some(bound.get(data_source))
        } else {
            self.local
                .clone()
                .or_else(|| self.triggered.clone())
                .or_else(|| self.styled.clone())
                .or_else(|| inherited.filter(|_| metadata.inherits()))
        };
        self.flags.remove(SlotFlags::REQUIRES_DIGEST);

        let Some(raw) = raw.or_else(|| metadata.default_value()) else {
            return false;
        };
        let coerced = metadata.coerce(owner, raw);

        let old = match self.effective.take() {
            Some(old) => old,
            None => match metadata.default_value() {
                Some(default) => default,
                None => coerced.clone(),
            },
        };
        if old == coerced {
            self.effective = Some(coerced);
            return false;
        }

        metadata.notify_changed(&ChangedArgs {
            owner,
            property,
            old: &old,
            new: &coerced,
        });
        self.effective = Some(coerced);
        self.flags.insert(SlotFlags::PENDING_CHANGE);
        true
    }

    /// Clears [`SlotFlags::PENDING_CHANGE`] once every listener was told.
    pub(crate) fn clear_pending(&mut self) {
        self.flags.remove(SlotFlags::PENDING_CHANGE);
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSlot")
            .field("local", &self.local)
            .field("styled", &self.styled)
            .field("triggered", &self.triggered)
            .field("animated", &self.animated)
            .field(
                "binding",
                &self.bound.as_ref().map(|bound| bound.expression()),
            )
            .field("effective", &self.effective)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PropertyMetadataBuilder;
    use std::sync::{Arc, Mutex};

    fn cx<T>(metadata: &PropertyMetadata<T>) -> SlotContext<'_, T> {
        SlotContext {
            owner: ObjectId::new(1),
            property: PropertyId::new(0),
            metadata,
            data_source: None,
            inherited: None,
            elapsed: Duration::ZERO,
        }
    }

    struct Fixed {
        value: i32,
        writes: Arc<Mutex<Vec<i32>>>,
    }

    impl BoundValue<i32> for Fixed {
        fn get(&mut self, _: Option<&ErasedValue>) -> i32 {
            self.value
        }

        fn set(&mut self, _: Option<&ErasedValue>, value: i32) {
            self.writes.lock().unwrap().push(value);
        }

        fn is_writable(&self) -> bool {
            true
        }

        fn expression(&self) -> &str {
            "Fixed"
        }
    }

    #[test]
    fn precedence_ladder() {
        let metadata = PropertyMetadata::new(0_i32);
        let mut slot = ValueSlot::new();

        slot.set_styled(1);
        slot.digest(cx(&metadata));
        assert_eq!(slot.effective(), Some(&1));

        slot.set_triggered(2);
        slot.digest(cx(&metadata));
        assert_eq!(slot.effective(), Some(&2));

        slot.set_local(3, None);
        slot.digest(cx(&metadata));
        assert_eq!(slot.effective(), Some(&3));

        slot.set_animated(4);
        slot.digest(cx(&metadata));
        assert_eq!(slot.effective(), Some(&4));

        slot.clear_animated();
        slot.clear_local();
        slot.digest(cx(&metadata));
        assert_eq!(slot.effective(), Some(&2));

        slot.clear_triggered();
        slot.clear_styled();
        slot.digest(cx(&metadata));
        assert_eq!(slot.effective(), Some(&0));
        assert!(!slot.has_own_source());
    }

    #[test]
    fn first_digest_compares_against_default() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let metadata = PropertyMetadataBuilder::new(5_i32)
            .on_changed(move |_| *counter.lock().unwrap() += 1)
            .build();

        let mut slot = ValueSlot::new();
        slot.set_local(5, None);
        assert!(!slot.digest(cx(&metadata)));
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(slot.effective(), Some(&5));
    }

    #[test]
    fn changed_callbacks_see_old_and_new() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let metadata = PropertyMetadataBuilder::new(1.0_f32)
            .on_changed(move |args| sink.lock().unwrap().push((*args.old, *args.new)))
            .build();

        let mut slot = ValueSlot::new();
        slot.set_local(0.5, None);
        assert!(slot.digest(cx(&metadata)));
        assert!(slot.flags().contains(SlotFlags::PENDING_CHANGE));
        assert!(!slot.flags().contains(SlotFlags::REQUIRES_DIGEST));
        assert!(!slot.digest(cx(&metadata)));

        assert_eq!(*seen.lock().unwrap(), [(1.0, 0.5)]);
    }

    #[test]
    fn coercion_applies_before_compare() {
        let metadata = PropertyMetadataBuilder::new(0_i32)
            .coerce(|_, v| v.clamp(0, 10))
            .build();
        let mut slot = ValueSlot::new();

        slot.set_local(50, None);
        assert!(slot.digest(cx(&metadata)));
        assert_eq!(slot.effective(), Some(&10));

        // A different raw value that coerces to the same result is no change.
        slot.set_local(80, None);
        assert!(!slot.digest(cx(&metadata)));
        assert_eq!(slot.local(), Some(&80));
    }

    #[test]
    fn inherited_only_with_flag() {
        let plain = PropertyMetadata::new(0_i32);
        let inheriting = PropertyMetadataBuilder::new(0_i32).inherits(true).build();
        let mut slot = ValueSlot::new();

        assert!(!slot.requires_digest(false));
        assert!(slot.requires_digest(true));

        let mut with_parent = cx(&plain);
        with_parent.inherited = Some(7);
        assert!(!slot.digest(with_parent));

        let mut with_parent = cx(&inheriting);
        with_parent.inherited = Some(7);
        assert!(slot.digest(with_parent));
        assert_eq!(slot.effective(), Some(&7));
    }

    #[test]
    fn bound_replaces_local_and_receives_writes() {
        let metadata = PropertyMetadata::new(0_i32);
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut slot = ValueSlot::new();
        slot.set_local(1, None);
        slot.bind(Box::new(Fixed {
            value: 9,
            writes: Arc::clone(&writes),
        }));

        assert!(slot.is_bound());
        assert!(slot.requires_digest(false));
        assert!(slot.digest(cx(&metadata)));
        assert_eq!(slot.effective(), Some(&9));

        slot.set_local(4, None);
        assert_eq!(*writes.lock().unwrap(), [4]);
        assert_eq!(slot.local(), Some(&1));
        assert_eq!(slot.binding_expression(), Some("Fixed"));

        assert!(slot.unbind().is_some());
        assert!(slot.digest(cx(&metadata)));
        assert_eq!(slot.effective(), Some(&1));
    }

    #[test]
    fn tween_runs_then_holds() {
        let metadata = PropertyMetadata::new(0.0_f32);
        let mut slot = ValueSlot::new();
        let tween = crate::Tween::to(1.0_f32, Duration::from_millis(100));
        slot.start_animation(AnimationDriver::start(tween, 0.0));

        let mut step = cx(&metadata);
        step.elapsed = Duration::from_millis(50);
        assert!(slot.digest(step));
        assert_eq!(slot.effective(), Some(&0.5));
        assert!(slot.is_animating());

        let mut step = cx(&metadata);
        step.elapsed = Duration::from_millis(80);
        assert!(slot.digest(step));
        assert_eq!(slot.effective(), Some(&1.0));
        assert!(!slot.is_animating());
        assert!(!slot.requires_digest(false));
        assert_eq!(slot.animated(), Some(&1.0));
    }
}
