// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Animation clocks and tweens for the animated value source.
//!
//! A [`Tween`] started with [`PropertyStore::animate`](crate::PropertyStore::animate)
//! is driven by the elapsed time passed to each digest. When the clock runs
//! out, the animated source holds the end value until it is cleared.

use core::time::Duration;

/// Values that can be blended between two endpoints.
pub trait Interpolate: Clone {
    /// Returns the value at progress `t` (`0.0` is `self`, `1.0` is `to`).
    #[must_use]
    fn interpolate(&self, to: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self + (to - self) * f64::from(t)
    }
}

impl Interpolate for i32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the blend lies between two i32 values"
    )]
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        let from = f64::from(*self);
        (from + (f64::from(*to) - from) * f64::from(t)).round() as i32
    }
}

impl<A: Interpolate, B: Interpolate> Interpolate for (A, B) {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        (self.0.interpolate(&to.0, t), self.1.interpolate(&to.1, t))
    }
}

/// Easing curve applied to clock progress.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    /// Constant speed.
    #[default]
    Linear,
    /// Quadratic acceleration.
    EaseIn,
    /// Quadratic deceleration.
    EaseOut,
    /// Accelerate, then decelerate.
    EaseInOut,
}

impl Easing {
    /// Maps linear progress in `0.0..=1.0` through the curve.
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => t * (2.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// Tracks elapsed time against a fixed duration.
///
/// ```rust
/// use core::time::Duration;
/// use understory_property::AnimationClock;
///
/// let mut clock = AnimationClock::new(Duration::from_millis(200));
/// clock.advance(Duration::from_millis(50));
/// assert_eq!(clock.progress(), 0.25);
/// clock.advance(Duration::from_millis(500));
/// assert!(clock.is_finished());
/// assert_eq!(clock.progress(), 1.0);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AnimationClock {
    elapsed: Duration,
    duration: Duration,
}

impl AnimationClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self {
            elapsed: Duration::ZERO,
            duration,
        }
    }

    /// Moves the clock forward, saturating at its duration.
    pub fn advance(&mut self, delta: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta).min(self.duration);
    }

    /// Returns linear progress in `0.0..=1.0`.
    ///
    /// A zero-length clock is always finished.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "progress is in 0..=1")]
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()) as f32
    }

    /// Returns whether the clock has reached its duration.
    #[must_use]
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Returns the elapsed time.
    #[must_use]
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns the total duration.
    #[must_use]
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// A transition of the animated source toward a target value.
///
/// ```rust
/// use core::time::Duration;
/// use understory_property::{Easing, Tween};
///
/// let tween = Tween::to(1.0_f32, Duration::from_millis(300))
///     .from(0.5)
///     .with_easing(Easing::EaseOut);
/// assert_eq!(tween.target(), &1.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Tween<T> {
    pub(crate) from: Option<T>,
    pub(crate) to: T,
    pub(crate) duration: Duration,
    pub(crate) easing: Easing,
}

impl<T> Tween<T> {
    /// Animates from the current effective value to `to` over `duration`.
    #[must_use]
    pub fn to(to: T, duration: Duration) -> Self {
        Self {
            from: None,
            to,
            duration,
            easing: Easing::Linear,
        }
    }

    /// Starts from `from` instead of the current effective value.
    #[must_use]
    pub fn from(mut self, from: T) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the easing curve.
    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Returns the end value.
    #[must_use]
    pub fn target(&self) -> &T {
        &self.to
    }

    /// Returns the duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// A running tween, type-erased over [`Interpolate`] so slots need no bound.
pub(crate) struct AnimationDriver<T> {
    from: T,
    to: T,
    clock: AnimationClock,
    easing: Easing,
    interpolate: fn(&T, &T, f32) -> T,
}

impl<T: Clone> AnimationDriver<T> {
    pub(crate) fn start(tween: Tween<T>, current: T) -> Self
    where
        T: Interpolate,
    {
        Self {
            from: tween.from.unwrap_or(current),
            to: tween.to,
            clock: AnimationClock::new(tween.duration),
            easing: tween.easing,
            interpolate: T::interpolate,
        }
    }

    /// Advances the clock and returns the value and whether the tween ended.
    pub(crate) fn advance(&mut self, delta: Duration) -> (T, bool) {
        self.clock.advance(delta);
        if self.clock.is_finished() {
            return (self.to.clone(), true);
        }
        let t = self.easing.apply(self.clock.progress());
        ((self.interpolate)(&self.from, &self.to, t), false)
    }
}

impl<T> core::fmt::Debug for AnimationDriver<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AnimationDriver")
            .field("clock", &self.clock)
            .field("easing", &self.easing)
            .finish_non_exhaustive()
    }
}
