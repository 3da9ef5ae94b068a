// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event arguments and routing order.

use understory_property::ObjectId;

use crate::id::{RoutedEvent, RoutedEventId};

/// How a routed event travels along the element path.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RoutingStrategy {
    /// Only the source element sees the event.
    Direct,
    /// From the source up to the root.
    #[default]
    Bubble,
    /// From the root down to the source.
    Tunnel,
}

impl RoutingStrategy {
    /// Orders a root-to-source `path` for this strategy.
    ///
    /// ```rust
    /// use understory_routed_event::RoutingStrategy;
    ///
    /// let path = ["window", "panel", "button"];
    /// let bubble: Vec<_> = RoutingStrategy::Bubble.route(&path).collect();
    /// assert_eq!(bubble, [&"button", &"panel", &"window"]);
    /// let direct: Vec<_> = RoutingStrategy::Direct.route(&path).collect();
    /// assert_eq!(direct, [&"button"]);
    /// ```
    pub fn route<K>(self, path: &[K]) -> impl Iterator<Item = &K> + '_ {
        let (skip, reverse) = match self {
            Self::Direct => (path.len().saturating_sub(1), false),
            Self::Bubble => (0, true),
            Self::Tunnel => (0, false),
        };
        let mut forward = path[skip..].iter();
        let mut backward = path.iter().rev();
        core::iter::from_fn(move || if reverse { backward.next() } else { forward.next() })
    }
}

/// The arguments passed to every handler of one raised event.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutedEventArgs<A> {
    event: RoutedEventId,
    source: ObjectId,
    handled: bool,
    payload: A,
}

impl<A> RoutedEventArgs<A> {
    /// Creates unhandled arguments for `event` raised by `source`.
    #[must_use]
    pub fn new(event: RoutedEvent<A>, source: ObjectId, payload: A) -> Self {
        Self {
            event: event.id(),
            source,
            handled: false,
            payload,
        }
    }

    /// Returns the event being raised.
    #[must_use]
    #[inline]
    pub fn event(&self) -> RoutedEventId {
        self.event
    }

    /// Returns the element that raised the event.
    #[must_use]
    #[inline]
    pub fn source(&self) -> ObjectId {
        self.source
    }

    /// Returns `true` once a handler has marked the event handled.
    #[must_use]
    #[inline]
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Marks the event handled. Later handlers only run if they asked for
    /// handled events too.
    pub fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    /// Returns the payload.
    #[must_use]
    #[inline]
    pub fn payload(&self) -> &A {
        &self.payload
    }

    /// Returns the payload mutably.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut A {
        &mut self.payload
    }

    /// Consumes the arguments, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> A {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tunnel_runs_root_first() {
        let path = [1, 2, 3];
        assert_eq!(
            RoutingStrategy::Tunnel.route(&path).copied().collect::<Vec<_>>(),
            [1, 2, 3]
        );
        assert_eq!(RoutingStrategy::Direct.route(&[] as &[u8]).count(), 0);
        assert_eq!(RoutingStrategy::default(), RoutingStrategy::Bubble);
    }

    #[test]
    fn handled_flag_round_trips() {
        let event: RoutedEvent<i32> = RoutedEvent::from_id(RoutedEventId::new(0));
        let mut args = RoutedEventArgs::new(event, ObjectId::new(7), 5);
        assert!(!args.is_handled());
        *args.payload_mut() += 1;
        args.set_handled(true);
        assert!(args.is_handled());
        assert_eq!(args.source(), ObjectId::new(7));
        assert_eq!(args.into_payload(), 6);
    }
}
