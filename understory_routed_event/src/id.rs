// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Routed event identification.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// A runtime routed event identifier, allocated in registration order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoutedEventId(u16);

impl RoutedEventId {
    /// Creates an id from its index.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for RoutedEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutedEventId").field(&self.0).finish()
    }
}

impl fmt::Display for RoutedEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoutedEventId({})", self.0)
    }
}

/// A routed event whose handlers receive a payload of type `A`.
pub struct RoutedEvent<A> {
    id: RoutedEventId,
    _marker: PhantomData<fn(A)>,
}

impl<A> RoutedEvent<A> {
    /// Wraps an id registered with payload type `A`.
    #[must_use]
    #[inline]
    pub const fn from_id(id: RoutedEventId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the untyped id.
    #[must_use]
    #[inline]
    pub const fn id(self) -> RoutedEventId {
        self.id
    }
}

impl<A> Copy for RoutedEvent<A> {}

impl<A> Clone for RoutedEvent<A> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> PartialEq for RoutedEvent<A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<A> Eq for RoutedEvent<A> {}

impl<A> Hash for RoutedEvent<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<A> fmt::Debug for RoutedEvent<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedEvent")
            .field("id", &self.id)
            .field("args", &core::any::type_name::<A>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_handles_compare_by_id() {
        let a: RoutedEvent<u32> = RoutedEvent::from_id(RoutedEventId::new(3));
        let b = a;
        assert_eq!(a, b);
        assert_eq!(a.id().index(), 3);
        assert_eq!(format!("{}", a.id()), "RoutedEventId(3)");
    }
}
