// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handles: [`PropertyId`] and its typed form [`Property<T>`], the
//! [`WriteKey<T>`] capability for read-only properties, and [`ObjectId`] for
//! the objects that own property stores.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, Ordering};

/// Untyped property handle, unique within one
/// [`PropertyRegistry`](crate::PropertyRegistry) and allocated in
/// registration order starting at zero.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u16);

impl PropertyId {
    /// Wraps a raw index. Registries allocate these; building one by hand is
    /// mostly useful in tests.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyId").field(&self.0).finish()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

/// A [`PropertyId`] that remembers the value type `T` it was registered
/// with, so stores hand back `T` without a runtime downcast at the call site.
///
/// ```rust
/// use understory_property::{Property, PropertyMetadataBuilder, PropertyRegistry};
/// use understory_reflect::{TypeKey, Typed};
///
/// struct Widget;
/// impl Typed for Widget {
///     fn type_key() -> TypeKey {
///         TypeKey::new::<Self>("Widget")
///     }
/// }
///
/// let mut registry = PropertyRegistry::new();
/// let opacity: Property<f32> = registry
///     .register(
///         TypeKey::of::<Widget>(),
///         "Opacity",
///         PropertyMetadataBuilder::new(1.0_f32).build(),
///     )
///     .unwrap();
/// assert_eq!(opacity.id().index(), 0);
/// ```
pub struct Property<T> {
    id: PropertyId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    /// Types an untyped id. Nothing checks `T` here; stores report a wrong
    /// guess as
    /// [`PropertyError::TypeMismatch`](crate::PropertyError::TypeMismatch).
    #[must_use]
    #[inline]
    pub const fn from_id(id: PropertyId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Drops the value type.
    #[must_use]
    #[inline]
    pub const fn id(self) -> PropertyId {
        self.id
    }
}

impl<T> Copy for Property<T> {}

impl<T> Clone for Property<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Property<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Property<T> {}

impl<T> Hash for Property<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}

/// Capability to write a read-only property.
///
/// Returned once by [`PropertyRegistry::register_read_only`](crate::PropertyRegistry::register_read_only).
/// It is not `Clone`; whoever holds it controls the property's
/// local value.
pub struct WriteKey<T> {
    property: Property<T>,
}

impl<T> WriteKey<T> {
    pub(crate) const fn new(property: Property<T>) -> Self {
        Self { property }
    }

    /// Returns the property this key unlocks.
    #[must_use]
    #[inline]
    pub const fn property(&self) -> Property<T> {
        self.property
    }
}

impl<T> fmt::Debug for WriteKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriteKey").field(&self.property.id).finish()
    }
}

/// A stable handle for a dependency object.
///
/// Change notification servers index subscriptions by `ObjectId`, so an
/// object is named by a plain integer rather than by reference.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    /// Creates an object ID from a raw value.
    #[must_use]
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocates a fresh ID from a process-wide counter.
    ///
    /// ```rust
    /// use understory_property::ObjectId;
    ///
    /// let a = ObjectId::next();
    /// let b = ObjectId::next();
    /// assert!(b > a);
    /// ```
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_two_bytes_and_ignore_their_type() {
        let id = PropertyId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{id:?}"), "PropertyId(42)");
        assert_eq!(format!("{id}"), "PropertyId(42)");

        let width: Property<f64> = Property::from_id(id);
        let count: Property<i32> = Property::from_id(id);
        assert_eq!(width.id(), count.id());
        assert_eq!(size_of::<Property<String>>(), size_of::<PropertyId>());
        assert_eq!(size_of::<WriteKey<String>>(), 2);
    }

    #[test]
    fn object_ids_are_unique() {
        let ids: Vec<_> = (0..16).map(|_| ObjectId::next()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "ids only grow");
        assert_eq!(ObjectId::new(7).get(), 7);
        assert_eq!(format!("{:?}", ObjectId::new(7)), "ObjectId(7)");
    }
}
