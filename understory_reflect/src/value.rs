// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased values and shared reference objects.
//!
//! [`ErasedValue`] carries a value of any bindable type across the
//! type-erased boundary between compiled accessors, converters, and typed
//! property slots. [`Shared`] is how reference-kind data objects are held:
//! cloning it clones the handle, and equality is identity.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Marker bound for values that can travel through an [`ErasedValue`].
///
/// Equality is required so digests and display caches can detect change.
pub trait Bindable: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> Bindable for T {}

/// A type-erased value.
///
/// This wraps a value of any [`Bindable`] type, storing it on the heap with
/// its type information for later downcasting.
///
/// # Example
///
/// ```rust
/// use understory_reflect::ErasedValue;
///
/// let value = ErasedValue::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
/// assert_eq!(value.clone(), ErasedValue::new(42_i32));
/// assert_eq!(value.downcast::<i32>().ok(), Some(42));
/// ```
pub struct ErasedValue {
    inner: Box<dyn ErasedValueTrait>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ErasedValue {
    /// Creates a new erased value from a concrete value.
    #[must_use]
    pub fn new<T: Bindable>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            inner: Box::new(value),
        }
    }

    /// Erases `value`, passing an [`ErasedValue`] through instead of nesting it.
    ///
    /// ```rust
    /// use understory_reflect::ErasedValue;
    ///
    /// let inner = ErasedValue::new(1_u8);
    /// assert_eq!(ErasedValue::from_value(inner.clone()), inner);
    /// assert_eq!(ErasedValue::from_value(1_u8), inner);
    /// ```
    #[must_use]
    pub fn from_value<T: Bindable>(value: T) -> Self {
        match (&value as &dyn Any).downcast_ref::<Self>() {
            Some(erased) => erased.clone(),
            None => Self::new(value),
        }
    }

    /// Recovers a `T`, where `T` may itself be [`ErasedValue`].
    ///
    /// This is the inverse of [`ErasedValue::from_value`].
    #[must_use]
    pub fn into_value<T: 'static>(self) -> Option<T> {
        let mut slot = Some(self);
        if let Some(slot) = (&mut slot as &mut dyn Any).downcast_mut::<Option<T>>() {
            return slot.take();
        }
        slot.and_then(|value| value.downcast::<T>().ok())
    }

    /// Returns the [`TypeId`] of the contained value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the Rust type name of the contained value.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is of type `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Attempts to downcast to a reference of type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref()
    }

    /// Attempts to downcast to a mutable reference of type `T`.
    #[must_use]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.inner.as_any_mut().downcast_mut()
    }

    /// Unwraps the contained value, or gives the erased value back if it is
    /// not a `T`.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        if !self.is::<T>() {
            return Err(self);
        }
        let Self {
            inner,
            type_id,
            type_name,
        } = self;
        match inner.into_any().downcast::<T>() {
            Ok(value) => Ok(*value),
            // Unreachable given the check above, but keep the value intact.
            Err(_) => Err(Self::placeholder(type_id, type_name)),
        }
    }

    /// Returns the contained value as `&dyn Any`.
    #[must_use]
    pub fn as_any(&self) -> &dyn Any {
        self.inner.as_any()
    }

    /// Returns the contained value as `&mut dyn Any`.
    #[must_use]
    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        self.inner.as_any_mut()
    }

    fn placeholder(type_id: TypeId, type_name: &'static str) -> Self {
        Self {
            inner: Box::new(()),
            type_id,
            type_name,
        }
    }
}

impl Clone for ErasedValue {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }
}

impl PartialEq for ErasedValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.inner.dyn_eq(other.inner.as_any())
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Trait object for type-erased values that can be cloned and compared.
trait ErasedValueTrait: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_boxed(&self) -> Box<dyn ErasedValueTrait>;
    fn dyn_eq(&self, other: &dyn Any) -> bool;
}

impl<T: Bindable> ErasedValueTrait for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_boxed(&self) -> Box<dyn ErasedValueTrait> {
        Box::new(self.clone())
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }
}

/// A shared, interior-mutable reference object.
///
/// This is the representation of reference-kind data sources: every clone
/// refers to the same object, writes through one handle are visible through
/// all of them, and equality is identity rather than structure.
///
/// # Example
///
/// ```rust
/// use understory_reflect::Shared;
///
/// let a = Shared::new(String::from("Ada"));
/// let b = a.clone();
/// b.write().push_str(" Lovelace");
///
/// assert_eq!(a.read().as_str(), "Ada Lovelace");
/// assert_eq!(a, b);
/// assert_ne!(a, Shared::new(String::from("Ada Lovelace")));
/// ```
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    /// Wraps `value` in a new shared object.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Locks the object for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    /// Locks the object for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Returns `true` if both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Send + Sync + 'static> Shared<T> {
    /// Wraps this handle in an [`ErasedValue`], ready to be used as a data source.
    #[must_use]
    pub fn to_erased(&self) -> ErasedValue {
        ErasedValue::new(self.clone())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Shared<T> {}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared")
            .field(&Arc::as_ptr(&self.0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Thickness {
        left: f32,
        top: f32,
    }

    #[test]
    fn erased_value_i32() {
        let value = ErasedValue::new(42_i32);
        assert!(value.is::<i32>());
        assert!(!value.is::<f64>());
        assert_eq!(value.downcast_ref::<i32>(), Some(&42));
        assert_eq!(value.downcast_ref::<f64>(), None);
        assert_eq!(value.type_name(), "i32");
    }

    #[test]
    fn erased_value_downcast_mut_and_owned() {
        let mut value = ErasedValue::new(Thickness {
            left: 1.0,
            top: 2.0,
        });
        if let Some(thickness) = value.downcast_mut::<Thickness>() {
            thickness.left = 5.0;
        }
        let value = value.downcast::<i32>().unwrap_err();
        let thickness = value.downcast::<Thickness>().unwrap();
        assert_eq!(thickness.left, 5.0);
        assert_eq!(thickness.top, 2.0);
    }

    #[test]
    fn erased_value_equality_is_structural_for_values() {
        let a = ErasedValue::new(String::from("hello"));
        let b = ErasedValue::new(String::from("hello"));
        let c = ErasedValue::new(String::from("world"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(ErasedValue::new(1_i32), ErasedValue::new(1_i64));
    }

    #[test]
    fn erased_value_equality_is_identity_for_shared() {
        let object = Shared::new(Thickness {
            left: 0.0,
            top: 0.0,
        });
        let same = object.to_erased();
        assert_eq!(same, ErasedValue::new(object.clone()));

        let twin = Shared::new(Thickness {
            left: 0.0,
            top: 0.0,
        });
        assert_ne!(same, twin.to_erased());
    }

    #[test]
    fn shared_writes_are_visible_through_clones() {
        let a = Shared::new(1_u32);
        let b = a.clone();
        *b.write() = 7;
        assert_eq!(*a.read(), 7);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn erased_value_debug() {
        let value = ErasedValue::new(42_i32);
        let debug = format!("{value:?}");
        assert!(debug.contains("ErasedValue"));
        assert!(debug.contains("i32"));
    }
}
