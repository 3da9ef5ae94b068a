// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type identity and single-inheritance hierarchies.
//!
//! Rust types have no base classes, so the hierarchy a UI framework needs
//! (`Button` derives from `Control` derives from `UIElement`) is declared
//! explicitly through the [`Typed`] trait. The resulting [`TypeKey`] chain is
//! what property and event registries walk when resolving names, metadata
//! overrides, and class handlers.

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};

/// Upper bound on hierarchy depth.
///
/// Real hierarchies are a handful of levels deep; the bound keeps a
/// mis-declared cyclic chain from looping forever.
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// Types that participate in a declared type hierarchy.
///
/// # Example
///
/// ```rust
/// use understory_reflect::{TypeKey, Typed};
///
/// struct UIElement;
/// struct Button;
///
/// impl Typed for UIElement {
///     fn type_key() -> TypeKey {
///         TypeKey::new::<Self>("UIElement")
///     }
/// }
///
/// impl Typed for Button {
///     fn type_key() -> TypeKey {
///         TypeKey::new::<Self>("Button").with_base::<UIElement>()
///     }
/// }
///
/// let button = TypeKey::of::<Button>();
/// assert_eq!(button.distance_to(TypeKey::of::<UIElement>().id()), Some(1));
/// ```
pub trait Typed: 'static {
    /// Returns the key describing this type and its base.
    fn type_key() -> TypeKey;
}

/// A lightweight, copyable handle for a runtime type and its base chain.
///
/// Equality and hashing consider only the [`TypeId`].
#[derive(Copy, Clone)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    base: Option<fn() -> TypeKey>,
}

impl TypeKey {
    /// Creates a key for `T` with no base type.
    #[must_use]
    pub fn new<T: 'static>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            base: None,
        }
    }

    /// Returns the key declared by `T`'s [`Typed`] implementation.
    #[must_use]
    #[inline]
    pub fn of<T: Typed>() -> Self {
        T::type_key()
    }

    /// Returns this key with `B` recorded as its base type.
    #[must_use]
    pub fn with_base<B: Typed>(mut self) -> Self {
        self.base = Some(B::type_key as fn() -> Self);
        self
    }

    /// Returns the [`TypeId`] of the described type.
    #[must_use]
    #[inline]
    pub fn id(self) -> TypeId {
        self.id
    }

    /// Returns the declared display name.
    #[must_use]
    #[inline]
    pub fn name(self) -> &'static str {
        self.name
    }

    /// Returns the base type, if any.
    #[must_use]
    #[inline]
    pub fn base(self) -> Option<Self> {
        self.base.map(|base| base())
    }

    /// Iterates this type followed by each of its ancestors, nearest first.
    #[must_use]
    pub fn ancestors(self) -> Ancestors {
        Ancestors {
            next: Some(self),
            depth: 0,
        }
    }

    /// Returns how many base-type steps separate this type from `ancestor`.
    ///
    /// `Some(0)` means the types are the same; `None` means `ancestor` is not
    /// on this type's chain.
    #[must_use]
    pub fn distance_to(self, ancestor: TypeId) -> Option<usize> {
        self.ancestors().position(|key| key.id == ancestor)
    }

    /// Returns `true` if `ancestor` is this type or one of its base types.
    #[must_use]
    pub fn derives_from(self, ancestor: TypeId) -> bool {
        self.distance_to(ancestor).is_some()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a type and its ancestors. See [`TypeKey::ancestors`].
#[derive(Clone, Debug)]
pub struct Ancestors {
    next: Option<TypeKey>,
    depth: usize,
}

impl Iterator for Ancestors {
    type Item = TypeKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.depth >= MAX_HIERARCHY_DEPTH {
            return None;
        }
        let current = self.next?;
        self.next = current.base();
        self.depth += 1;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Visual;
    struct UIElement;
    struct Control;
    struct Unrelated;

    impl Typed for Visual {
        fn type_key() -> TypeKey {
            TypeKey::new::<Self>("Visual")
        }
    }

    impl Typed for UIElement {
        fn type_key() -> TypeKey {
            TypeKey::new::<Self>("UIElement").with_base::<Visual>()
        }
    }

    impl Typed for Control {
        fn type_key() -> TypeKey {
            TypeKey::new::<Self>("Control").with_base::<UIElement>()
        }
    }

    impl Typed for Unrelated {
        fn type_key() -> TypeKey {
            TypeKey::new::<Self>("Unrelated")
        }
    }

    #[test]
    fn ancestors_nearest_first() {
        let names: Vec<_> = TypeKey::of::<Control>()
            .ancestors()
            .map(TypeKey::name)
            .collect();
        assert_eq!(names, ["Control", "UIElement", "Visual"]);
    }

    #[test]
    fn distance_between_types() {
        let control = TypeKey::of::<Control>();
        assert_eq!(control.distance_to(TypeId::of::<Control>()), Some(0));
        assert_eq!(control.distance_to(TypeId::of::<UIElement>()), Some(1));
        assert_eq!(control.distance_to(TypeId::of::<Visual>()), Some(2));
        assert_eq!(control.distance_to(TypeId::of::<Unrelated>()), None);
        assert!(!TypeKey::of::<Visual>().derives_from(TypeId::of::<Control>()));
    }

    #[test]
    fn equality_ignores_name() {
        let a = TypeKey::new::<Control>("Control");
        let b = TypeKey::new::<Control>("SomethingElse");
        assert_eq!(a, b);
        assert_ne!(a, TypeKey::of::<Visual>());
    }

    #[test]
    fn cyclic_chain_terminates() {
        struct Loop;
        impl Typed for Loop {
            fn type_key() -> TypeKey {
                TypeKey::new::<Self>("Loop").with_base::<Self>()
            }
        }
        assert_eq!(
            TypeKey::of::<Loop>().ancestors().count(),
            MAX_HIERARCHY_DEPTH
        );
    }

    #[test]
    fn debug_and_display() {
        let key = TypeKey::of::<UIElement>();
        assert_eq!(format!("{key}"), "UIElement");
        assert_eq!(format!("{key:?}"), "TypeKey(\"UIElement\")");
    }
}
