// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency object traits.
//!
//! This module provides the [`DependencyObject`] trait for objects that own a
//! [`PropertyStore`], [`DependencyObjectExt`] for convenient property access
//! including inheritance resolution, and the [`StoreLookup`] seam digest uses
//! to reach parent stores.

use core::hash::BuildHasher;
use core::time::Duration;

use hashbrown::HashMap;
use understory_reflect::Bindable;

use crate::error::PropertyError;
use crate::id::{ObjectId, Property};
use crate::registry::PropertyRegistry;
use crate::store::{DigestCx, PropertyStore};

/// Longest parent chain an inheritance walk follows.
pub const MAX_INHERITANCE_DEPTH: usize = 256;

/// Finds the [`PropertyStore`] of an object.
///
/// Inheritance uses this to walk from a store to its parent, its parent's
/// parent, and so on.
pub trait StoreLookup {
    /// Returns the store owned by `id`.
    fn store(&self, id: ObjectId) -> Option<&PropertyStore>;
}

impl StoreLookup for PropertyStore {
    fn store(&self, id: ObjectId) -> Option<&PropertyStore> {
        (self.owner() == id).then_some(self)
    }
}

impl<const N: usize> StoreLookup for [&PropertyStore; N] {
    fn store(&self, id: ObjectId) -> Option<&PropertyStore> {
        self.iter().find(|store| store.owner() == id).copied()
    }
}

impl StoreLookup for Vec<&PropertyStore> {
    fn store(&self, id: ObjectId) -> Option<&PropertyStore> {
        self.iter().find(|store| store.owner() == id).copied()
    }
}

impl<S: BuildHasher> StoreLookup for HashMap<ObjectId, PropertyStore, S> {
    fn store(&self, id: ObjectId) -> Option<&PropertyStore> {
        self.get(&id)
    }
}

/// Walks the parent chain looking for an inherited value.
///
/// Each ancestor contributes the effective value of its last digest. The
/// first ancestor that has one wins. Returns `None` if no ancestor has
/// digested the property, or the chain leaves `lookup`.
///
/// # Arguments
///
/// * `current` - The object to start from (typically the parent)
/// * `property` - The property to look for
/// * `lookup` - Resolves object ids to stores
pub fn walk_inherited<T, L>(
    mut current: Option<ObjectId>,
    property: Property<T>,
    lookup: &L,
) -> Option<T>
where
    T: Bindable,
    L: StoreLookup + ?Sized,
{
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let store = lookup.store(current?)?;
        if let Some(value) = store.cached(property) {
            return Some(value.clone());
        }
        current = store.parent();
    }
    None
}

/// A trait for objects that have dependency properties.
///
/// This trait provides access to the object's property store, enabling the
/// extension methods in [`DependencyObjectExt`].
///
/// # Example
///
/// ```rust
/// use understory_property::{DependencyObject, PropertyStore};
///
/// struct MyElement {
///     store: PropertyStore,
/// }
///
/// impl DependencyObject for MyElement {
///     fn property_store(&self) -> &PropertyStore {
///         &self.store
///     }
///
///     fn property_store_mut(&mut self) -> &mut PropertyStore {
///         &mut self.store
///     }
/// }
/// ```
pub trait DependencyObject {
    /// Returns a reference to the object's property store.
    fn property_store(&self) -> &PropertyStore;

    /// Returns a mutable reference to the object's property store.
    fn property_store_mut(&mut self) -> &mut PropertyStore;
}

/// Extension methods for [`DependencyObject`].
pub trait DependencyObjectExt: DependencyObject {
    /// Returns the object's id.
    fn object_id(&self) -> ObjectId {
        self.property_store().owner()
    }

    /// Returns the effective value from the last digest, or the default.
    ///
    /// # Panics
    ///
    /// Panics if the property is not registered with type `T`.
    fn get_value<T: Bindable>(&self, registry: &PropertyRegistry, property: Property<T>) -> T {
        self.property_store().get(registry, property)
    }

    /// Gets the value with inheritance resolution, without waiting for a
    /// digest.
    ///
    /// Resolution order:
    /// 1. This object's digested value, if it has an own source
    /// 2. If the property inherits: the nearest ancestor's digested value
    /// 3. The default for this object's type
    ///
    /// # Example
    ///
    /// ```rust
    /// use core::time::Duration;
    /// use understory_property::{
    ///     DependencyObject, DependencyObjectExt, DigestCx, PropertyMetadataBuilder,
    ///     PropertyRegistry, PropertyStore,
    /// };
    /// use understory_reflect::{TypeKey, Typed};
    ///
    /// struct Element {
    ///     store: PropertyStore,
    /// }
    /// impl Typed for Element {
    ///     fn type_key() -> TypeKey {
    ///         TypeKey::new::<Self>("Element")
    ///     }
    /// }
    /// impl DependencyObject for Element {
    ///     fn property_store(&self) -> &PropertyStore { &self.store }
    ///     fn property_store_mut(&mut self) -> &mut PropertyStore { &mut self.store }
    /// }
    ///
    /// let mut registry = PropertyRegistry::new();
    /// let font_size = registry
    ///     .register(
    ///         Element::type_key(),
    ///         "FontSize",
    ///         PropertyMetadataBuilder::new(12.0_f64).inherits(true).build(),
    ///     )
    ///     .unwrap();
    ///
    /// let mut parent = Element { store: PropertyStore::for_type::<Element>() };
    /// let mut child = Element { store: PropertyStore::for_type::<Element>() };
    /// child.store.set_parent(Some(parent.object_id()));
    ///
    /// parent.set_value(&registry, font_size, 16.0).unwrap();
    /// parent.digest_properties(&mut DigestCx::new(&registry), Duration::ZERO);
    ///
    /// let value = child.get_inherited(&registry, font_size, &parent.store);
    /// assert_eq!(value, 16.0);
    /// ```
    fn get_inherited<T, L>(
        &self,
        registry: &PropertyRegistry,
        property: Property<T>,
        lookup: &L,
    ) -> T
    where
        T: Bindable,
        L: StoreLookup + ?Sized,
    {
        let store = self.property_store();
        if let Some(slot) = store.slot(property)
            && slot.has_own_source()
            && let Some(value) = slot.effective()
        {
            return value.clone();
        }
        let inherits = registry
            .metadata_for(property, store.owner_type())
            .is_some_and(|metadata| metadata.inherits());
        if inherits && let Some(value) = walk_inherited(store.parent(), property, lookup) {
            return value;
        }
        store.get(registry, property)
    }

    /// Sets the local value.
    ///
    /// # Errors
    ///
    /// As for [`PropertyStore::set_local`].
    fn set_value<T: Bindable>(
        &mut self,
        registry: &PropertyRegistry,
        property: Property<T>,
        value: T,
    ) -> Result<(), PropertyError> {
        self.property_store_mut().set_local(registry, property, value)
    }

    /// Clears the local value. Returns `true` if one was set.
    fn clear_value<T: Bindable>(&mut self, property: Property<T>) -> bool {
        self.property_store_mut().clear_local(property)
    }

    /// Digests every property of this object.
    fn digest_properties(&mut self, cx: &mut DigestCx<'_>, elapsed: Duration) -> usize {
        self.property_store_mut().digest(cx, elapsed)
    }
}

impl<O: DependencyObject + ?Sized> DependencyObjectExt for O {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PropertyMetadataBuilder;
    use understory_reflect::{TypeKey, Typed};

    struct Panel {
        store: PropertyStore,
    }

    impl Typed for Panel {
        fn type_key() -> TypeKey {
            TypeKey::new::<Self>("Panel")
        }
    }

    impl DependencyObject for Panel {
        fn property_store(&self) -> &PropertyStore {
            &self.store
        }

        fn property_store_mut(&mut self) -> &mut PropertyStore {
            &mut self.store
        }
    }

    fn panel() -> Panel {
        Panel {
            store: PropertyStore::for_type::<Panel>(),
        }
    }

    fn font_size(registry: &mut PropertyRegistry) -> Property<f64> {
        registry
            .register(
                Panel::type_key(),
                "FontSize",
                PropertyMetadataBuilder::new(12.0_f64).inherits(true).build(),
            )
            .unwrap()
    }

    #[test]
    fn walk_skips_ancestors_without_values() {
        let mut registry = PropertyRegistry::new();
        let font_size = font_size(&mut registry);
        let mut root = panel();
        let mut middle = panel();
        middle.store.set_parent(Some(root.object_id()));

        root.set_value(&registry, font_size, 20.0).unwrap();
        root.digest_properties(&mut DigestCx::new(&registry), Duration::ZERO);

        let stores = vec![&root.store, &middle.store];
        assert_eq!(
            walk_inherited(Some(middle.object_id()), font_size, &stores),
            Some(20.0)
        );
        assert_eq!(walk_inherited(None, font_size, &stores), None);
        assert_eq!(
            walk_inherited(Some(ObjectId::new(u64::MAX)), font_size, &stores),
            None
        );
    }

    #[test]
    fn own_value_beats_inherited() {
        let mut registry = PropertyRegistry::new();
        let font_size = font_size(&mut registry);
        let mut parent = panel();
        let mut child = panel();
        child.store.set_parent(Some(parent.object_id()));

        parent.set_value(&registry, font_size, 18.0).unwrap();
        child.set_value(&registry, font_size, 9.0).unwrap();
        parent.digest_properties(&mut DigestCx::new(&registry), Duration::ZERO);
        child.digest_properties(&mut DigestCx::new(&registry), Duration::ZERO);

        assert_eq!(child.get_inherited(&registry, font_size, &parent.store), 9.0);
        assert!(child.clear_value(font_size));
        assert_eq!(child.get_inherited(&registry, font_size, &parent.store), 18.0);
    }

    #[test]
    fn digest_pulls_inherited_value() {
        let mut registry = PropertyRegistry::new();
        let font_size = font_size(&mut registry);
        let mut parent = panel();
        let mut child = panel();
        child.store.set_parent(Some(parent.object_id()));
        child.store.track(&registry, font_size).unwrap();

        parent.set_value(&registry, font_size, 24.0).unwrap();
        parent.digest_properties(&mut DigestCx::new(&registry), Duration::ZERO);

        let mut cx = DigestCx::new(&registry).with_parents(&parent.store);
        assert_eq!(child.digest_properties(&mut cx, Duration::ZERO), 1);
        assert_eq!(child.get_value(&registry, font_size), 24.0);
        // Inheriting slots are re-read every digest, but report no change.
        assert_eq!(child.digest_properties(&mut cx, Duration::ZERO), 0);
    }

    #[test]
    fn map_lookup() {
        let mut registry = PropertyRegistry::new();
        let font_size = font_size(&mut registry);
        let mut root = panel();
        root.set_value(&registry, font_size, 30.0).unwrap();
        root.digest_properties(&mut DigestCx::new(&registry), Duration::ZERO);
        let root_id = root.object_id();

        let mut stores: HashMap<ObjectId, PropertyStore> = HashMap::new();
        stores.insert(root_id, root.store);
        assert_eq!(walk_inherited(Some(root_id), font_size, &stores), Some(30.0));
    }
}
