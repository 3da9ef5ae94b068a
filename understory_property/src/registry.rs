// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property registry.
//!
//! This module provides [`PropertyRegistry`] for registering properties on
//! owner types and for looking them up, together with their metadata, from
//! any type in the owner's hierarchy.
//!
//! Names and styling names are unique within one owner type's domain. A
//! lookup from a derived type walks its ancestor chain, nearest first. The
//! result of each walk is flattened into a per-type cache that is cleared
//! whenever the registry is mutated.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use understory_reflect::{Bindable, TypeKey};

use crate::error::RegistrationError;
use crate::id::{Property, PropertyId, WriteKey};
use crate::metadata::{MetadataFlags, PropertyMetadata};

/// A registered property.
///
/// This stores the property's names, value type, owners, and metadata.
pub struct PropertyDefinition {
    id: PropertyId,
    name: &'static str,
    styling_name: String,
    value_type: TypeId,
    value_type_name: &'static str,
    owner: TypeKey,
    owners: SmallVec<[TypeKey; 2]>,
    read_only: bool,
    attached: bool,
    metadata: Box<dyn ErasedMetadata>,
    overrides: HashMap<TypeId, Box<dyn ErasedMetadata>>,
}

impl PropertyDefinition {
    /// Returns the property id.
    #[must_use]
    #[inline]
    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// Returns the property name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the name stylesheets use for this property.
    #[must_use]
    #[inline]
    pub fn styling_name(&self) -> &str {
        &self.styling_name
    }

    /// Returns the [`TypeId`] of the property's value type.
    #[must_use]
    #[inline]
    pub fn value_type(&self) -> TypeId {
        self.value_type
    }

    /// Returns the Rust name of the property's value type.
    #[must_use]
    #[inline]
    pub fn value_type_name(&self) -> &'static str {
        self.value_type_name
    }

    /// Returns the type that registered the property.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Returns the types added with [`PropertyRegistry::add_owner`].
    #[must_use]
    pub fn additional_owners(&self) -> &[TypeKey] {
        &self.owners
    }

    /// Returns whether plain writes are rejected.
    #[must_use]
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns whether this is an attached property.
    #[must_use]
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Returns the flags of the default metadata.
    #[must_use]
    pub fn flags(&self) -> MetadataFlags {
        self.metadata.flags()
    }

    /// Returns the number of per-type metadata overrides.
    #[must_use]
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    fn resolve_metadata(&self, override_key: Option<TypeId>) -> &dyn ErasedMetadata {
        override_key
            .and_then(|key| self.overrides.get(&key))
            .map_or(&*self.metadata, |metadata| &**metadata)
    }
}

impl fmt::Debug for PropertyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("styling_name", &self.styling_name)
            .field("value_type", &self.value_type_name)
            .field("owner", &self.owner)
            .field("read_only", &self.read_only)
            .field("attached", &self.attached)
            .field("flags", &self.flags())
            .finish_non_exhaustive()
    }
}

/// Names registered directly on one owner type.
#[derive(Debug, Default)]
struct OwnerDomain {
    by_name: HashMap<&'static str, PropertyId>,
    by_styling_name: HashMap<String, PropertyId>,
}

/// Names visible from one type, with ancestors folded in.
#[derive(Debug, Default)]
struct FlatLookup {
    by_name: HashMap<&'static str, PropertyId>,
    by_styling_name: HashMap<String, PropertyId>,
}

#[derive(Copy, Clone, Debug)]
enum Registration {
    Plain,
    ReadOnly,
    Attached,
}

/// A registry for dependency properties.
///
/// Properties are registered once at startup with `&mut self`; afterwards the
/// registry serves concurrent lookups through `&self`.
///
/// # Example
///
/// ```rust
/// use understory_property::{PropertyMetadataBuilder, PropertyRegistry};
/// use understory_reflect::{TypeKey, Typed};
///
/// struct Control;
/// impl Typed for Control {
///     fn type_key() -> TypeKey {
///         TypeKey::new::<Self>("Control")
///     }
/// }
///
/// struct Button;
/// impl Typed for Button {
///     fn type_key() -> TypeKey {
///         TypeKey::new::<Self>("Button").with_base::<Control>()
///     }
/// }
///
/// let mut registry = PropertyRegistry::new();
/// let font_size = registry
///     .register(
///         Control::type_key(),
///         "FontSize",
///         PropertyMetadataBuilder::new(12.0_f64).affects_measure(true).build(),
///     )
///     .unwrap();
///
/// let definition = registry.definition(font_size.id()).unwrap();
/// assert_eq!(definition.styling_name(), "font-size");
///
/// // Lookups from a derived type walk up to the owner.
/// assert_eq!(registry.find_by_name("FontSize", Button::type_key()), Some(font_size.id()));
/// assert_eq!(registry.find_by_styling_name("font-size", Button::type_key()), Some(font_size.id()));
/// assert_eq!(registry.find_by_name("FontSize", TypeKey::new::<u8>("u8")), None);
/// ```
#[derive(Default)]
pub struct PropertyRegistry {
    definitions: Vec<PropertyDefinition>,
    domains: HashMap<TypeId, OwnerDomain>,
    lookup_cache: RwLock<HashMap<TypeId, Arc<FlatLookup>>>,
    metadata_cache: RwLock<HashMap<(PropertyId, TypeId), Option<TypeId>>>,
}

impl PropertyRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a property named `name` on `owner`.
    ///
    /// The styling name is the kebab-case form of `name`. Returns a
    /// type-safe [`Property<T>`] handle.
    ///
    /// # Errors
    ///
    /// Fails if the name or styling name is taken in the owner's domain, if
    /// `metadata` has no default, or if the id space is exhausted.
    pub fn register<T: Bindable>(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        metadata: PropertyMetadata<T>,
    ) -> Result<Property<T>, RegistrationError> {
        let styling_name = default_styling_name(name);
        self.insert(owner, name, styling_name, metadata, Registration::Plain)
    }

    /// Registers a property with an explicit styling name.
    ///
    /// # Errors
    ///
    /// As for [`PropertyRegistry::register`].
    pub fn register_styled<T: Bindable>(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        styling_name: &str,
        metadata: PropertyMetadata<T>,
    ) -> Result<Property<T>, RegistrationError> {
        self.insert(
            owner,
            name,
            styling_name.to_owned(),
            metadata,
            Registration::Plain,
        )
    }

    /// Registers a read-only property.
    ///
    /// Plain store writes fail with
    /// [`PropertyError::ReadOnly`](crate::PropertyError::ReadOnly); writes that
    /// present the returned [`WriteKey`] succeed.
    ///
    /// # Errors
    ///
    /// As for [`PropertyRegistry::register`].
    pub fn register_read_only<T: Bindable>(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        metadata: PropertyMetadata<T>,
    ) -> Result<(Property<T>, WriteKey<T>), RegistrationError> {
        let styling_name = default_styling_name(name);
        let property = self.insert(owner, name, styling_name, metadata, Registration::ReadOnly)?;
        Ok((property, WriteKey::new(property)))
    }

    /// Registers an attached property.
    ///
    /// Attached properties are declared by one type but set on arbitrary
    /// objects; name lookups still resolve through the owner's domain.
    ///
    /// # Errors
    ///
    /// As for [`PropertyRegistry::register`].
    pub fn register_attached<T: Bindable>(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        metadata: PropertyMetadata<T>,
    ) -> Result<Property<T>, RegistrationError> {
        let styling_name = default_styling_name(name);
        self.insert(owner, name, styling_name, metadata, Registration::Attached)
    }

    fn insert<T: Bindable>(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        styling_name: String,
        metadata: PropertyMetadata<T>,
        registration: Registration,
    ) -> Result<Property<T>, RegistrationError> {
        if !metadata.has_default() {
            return Err(RegistrationError::MissingDefaultValue {
                name,
                owner: owner.name(),
            });
        }
        let Ok(index) = u16::try_from(self.definitions.len()) else {
            return Err(RegistrationError::TooManyProperties);
        };
        if index == u16::MAX {
            return Err(RegistrationError::TooManyProperties);
        }
        let id = PropertyId::new(index);
        self.claim_names(owner, name, &styling_name, id)?;

        tracing::trace!(
            property = name,
            owner = owner.name(),
            styling_name = %styling_name,
            ?id,
            "registered property"
        );
        self.definitions.push(PropertyDefinition {
            id,
            name,
            styling_name,
            value_type: TypeId::of::<T>(),
            value_type_name: core::any::type_name::<T>(),
            owner,
            owners: SmallVec::new(),
            read_only: matches!(registration, Registration::ReadOnly),
            attached: matches!(registration, Registration::Attached),
            metadata: Box::new(metadata),
            overrides: HashMap::new(),
        });
        self.invalidate_caches();
        Ok(Property::from_id(id))
    }

    fn claim_names(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        styling_name: &str,
        id: PropertyId,
    ) -> Result<(), RegistrationError> {
        let domain = self.domains.entry(owner.id()).or_default();
        if domain.by_name.contains_key(name) {
            return Err(RegistrationError::DuplicateRegistration {
                name,
                owner: owner.name(),
            });
        }
        if domain.by_styling_name.contains_key(styling_name) {
            return Err(RegistrationError::DuplicateStylingName {
                styling_name: styling_name.to_owned(),
                owner: owner.name(),
            });
        }
        domain.by_name.insert(name, id);
        domain.by_styling_name.insert(styling_name.to_owned(), id);
        Ok(())
    }

    /// Makes `property` visible from `owner`'s domain, optionally overriding
    /// its metadata for that type.
    ///
    /// # Errors
    ///
    /// Fails if the property is unknown, if its names collide in `owner`'s
    /// domain, or if the override fails.
    pub fn add_owner<T: Bindable>(
        &mut self,
        property: Property<T>,
        owner: TypeKey,
        metadata: Option<PropertyMetadata<T>>,
    ) -> Result<(), RegistrationError> {
        let id = property.id();
        let definition = self.typed_definition(property)?;
        let (name, styling_name) = (definition.name, definition.styling_name.clone());
        if metadata.is_some() && definition.overrides.contains_key(&owner.id()) {
            return Err(RegistrationError::DuplicateOverride {
                name,
                owner: owner.name(),
            });
        }
        self.claim_names(owner, name, &styling_name, id)?;
        if let Some(metadata) = metadata
            && let Err(err) = self.override_metadata(property, owner, metadata)
        {
            self.release_names(owner, name, &styling_name);
            return Err(err);
        }
        if let Some(definition) = self.definitions.get_mut(usize::from(id.index())) {
            definition.owners.push(owner);
        }
        tracing::trace!(property = name, owner = owner.name(), "added property owner");
        self.invalidate_caches();
        Ok(())
    }

    fn release_names(&mut self, owner: TypeKey, name: &str, styling_name: &str) {
        if let Some(domain) = self.domains.get_mut(&owner.id()) {
            domain.by_name.remove(name);
            domain.by_styling_name.remove(styling_name);
        }
        self.invalidate_caches();
    }

    /// Overrides the metadata of `property` for `for_type` and its descendants.
    ///
    /// Unset parts of `metadata` are filled from the nearest ancestor's
    /// resolved metadata, and changed callbacks accumulate.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistrationError::DuplicateOverride`] if `for_type`
    /// already has an override, or if the property is unknown.
    pub fn override_metadata<T: Bindable>(
        &mut self,
        property: Property<T>,
        for_type: TypeKey,
        metadata: PropertyMetadata<T>,
    ) -> Result<(), RegistrationError> {
        let definition = self.typed_definition(property)?;
        if definition.overrides.contains_key(&for_type.id()) {
            return Err(RegistrationError::DuplicateOverride {
                name: definition.name,
                owner: for_type.name(),
            });
        }
        let base_key = for_type
            .ancestors()
            .skip(1)
            .find(|ancestor| definition.overrides.contains_key(&ancestor.id()))
            .map(|ancestor| ancestor.id());
        let Some(base) = definition
            .resolve_metadata(base_key)
            .as_any()
            .downcast_ref::<PropertyMetadata<T>>()
        else {
            return Err(type_mismatch::<T>(definition));
        };
        let merged = metadata.merged_with(base);
        tracing::trace!(
            property = definition.name,
            for_type = for_type.name(),
            "overrode property metadata"
        );
        if let Some(definition) = self.definitions.get_mut(usize::from(property.id().index())) {
            definition
                .overrides
                .insert(for_type.id(), Box::new(merged));
        }
        self.invalidate_caches();
        Ok(())
    }

    fn typed_definition<T: 'static>(
        &self,
        property: Property<T>,
    ) -> Result<&PropertyDefinition, RegistrationError> {
        let definition = self
            .definition(property.id())
            .ok_or(RegistrationError::UnknownProperty { id: property.id() })?;
        if definition.value_type != TypeId::of::<T>() {
            return Err(type_mismatch::<T>(definition));
        }
        Ok(definition)
    }

    fn invalidate_caches(&mut self) {
        self.lookup_cache.get_mut().clear();
        self.metadata_cache.get_mut().clear();
    }

    fn flat_lookup(&self, ty: TypeKey) -> Arc<FlatLookup> {
        if let Some(flat) = self.lookup_cache.read().get(&ty.id()) {
            return Arc::clone(flat);
        }
        tracing::debug!(ty = ty.name(), "building property lookup");
        let mut flat = FlatLookup::default();
        for ancestor in ty.ancestors() {
            let Some(domain) = self.domains.get(&ancestor.id()) else {
                continue;
            };
            for (&name, &id) in &domain.by_name {
                flat.by_name.entry(name).or_insert(id);
            }
            for (styling_name, &id) in &domain.by_styling_name {
                flat.by_styling_name
                    .entry(styling_name.clone())
                    .or_insert(id);
            }
        }
        let flat = Arc::new(flat);
        self.lookup_cache
            .write()
            .insert(ty.id(), Arc::clone(&flat));
        flat
    }

    /// Finds a property by name, walking `owner`'s ancestor chain.
    #[must_use]
    pub fn find_by_name(&self, name: &str, owner: TypeKey) -> Option<PropertyId> {
        self.flat_lookup(owner).by_name.get(name).copied()
    }

    /// Finds a property by styling name, walking `owner`'s ancestor chain.
    #[must_use]
    pub fn find_by_styling_name(&self, styling_name: &str, owner: TypeKey) -> Option<PropertyId> {
        self.flat_lookup(owner)
            .by_styling_name
            .get(styling_name)
            .copied()
    }

    /// Finds a property by name and checks its value type.
    #[must_use]
    pub fn find<T: 'static>(&self, name: &str, owner: TypeKey) -> Option<Property<T>> {
        let id = self.find_by_name(name, owner)?;
        let definition = self.definition(id)?;
        (definition.value_type == TypeId::of::<T>()).then(|| Property::from_id(id))
    }

    /// Returns the registered definition for `id`.
    #[must_use]
    pub fn definition(&self, id: PropertyId) -> Option<&PropertyDefinition> {
        self.definitions.get(usize::from(id.index()))
    }

    /// Returns whether `id` is a read-only property.
    #[must_use]
    pub fn is_read_only(&self, id: PropertyId) -> bool {
        self.definition(id).is_some_and(|d| d.read_only)
    }

    /// Returns the metadata that applies to `property` on objects of type `ty`.
    ///
    /// This is the nearest override on the ancestor chain of `ty`, falling
    /// back to the default metadata. Returns `None` if the property is not
    /// registered or `T` is not its value type.
    #[must_use]
    pub fn metadata_for<T: 'static>(
        &self,
        property: Property<T>,
        ty: TypeKey,
    ) -> Option<&PropertyMetadata<T>> {
        let definition = self.definition(property.id())?;
        let override_key = self.override_key(definition, ty);
        definition
            .resolve_metadata(override_key)
            .as_any()
            .downcast_ref()
    }

    /// Returns the default metadata of `property`, ignoring overrides.
    #[must_use]
    pub fn default_metadata<T: 'static>(
        &self,
        property: Property<T>,
    ) -> Option<&PropertyMetadata<T>> {
        self.definition(property.id())?
            .metadata
            .as_any()
            .downcast_ref()
    }

    /// Returns the flags that apply to `id` on objects of type `ty`.
    #[must_use]
    pub fn flags_for(&self, id: PropertyId, ty: TypeKey) -> MetadataFlags {
        self.definition(id).map_or(MetadataFlags::empty(), |d| {
            d.resolve_metadata(self.override_key(d, ty)).flags()
        })
    }

    fn override_key(&self, definition: &PropertyDefinition, ty: TypeKey) -> Option<TypeId> {
        if definition.overrides.is_empty() {
            return None;
        }
        let cache_key = (definition.id, ty.id());
        if let Some(key) = self.metadata_cache.read().get(&cache_key) {
            return *key;
        }
        let key = ty
            .ancestors()
            .find(|ancestor| definition.overrides.contains_key(&ancestor.id()))
            .map(|ancestor| ancestor.id());
        self.metadata_cache.write().insert(cache_key, key);
        key
    }

    /// Returns the number of registered properties.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if no properties are registered.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns an iterator over all registered properties, in id order.
    pub fn iter(&self) -> impl Iterator<Item = &PropertyDefinition> {
        self.definitions.iter()
    }
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("count", &self.definitions.len())
            .field(
                "properties",
                &self.definitions.iter().map(|d| d.name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

fn type_mismatch<T>(definition: &PropertyDefinition) -> RegistrationError {
    RegistrationError::TypeMismatch {
        name: definition.name,
        expected: definition.value_type_name,
        found: core::any::type_name::<T>(),
    }
}

/// Converts a member name such as `FontSize` or `HTMLColor` to its
/// default styling name (`font-size`, `html-color`).
///
/// ```rust
/// use understory_property::default_styling_name;
///
/// assert_eq!(default_styling_name("IsMouseOver"), "is-mouse-over");
/// ```
#[must_use]
pub fn default_styling_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.ends_with('-') {
                out.push('-');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Type-erased metadata for heterogeneous storage.
trait ErasedMetadata: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn flags(&self) -> MetadataFlags;
}

impl<T: Bindable> ErasedMetadata for PropertyMetadata<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn flags(&self) -> MetadataFlags {
        Self::flags(self)
    }
}
