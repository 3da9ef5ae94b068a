// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-object sparse property storage.
//!
//! This module provides [`PropertyStore`], which owns the [`ValueSlot`]s of
//! one dependency object, and [`DigestCx`], which carries what a digest
//! reports to.
//!
//! # Implementation
//!
//! Slots live in a sorted vector searched by [`PropertyId`] rather than in a
//! hash map. This gives:
//!
//! - better cache locality (contiguous memory)
//! - lower memory overhead (no hash buckets)
//! - O(log n) lookup, which is fast for typical property counts (5-20)
//! - inline storage for small property sets via `SmallVec`
//!
//! Slots are created on first write and live as long as the store; clearing
//! a source never removes the slot.

use core::any::{Any, TypeId};
use core::fmt;
use core::time::Duration;

use smallvec::SmallVec;
use understory_reflect::{Bindable, ErasedValue, TypeKey, Typed, ValueConverter};

use crate::animation::{AnimationDriver, Interpolate, Tween};
use crate::bound::BoundValue;
use crate::error::PropertyError;
use crate::id::{ObjectId, Property, PropertyId, WriteKey};
use crate::invalidate::InvalidationHook;
use crate::metadata::MetadataFlags;
use crate::notify::ChangeNotifications;
use crate::object::{StoreLookup, walk_inherited};
use crate::registry::{PropertyDefinition, PropertyRegistry};
use crate::slot::{SlotContext, SlotFlags, ValueSlot};

/// Default inline capacity for slots.
///
/// Most UI objects have fewer than 8 non-default properties set,
/// so this avoids heap allocation in the common case.
const INLINE_CAPACITY: usize = 8;

type Slots = SmallVec<[(PropertyId, Box<dyn ErasedSlot>); INLINE_CAPACITY]>;

/// Where a digest reports its results.
///
/// Only the registry is required. Invalidation hooks, change notification,
/// and inheritance from parent stores are opted into with the builder
/// methods.
pub struct DigestCx<'a> {
    registry: &'a PropertyRegistry,
    hooks: Option<&'a mut dyn InvalidationHook>,
    notifications: Option<&'a ChangeNotifications>,
    parents: Option<&'a dyn StoreLookup>,
}

impl<'a> DigestCx<'a> {
    /// Creates a context that only resolves metadata.
    #[must_use]
    pub fn new(registry: &'a PropertyRegistry) -> Self {
        Self {
            registry,
            hooks: None,
            notifications: None,
            parents: None,
        }
    }

    /// Reports measure and arrange invalidations to `hooks`.
    #[must_use]
    pub fn with_hooks(mut self, hooks: &'a mut dyn InvalidationHook) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Reports every change to `notifications`.
    #[must_use]
    pub fn with_notifications(mut self, notifications: &'a ChangeNotifications) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Resolves inherited values through `parents`.
    ///
    /// Parents should be digested before their children, so that a change
    /// reaches the whole subtree in one pass.
    #[must_use]
    pub fn with_parents(mut self, parents: &'a dyn StoreLookup) -> Self {
        self.parents = Some(parents);
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &'a PropertyRegistry {
        self.registry
    }
}

impl fmt::Debug for DigestCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestCx")
            .field("registry", &self.registry)
            .field("hooks", &self.hooks.is_some())
            .field("notifications", &self.notifications)
            .field("parents", &self.parents.is_some())
            .finish()
    }
}

/// Per-object sparse storage for property values.
///
/// # Example
///
/// ```rust
/// use core::time::Duration;
/// use understory_property::{
///     DigestCx, ObjectId, PropertyMetadataBuilder, PropertyRegistry, PropertyStore,
/// };
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
/// let opacity = registry
///     .register(Widget::type_key(), "Opacity", PropertyMetadataBuilder::new(1.0_f32).build())
///     .unwrap();
///
/// let mut store = PropertyStore::new(ObjectId::next(), Widget::type_key());
/// store.set_local(&registry, opacity, 0.5).unwrap();
///
/// // Writes take effect at the next digest.
/// assert_eq!(store.get(&registry, opacity), 1.0);
/// let changed = store.digest(&mut DigestCx::new(&registry), Duration::ZERO);
/// assert_eq!(changed, 1);
/// assert_eq!(store.get(&registry, opacity), 0.5);
/// ```
pub struct PropertyStore {
    owner: ObjectId,
    owner_type: TypeKey,
    parent: Option<ObjectId>,
    data_source: Option<ErasedValue>,
    slots: Slots,
}

impl PropertyStore {
    /// Creates an empty store for `owner`, an object of type `owner_type`.
    #[must_use]
    pub fn new(owner: ObjectId, owner_type: TypeKey) -> Self {
        Self {
            owner,
            owner_type,
            parent: None,
            data_source: None,
            slots: SmallVec::new(),
        }
    }

    /// Creates an empty store for a fresh object of type `O`.
    #[must_use]
    pub fn for_type<O: Typed>() -> Self {
        Self::new(ObjectId::next(), O::type_key())
    }

    /// Returns the owning object.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Returns the owning object's type.
    #[must_use]
    #[inline]
    pub fn owner_type(&self) -> TypeKey {
        self.owner_type
    }

    /// Returns the logical parent used for inheritance.
    #[must_use]
    #[inline]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Sets the logical parent used for inheritance.
    pub fn set_parent(&mut self, parent: Option<ObjectId>) {
        if self.parent != parent {
            self.parent = parent;
            self.invalidate_all();
        }
    }

    /// Returns the data source bound values read from.
    #[must_use]
    pub fn data_source(&self) -> Option<&ErasedValue> {
        self.data_source.as_ref()
    }

    /// Replaces the data source bound values read from.
    pub fn set_data_source(&mut self, data_source: Option<ErasedValue>) {
        self.data_source = data_source;
        self.invalidate_all();
    }

    fn invalidate_all(&mut self) {
        for (_, slot) in &mut self.slots {
            slot.invalidate();
        }
    }

    /// Returns `true` if no slots exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns the properties that have slots, in id order.
    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.slots.iter().map(|(id, _)| *id)
    }

    #[inline]
    fn find(&self, id: PropertyId) -> Result<usize, usize> {
        self.slots.binary_search_by_key(&id, |(pid, _)| *pid)
    }

    /// Returns the slot for `property`, if one exists.
    #[must_use]
    pub fn slot<T: 'static>(&self, property: Property<T>) -> Option<&ValueSlot<T>> {
        let index = self.find(property.id()).ok()?;
        self.slots[index].1.as_any().downcast_ref()
    }

    fn slot_mut<T: 'static>(&mut self, property: Property<T>) -> Option<&mut ValueSlot<T>> {
        let index = self.find(property.id()).ok()?;
        self.slots[index].1.as_any_mut().downcast_mut()
    }

    /// Returns the slot state for `id`, or empty flags if it has no slot.
    #[must_use]
    pub fn flags(&self, id: PropertyId) -> SlotFlags {
        self.find(id)
            .map_or(SlotFlags::empty(), |index| self.slots[index].1.flags())
    }

    /// Returns the effective value from the last digest, if any.
    #[must_use]
    pub fn cached<T: 'static + Clone + PartialEq>(&self, property: Property<T>) -> Option<&T> {
        self.slot(property)?.effective()
    }

    /// Returns the effective value from the last digest, or the default in
    /// effect for the owner type when the property was never digested.
    ///
    /// Returns `None` if the property is not registered with type `T`.
    #[must_use]
    pub fn try_get<T: Bindable>(&self, registry: &PropertyRegistry, property: Property<T>) -> Option<T> {
        if let Some(value) = self.cached(property) {
            return Some(value.clone());
        }
        registry
            .metadata_for(property, self.owner_type)?
            .default_value()
    }

    /// Returns the effective value from the last digest, or the default.
    ///
    /// # Panics
    ///
    /// Panics if the property is not registered with type `T`.
    #[must_use]
    pub fn get<T: Bindable>(&self, registry: &PropertyRegistry, property: Property<T>) -> T {
        match self.try_get(registry, property) {
            Some(value) => value,
            None => panic!(
                "{:?} is not registered as a '{}'",
                property.id(),
                core::any::type_name::<T>()
            ),
        }
    }

    /// Sets the local value.
    ///
    /// On a bound slot the value is written through the binding instead.
    ///
    /// # Errors
    ///
    /// Fails for read-only properties, which need
    /// [`PropertyStore::set_local_with_key`], and for unregistered or
    /// mistyped handles.
    pub fn set_local<T: Bindable>(
        &mut self,
        registry: &PropertyRegistry,
        property: Property<T>,
        value: T,
    ) -> Result<(), PropertyError> {
        let definition = check(registry, property)?;
        if definition.is_read_only() {
            return Err(PropertyError::ReadOnly {
                name: definition.name(),
            });
        }
        self.write_local(property, value);
        Ok(())
    }

    /// Sets the local value of a read-only property.
    pub fn set_local_with_key<T: Bindable>(&mut self, key: &WriteKey<T>, value: T) {
        self.write_local(key.property(), value);
    }

    fn write_local<T: Bindable>(&mut self, property: Property<T>, value: T) {
        let Self {
            slots, data_source, ..
        } = self;
        if let Some(slot) = typed_slot_or_insert(slots, property) {
            slot.set_local(value, data_source.as_ref());
        }
    }

    /// Clears the local value. Returns `true` if one was set.
    pub fn clear_local<T: Bindable>(&mut self, property: Property<T>) -> bool {
        self.slot_mut(property).is_some_and(ValueSlot::clear_local)
    }

    /// Sets the styled value.
    ///
    /// # Errors
    ///
    /// Fails for unregistered or mistyped handles.
    pub fn set_styled<T: Bindable>(
        &mut self,
        registry: &PropertyRegistry,
        property: Property<T>,
        value: T,
    ) -> Result<(), PropertyError> {
        check(registry, property)?;
        if let Some(slot) = typed_slot_or_insert(&mut self.slots, property) {
            slot.set_styled(value);
        }
        Ok(())
    }

    /// Converts stylesheet text and stores it as the styled value.
    ///
    /// Text that cannot be converted becomes the type's default.
    ///
    /// # Errors
    ///
    /// Fails for unregistered or mistyped handles.
    pub fn set_styled_from_str<T: Bindable + Default>(
        &mut self,
        registry: &PropertyRegistry,
        converter: &ValueConverter,
        property: Property<T>,
        text: &str,
    ) -> Result<(), PropertyError> {
        let text = ErasedValue::new(text.to_owned());
        let value: T = converter.convert(Some(&text), None, false);
        self.set_styled(registry, property, value)
    }

    /// Clears the styled value. Returns `true` if one was set.
    pub fn clear_styled<T: Bindable>(&mut self, property: Property<T>) -> bool {
        self.slot_mut(property).is_some_and(ValueSlot::clear_styled)
    }

    /// Sets the triggered value.
    ///
    /// # Errors
    ///
    /// Fails for unregistered or mistyped handles.
    pub fn set_triggered<T: Bindable>(
        &mut self,
        registry: &PropertyRegistry,
        property: Property<T>,
        value: T,
    ) -> Result<(), PropertyError> {
        check(registry, property)?;
        if let Some(slot) = typed_slot_or_insert(&mut self.slots, property) {
            slot.set_triggered(value);
        }
        Ok(())
    }

    /// Clears the triggered value. Returns `true` if one was set.
    pub fn clear_triggered<T: Bindable>(&mut self, property: Property<T>) -> bool {
        self.slot_mut(property)
            .is_some_and(ValueSlot::clear_triggered)
    }

    /// Sets the animated value, stopping any running tween.
    ///
    /// # Errors
    ///
    /// Fails for unregistered or mistyped handles.
    pub fn set_animated<T: Bindable>(
        &mut self,
        registry: &PropertyRegistry,
        property: Property<T>,
        value: T,
    ) -> Result<(), PropertyError> {
        check(registry, property)?;
        if let Some(slot) = typed_slot_or_insert(&mut self.slots, property) {
            slot.set_animated(value);
        }
        Ok(())
    }

    /// Clears the animated value and stops any running tween.
    pub fn clear_animated<T: Bindable>(&mut self, property: Property<T>) -> bool {
        self.slot_mut(property).is_some_and(ValueSlot::clear_animated)
    }

    /// Starts a tween on the animated source.
    ///
    /// A tween without a start value begins at the current effective value.
    /// It advances by the elapsed time given to each digest and holds its end
    /// value once finished, until [`PropertyStore::clear_animated`].
    ///
    /// # Errors
    ///
    /// Fails for unregistered or mistyped handles.
    pub fn animate<T: Bindable + Interpolate>(
        &mut self,
        registry: &PropertyRegistry,
        property: Property<T>,
        tween: Tween<T>,
    ) -> Result<(), PropertyError> {
        check(registry, property)?;
        let current = self
            .try_get(registry, property)
            .ok_or(PropertyError::NotRegistered { id: property.id() })?;
        if let Some(slot) = typed_slot_or_insert(&mut self.slots, property) {
            slot.start_animation(AnimationDriver::start(tween, current));
        }
        Ok(())
    }

    /// Clears every animated value. Returns how many were cleared.
    pub fn clear_all_animations(&mut self) -> usize {
        let mut cleared = 0;
        for (_, slot) in &mut self.slots {
            if slot.clear_animated() {
                cleared += 1;
            }
        }
        cleared
    }

    /// Installs a bound value in place of the local source.
    ///
    /// # Errors
    ///
    /// Fails for read-only properties and for unregistered or mistyped
    /// handles.
    pub fn bind<T: Bindable>(
        &mut self,
        registry: &PropertyRegistry,
        property: Property<T>,
        bound: Box<dyn BoundValue<T>>,
    ) -> Result<(), PropertyError> {
        let definition = check(registry, property)?;
        if definition.is_read_only() {
            return Err(PropertyError::ReadOnly {
                name: definition.name(),
            });
        }
        tracing::trace!(
            owner = ?self.owner,
            property = definition.name(),
            expression = bound.expression(),
            "bound property"
        );
        if let Some(slot) = typed_slot_or_insert(&mut self.slots, property) {
            slot.bind(bound);
        }
        Ok(())
    }

    /// Removes the bound value, restoring local semantics.
    ///
    /// Returns `true` if the property was bound.
    pub fn unbind<T: Bindable>(&mut self, property: Property<T>) -> bool {
        self.slot_mut(property)
            .and_then(ValueSlot::unbind)
            .is_some()
    }

    /// Returns `true` if the property is bound.
    #[must_use]
    pub fn is_bound(&self, id: PropertyId) -> bool {
        self.flags(id).contains(SlotFlags::DATA_BOUND)
    }

    /// Forgets the bound value's cached display conversion.
    pub fn invalidate_display_cache(&mut self, id: PropertyId) {
        if let Ok(index) = self.find(id) {
            self.slots[index].1.invalidate_display_cache();
        }
    }

    /// Creates a slot for `property` so it takes part in digest without an
    /// own source.
    ///
    /// This is how an object starts inheriting a value it never sets.
    ///
    /// # Errors
    ///
    /// Fails for unregistered or mistyped handles.
    pub fn track<T: Bindable>(
        &mut self,
        registry: &PropertyRegistry,
        property: Property<T>,
    ) -> Result<(), PropertyError> {
        check(registry, property)?;
        if let Some(slot) = typed_slot_or_insert(&mut self.slots, property) {
            slot.invalidate();
        }
        Ok(())
    }

    /// Digests every slot and returns the number of changed properties.
    ///
    /// For each change, in order: the metadata's changed callbacks run, the
    /// invalidation hooks are told if the metadata affects measure or
    /// arrange, and the notification server's subscribers are called.
    pub fn digest(&mut self, cx: &mut DigestCx<'_>, elapsed: Duration) -> usize {
        let mut changed = 0;
        for index in 0..self.slots.len() {
            if self.digest_at(cx, index, elapsed) {
                changed += 1;
            }
        }
        changed
    }

    /// Digests a single property. Returns `true` if its value changed.
    pub fn digest_property(
        &mut self,
        cx: &mut DigestCx<'_>,
        id: PropertyId,
        elapsed: Duration,
    ) -> bool {
        match self.find(id) {
            Ok(index) => self.digest_at(cx, index, elapsed),
            Err(_) => false,
        }
    }

    /// Digests a single property right away, with no elapsed time.
    pub fn digest_immediately(&mut self, cx: &mut DigestCx<'_>, id: PropertyId) -> bool {
        self.digest_property(cx, id, Duration::ZERO)
    }

    fn digest_at(&mut self, cx: &mut DigestCx<'_>, index: usize, elapsed: Duration) -> bool {
        let Self {
            owner,
            owner_type,
            parent,
            data_source,
            slots,
        } = self;
        let (property, slot) = &mut slots[index];
        let env = SlotEnv {
            registry: cx.registry,
            owner: *owner,
            owner_type: *owner_type,
            property: *property,
            data_source: data_source.as_ref(),
            parent: *parent,
            parents: cx.parents,
            elapsed,
        };
        let Some(flags) = slot.digest(&env) else {
            return false;
        };
        tracing::trace!(owner = ?*owner, property = ?*property, "effective value changed");

        if let Some(hooks) = cx.hooks.as_deref_mut() {
            if flags.contains(MetadataFlags::AFFECTS_MEASURE) {
                hooks.on_measure_affecting_changed(*owner);
            }
            if flags.contains(MetadataFlags::AFFECTS_ARRANGE) {
                hooks.on_arrange_affecting_changed(*owner);
            }
        }
        if let Some(notifications) = cx.notifications {
            notifications.notify(*property, *owner);
        }
        slot.clear_pending();
        true
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyStore")
            .field("owner", &self.owner)
            .field("owner_type", &self.owner_type)
            .field("parent", &self.parent)
            .field(
                "slots",
                &self
                    .slots
                    .iter()
                    .map(|(id, slot)| (id.index(), slot.flags()))
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

fn check<T: 'static>(
    registry: &PropertyRegistry,
    property: Property<T>,
) -> Result<&PropertyDefinition, PropertyError> {
    let definition = registry
        .definition(property.id())
        .ok_or(PropertyError::NotRegistered { id: property.id() })?;
    if definition.value_type() != TypeId::of::<T>() {
        return Err(PropertyError::TypeMismatch {
            name: definition.name(),
            expected: definition.value_type_name(),
            found: core::any::type_name::<T>(),
        });
    }
    Ok(definition)
}

fn typed_slot_or_insert<T: Bindable>(
    slots: &mut Slots,
    property: Property<T>,
) -> Option<&mut ValueSlot<T>> {
    let id = property.id();
    let index = match slots.binary_search_by_key(&id, |(pid, _)| *pid) {
        Ok(index) => index,
        Err(index) => {
            let slot: Box<dyn ErasedSlot> = Box::new(ValueSlot::<T>::new());
            slots.insert(index, (id, slot));
            index
        }
    };
    let slot = slots[index].1.as_any_mut().downcast_mut();
    if slot.is_none() {
        tracing::debug!(
            ?id,
            ty = core::any::type_name::<T>(),
            "ignored write through mistyped handle"
        );
    }
    slot
}

/// What an erased slot needs to digest itself.
struct SlotEnv<'a> {
    registry: &'a PropertyRegistry,
    owner: ObjectId,
    owner_type: TypeKey,
    property: PropertyId,
    data_source: Option<&'a ErasedValue>,
    parent: Option<ObjectId>,
    parents: Option<&'a dyn StoreLookup>,
    elapsed: Duration,
}

/// Type-erased slot for heterogeneous storage.
trait ErasedSlot: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn flags(&self) -> SlotFlags;
    fn invalidate(&mut self);
    fn invalidate_display_cache(&mut self);
    fn clear_animated(&mut self) -> bool;
    fn clear_pending(&mut self);
    /// Returns the metadata flags if the effective value changed.
    fn digest(&mut self, env: &SlotEnv<'_>) -> Option<MetadataFlags>;
}

impl<T: Bindable> ErasedSlot for ValueSlot<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn flags(&self) -> SlotFlags {
        Self::flags(self)
    }

    fn invalidate(&mut self) {
        Self::invalidate(self);
    }

    fn invalidate_display_cache(&mut self) {
        Self::invalidate_display_cache(self);
    }

    fn clear_animated(&mut self) -> bool {
        Self::clear_animated(self)
    }

    fn clear_pending(&mut self) {
        Self::clear_pending(self);
    }

    fn digest(&mut self, env: &SlotEnv<'_>) -> Option<MetadataFlags> {
        let property = Property::<T>::from_id(env.property);
        let metadata = env.registry.metadata_for(property, env.owner_type)?;
        let inherits = metadata.inherits();
        if !self.requires_digest(inherits) {
            return None;
        }
        let inherited = match env.parents {
            Some(parents) if inherits && !self.has_own_source() => {
                walk_inherited(env.parent, property, parents)
            }
            _ => None,
        };
        let changed = Self::digest(
            self,
            SlotContext {
                owner: env.owner,
                property: env.property,
                metadata,
                data_source: env.data_source,
                inherited,
                elapsed: env.elapsed,
            },
        );
        changed.then(|| metadata.flags())
    }
}
