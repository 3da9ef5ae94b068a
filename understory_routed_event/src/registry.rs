// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Routed event registry.
//!
//! Events are registered on owner types the same way properties are: names
//! and styling names are unique within one owner's domain, and lookups from
//! a derived type walk its ancestors, nearest first. Class handlers are
//! registered once per type and run, for an instance, in order of the
//! declaring type's distance from the instance type, then registration
//! order.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use understory_property::{ObjectId, default_styling_name};
use understory_reflect::TypeKey;

use crate::args::{RoutedEventArgs, RoutingStrategy};
use crate::error::EventRegistrationError;
use crate::id::{RoutedEvent, RoutedEventId};

/// A class handler for events carrying `A`.
pub type ClassHandlerFn<A> = Arc<dyn Fn(ObjectId, &mut RoutedEventArgs<A>) + Send + Sync>;

/// A registered routed event.
#[derive(Clone)]
pub struct RoutedEventDefinition {
    id: RoutedEventId,
    name: &'static str,
    styling_name: String,
    routing: RoutingStrategy,
    args_type: TypeId,
    args_type_name: &'static str,
    owner: TypeKey,
    owners: SmallVec<[TypeKey; 2]>,
}

impl RoutedEventDefinition {
    /// Returns the event id.
    #[must_use]
    #[inline]
    pub fn id(&self) -> RoutedEventId {
        self.id
    }

    /// Returns the event name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the name stylesheets use for this event.
    #[must_use]
    #[inline]
    pub fn styling_name(&self) -> &str {
        &self.styling_name
    }

    /// Returns how the event travels.
    #[must_use]
    #[inline]
    pub fn routing(&self) -> RoutingStrategy {
        self.routing
    }

    /// Returns the [`TypeId`] of the payload.
    #[must_use]
    #[inline]
    pub fn args_type(&self) -> TypeId {
        self.args_type
    }

    /// Returns the declaring owner type.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Returns owners added with [`RoutedEventRegistry::add_owner`].
    #[must_use]
    #[inline]
    pub fn additional_owners(&self) -> &[TypeKey] {
        &self.owners
    }
}

impl fmt::Debug for RoutedEventDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedEventDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("styling_name", &self.styling_name)
            .field("routing", &self.routing)
            .field("args_type", &self.args_type_name)
            .field("owner", &self.owner)
            .field("owners", &self.owners)
            .finish()
    }
}

/// A class handler as it applies to one instance type.
#[derive(Clone)]
pub struct ClassHandler {
    declaring_type: TypeKey,
    distance: usize,
    sequence: u64,
    handled_events_too: bool,
    handler: Arc<dyn Any + Send + Sync>,
}

impl ClassHandler {
    /// Returns the type the handler was registered for.
    #[must_use]
    #[inline]
    pub fn declaring_type(&self) -> TypeKey {
        self.declaring_type
    }

    /// Returns the number of base-type steps from the instance type to the
    /// declaring type.
    #[must_use]
    #[inline]
    pub fn distance(&self) -> usize {
        self.distance
    }

    /// Returns the registry-wide registration sequence number.
    #[must_use]
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns `true` if the handler runs for events already marked handled.
    #[must_use]
    #[inline]
    pub fn handles_handled_events(&self) -> bool {
        self.handled_events_too
    }
}

impl fmt::Debug for ClassHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHandler")
            .field("declaring_type", &self.declaring_type)
            .field("distance", &self.distance)
            .field("sequence", &self.sequence)
            .field("handled_events_too", &self.handled_events_too)
            .finish_non_exhaustive()
    }
}

struct RegisteredHandler {
    declaring_type: TypeKey,
    sequence: u64,
    handled_events_too: bool,
    handler: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct OwnerDomain {
    by_name: HashMap<&'static str, RoutedEventId>,
    by_styling_name: HashMap<String, RoutedEventId>,
}

/// Name tables flattened over a type and its ancestors.
#[derive(Default)]
struct FlatLookup {
    by_name: HashMap<&'static str, RoutedEventId>,
    by_styling_name: HashMap<String, RoutedEventId>,
}

/// Registry of routed events and their class handlers.
///
/// ```rust
/// use understory_property::ObjectId;
/// use understory_routed_event::{RoutedEventArgs, RoutedEventRegistry, RoutingStrategy};
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
/// let mut registry = RoutedEventRegistry::new();
/// let click = registry
///     .register::<u32>(Control::type_key(), "Click", RoutingStrategy::Bubble)
///     .unwrap();
/// assert_eq!(registry.find_by_styling_name("click", Button::type_key()), Some(click.id()));
///
/// registry
///     .register_class_handler(Control::type_key(), click, |_, args| args.set_handled(true), false)
///     .unwrap();
///
/// let mut args = RoutedEventArgs::new(click, ObjectId::new(1), 2);
/// assert_eq!(registry.invoke_class_handlers(click, Button::type_key(), ObjectId::new(1), &mut args), 1);
/// assert!(args.is_handled());
/// ```
#[derive(Default)]
pub struct RoutedEventRegistry {
    definitions: Vec<RoutedEventDefinition>,
    domains: HashMap<TypeId, OwnerDomain>,
    handlers: HashMap<RoutedEventId, Vec<RegisteredHandler>>,
    next_sequence: u64,
    lookup_cache: RwLock<HashMap<TypeId, Arc<FlatLookup>>>,
    handler_cache: RwLock<HashMap<(RoutedEventId, TypeId), Arc<[ClassHandler]>>>,
}

impl RoutedEventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event named `name` on `owner`, with payload type `A`.
    ///
    /// The styling name is the kebab-case form of `name`.
    ///
    /// # Errors
    ///
    /// Fails if the name or styling name is taken in the owner's domain, or
    /// if the id space is exhausted.
    pub fn register<A: 'static>(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        routing: RoutingStrategy,
    ) -> Result<RoutedEvent<A>, EventRegistrationError> {
        self.register_styled(owner, name, default_styling_name(name), routing)
    }

    /// Registers an event with an explicit styling name.
    ///
    /// # Errors
    ///
    /// As for [`RoutedEventRegistry::register`].
    pub fn register_styled<A: 'static>(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        styling_name: impl Into<String>,
        routing: RoutingStrategy,
    ) -> Result<RoutedEvent<A>, EventRegistrationError> {
        let styling_name = styling_name.into();
        let Ok(index) = u16::try_from(self.definitions.len()) else {
            return Err(EventRegistrationError::TooManyEvents);
        };
        if index == u16::MAX {
            return Err(EventRegistrationError::TooManyEvents);
        }
        let id = RoutedEventId::new(index);
        self.claim_names(owner, name, &styling_name, id)?;
        tracing::trace!(
            event = name,
            owner = owner.name(),
            styling_name = %styling_name,
            ?routing,
            ?id,
            "registered routed event"
        );
        self.definitions.push(RoutedEventDefinition {
            id,
            name,
            styling_name,
            routing,
            args_type: TypeId::of::<A>(),
            args_type_name: core::any::type_name::<A>(),
            owner,
            owners: SmallVec::new(),
        });
        self.lookup_cache.get_mut().clear();
        Ok(RoutedEvent::from_id(id))
    }

    fn claim_names(
        &mut self,
        owner: TypeKey,
        name: &'static str,
        styling_name: &str,
        id: RoutedEventId,
    ) -> Result<(), EventRegistrationError> {
        let domain = self.domains.entry(owner.id()).or_default();
        if domain.by_name.contains_key(name) {
            return Err(EventRegistrationError::DuplicateRegistration {
                name,
                owner: owner.name(),
            });
        }
        if domain.by_styling_name.contains_key(styling_name) {
            return Err(EventRegistrationError::DuplicateStylingName {
                styling_name: styling_name.to_owned(),
                owner: owner.name(),
            });
        }
        domain.by_name.insert(name, id);
        domain.by_styling_name.insert(styling_name.to_owned(), id);
        Ok(())
    }

    /// Makes `event` visible from `owner`'s domain.
    ///
    /// # Errors
    ///
    /// Fails if the event is unknown or its names collide in `owner`'s
    /// domain.
    pub fn add_owner<A: 'static>(
        &mut self,
        event: RoutedEvent<A>,
        owner: TypeKey,
    ) -> Result<(), EventRegistrationError> {
        let id = event.id();
        let definition = self.typed_definition(event)?;
        let (name, styling_name) = (definition.name, definition.styling_name.clone());
        self.claim_names(owner, name, &styling_name, id)?;
        if let Some(definition) = self.definitions.get_mut(usize::from(id.index())) {
            definition.owners.push(owner);
        }
        tracing::trace!(event = name, owner = owner.name(), "added routed event owner");
        self.lookup_cache.get_mut().clear();
        Ok(())
    }

    /// Registers a class handler for `event` on objects of type `owner` and
    /// its descendants.
    ///
    /// With `handled_events_too` the handler also runs after an earlier
    /// handler marked the event handled.
    ///
    /// # Errors
    ///
    /// Fails if the event is unknown or was registered with another payload
    /// type.
    pub fn register_class_handler<A: 'static>(
        &mut self,
        owner: TypeKey,
        event: RoutedEvent<A>,
        handler: impl Fn(ObjectId, &mut RoutedEventArgs<A>) + Send + Sync + 'static,
        handled_events_too: bool,
    ) -> Result<(), EventRegistrationError> {
        let name = self.typed_definition(event)?.name;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let handler: ClassHandlerFn<A> = Arc::new(handler);
        self.handlers
            .entry(event.id())
            .or_default()
            .push(RegisteredHandler {
                declaring_type: owner,
                sequence,
                handled_events_too,
                handler: Arc::new(handler),
            });
        tracing::trace!(event = name, owner = owner.name(), sequence, "registered class handler");
        self.handler_cache.get_mut().clear();
        Ok(())
    }

    fn typed_definition<A: 'static>(
        &self,
        event: RoutedEvent<A>,
    ) -> Result<&RoutedEventDefinition, EventRegistrationError> {
        let definition = self
            .definition(event.id())
            .ok_or(EventRegistrationError::UnknownEvent { id: event.id() })?;
        if definition.args_type != TypeId::of::<A>() {
            return Err(EventRegistrationError::TypeMismatch {
                name: definition.name,
                expected: definition.args_type_name,
                found: core::any::type_name::<A>(),
            });
        }
        Ok(definition)
    }

    fn flat_lookup(&self, ty: TypeKey) -> Arc<FlatLookup> {
        if let Some(flat) = self.lookup_cache.read().get(&ty.id()) {
            return Arc::clone(flat);
        }
        tracing::debug!(ty = ty.name(), "building routed event lookup");
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

    /// Finds an event by name, walking `owner`'s ancestor chain.
    #[must_use]
    pub fn find_by_name(&self, name: &str, owner: TypeKey) -> Option<RoutedEventId> {
        self.flat_lookup(owner).by_name.get(name).copied()
    }

    /// Finds an event by styling name, walking `owner`'s ancestor chain.
    #[must_use]
    pub fn find_by_styling_name(&self, styling_name: &str, owner: TypeKey) -> Option<RoutedEventId> {
        self.flat_lookup(owner)
            .by_styling_name
            .get(styling_name)
            .copied()
    }

    /// Finds an event by name and checks its payload type.
    #[must_use]
    pub fn find<A: 'static>(&self, name: &str, owner: TypeKey) -> Option<RoutedEvent<A>> {
        let id = self.find_by_name(name, owner)?;
        let definition = self.definition(id)?;
        (definition.args_type == TypeId::of::<A>()).then(|| RoutedEvent::from_id(id))
    }

    /// Returns the registered definition for `id`.
    #[must_use]
    pub fn definition(&self, id: RoutedEventId) -> Option<&RoutedEventDefinition> {
        self.definitions.get(usize::from(id.index()))
    }

    /// Returns the class handlers that apply to instances of
    /// `instance_type`, in the order they run.
    ///
    /// Handlers declared on types outside the instance type's ancestor chain
    /// are left out.
    #[must_use]
    pub fn class_handlers(&self, event: RoutedEventId, instance_type: TypeKey) -> Arc<[ClassHandler]> {
        let key = (event, instance_type.id());
        if let Some(handlers) = self.handler_cache.read().get(&key) {
            return Arc::clone(handlers);
        }
        let mut handlers: Vec<ClassHandler> = self
            .handlers
            .get(&event)
            .into_iter()
            .flatten()
            .filter_map(|registered| {
                let distance = instance_type.distance_to(registered.declaring_type.id())?;
                Some(ClassHandler {
                    declaring_type: registered.declaring_type,
                    distance,
                    sequence: registered.sequence,
                    handled_events_too: registered.handled_events_too,
                    handler: Arc::clone(&registered.handler),
                })
            })
            .collect();
        handlers.sort_by_key(|handler| (handler.distance, handler.sequence));
        tracing::debug!(
            ?event,
            instance_type = instance_type.name(),
            count = handlers.len(),
            "built class handler list"
        );
        let handlers: Arc<[ClassHandler]> = handlers.into();
        self.handler_cache
            .write()
            .insert(key, Arc::clone(&handlers));
        handlers
    }

    /// Runs the class handlers for `event` on an instance of
    /// `instance_type`, returning how many ran.
    ///
    /// Once `args` is marked handled, only handlers registered with
    /// `handled_events_too` still run.
    pub fn invoke_class_handlers<A: 'static>(
        &self,
        event: RoutedEvent<A>,
        instance_type: TypeKey,
        sender: ObjectId,
        args: &mut RoutedEventArgs<A>,
    ) -> usize {
        let mut ran = 0;
        for entry in self.class_handlers(event.id(), instance_type).iter() {
            if args.is_handled() && !entry.handled_events_too {
                continue;
            }
            let Some(handler) = entry.handler.downcast_ref::<ClassHandlerFn<A>>() else {
                tracing::debug!(?event, "class handler payload type mismatch; skipped");
                continue;
            };
            handler(sender, &mut *args);
            ran += 1;
        }
        ran
    }

    /// Returns the number of registered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if no events are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Iterates every registered event in id order.
    pub fn iter(&self) -> impl Iterator<Item = &RoutedEventDefinition> {
        self.definitions.iter()
    }
}

impl fmt::Debug for RoutedEventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedEventRegistry")
            .field("count", &self.definitions.len())
            .field(
                "events",
                &self.definitions.iter().map(|d| d.name).collect::<Vec<_>>(),
            )
            .field("class_handlers", &self.next_sequence)
            .finish_non_exhaustive()
    }
}
