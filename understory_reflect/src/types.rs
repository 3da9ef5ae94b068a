// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime type descriptors.
//!
//! A [`TypeDescriptor`] publishes the members a binding may reach on a data
//! source type: readable and writable properties, and methods an event
//! binding may invoke. Descriptors are collected in a [`TypeRegistry`].
//!
//! Two storage kinds exist. Reference types are held as [`Shared<T>`], so a
//! write through any handle reaches the one underlying object. Value types are
//! held by value inside an [`ErasedValue`]; reading a member of a value type
//! works, but writing through one would only touch a copy.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::key::TypeKey;
use crate::value::{Bindable, ErasedValue, Shared};

/// Reads a member from the borrowed parent object.
pub type MemberGetter = Arc<dyn Fn(&dyn Any) -> Option<ErasedValue> + Send + Sync>;

/// Writes a member on the borrowed parent object, returning `false` on a type mismatch.
pub type MemberSetter = Arc<dyn Fn(&mut dyn Any, ErasedValue) -> bool + Send + Sync>;

/// Invokes a method on the borrowed target object with an erased argument tuple.
pub type MethodInvoker = Arc<dyn Fn(&mut dyn Any, &ErasedValue) -> bool + Send + Sync>;

type ReadFn = fn(&ErasedValue, &mut dyn FnMut(&dyn Any)) -> bool;
type WriteFn = fn(&mut ErasedValue, &mut dyn FnMut(&mut dyn Any)) -> bool;

/// How instances of a described type are stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Held by value; writes through an instance do not reach the original.
    Value,
    /// Held as [`Shared<T>`]; all handles observe the same object.
    Reference,
}

/// A readable, possibly writable, property of a described type.
#[derive(Clone)]
pub struct PropertyMember {
    name: &'static str,
    value_type: TypeId,
    value_type_name: &'static str,
    getter: MemberGetter,
    setter: Option<MemberSetter>,
}

impl PropertyMember {
    /// Returns the member name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the [`TypeId`] of the values this member produces.
    ///
    /// For reference-typed members this is the id of `Shared<C>`.
    #[must_use]
    #[inline]
    pub fn value_type(&self) -> TypeId {
        self.value_type
    }

    /// Returns the Rust type name of the values this member produces.
    #[must_use]
    #[inline]
    pub fn value_type_name(&self) -> &'static str {
        self.value_type_name
    }

    /// Returns `true` if the member can be written.
    #[must_use]
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Returns the member's getter.
    #[must_use]
    pub fn getter(&self) -> &MemberGetter {
        &self.getter
    }

    /// Returns the member's setter, if any.
    #[must_use]
    pub fn setter(&self) -> Option<&MemberSetter> {
        self.setter.as_ref()
    }
}

impl fmt::Debug for PropertyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMember")
            .field("name", &self.name)
            .field("value_type", &self.value_type_name)
            .field("writable", &self.is_writable())
            .finish_non_exhaustive()
    }
}

/// An invocable method of a described type.
#[derive(Clone)]
pub struct MethodMember {
    name: &'static str,
    arguments_type: TypeId,
    parameters: SmallVec<[(TypeId, &'static str); 4]>,
    invoker: MethodInvoker,
}

impl MethodMember {
    /// Returns the method name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the [`TypeId`] of the argument tuple the method accepts.
    #[must_use]
    #[inline]
    pub fn arguments_type(&self) -> TypeId {
        self.arguments_type
    }

    /// Returns the parameter types in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.parameters.iter().map(|(id, _)| *id)
    }

    /// Returns a human-readable signature such as `(i32, String)`.
    #[must_use]
    pub fn signature(&self) -> String {
        let names: Vec<_> = self.parameters.iter().map(|(_, name)| *name).collect();
        format!("({})", names.join(", "))
    }

    /// Returns the method's invoker.
    #[must_use]
    pub fn invoker(&self) -> &MethodInvoker {
        &self.invoker
    }
}

impl fmt::Debug for MethodMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMember")
            .field("name", &self.name)
            .field("signature", &self.signature())
            .finish_non_exhaustive()
    }
}

/// Argument tuples accepted by methods and raised by event bindings.
pub trait ArgList: Bindable {
    /// Appends the parameter types of this tuple, in order.
    fn parameter_types(out: &mut SmallVec<[(TypeId, &'static str); 4]>);
}

impl ArgList for () {
    fn parameter_types(_: &mut SmallVec<[(TypeId, &'static str); 4]>) {}
}

macro_rules! impl_arg_list {
    ($($name:ident),+) => {
        impl<$($name: Bindable),+> ArgList for ($($name,)+) {
            fn parameter_types(out: &mut SmallVec<[(TypeId, &'static str); 4]>) {
                $(out.push((TypeId::of::<$name>(), core::any::type_name::<$name>()));)+
            }
        }
    };
}

impl_arg_list!(A);
impl_arg_list!(A, B);
impl_arg_list!(A, B, C);
impl_arg_list!(A, B, C, D);

/// The published shape of a data source type.
pub struct TypeDescriptor {
    key: TypeKey,
    kind: TypeKind,
    storage_type: TypeId,
    properties: Vec<PropertyMember>,
    methods: Vec<MethodMember>,
    read: ReadFn,
    write: WriteFn,
}

impl TypeDescriptor {
    /// Starts describing a reference type, stored as [`Shared<T>`].
    #[must_use]
    pub fn reference<T: Send + Sync + 'static>(name: &'static str) -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder::new(
            TypeKey::new::<T>(name),
            TypeKind::Reference,
            TypeId::of::<Shared<T>>(),
            read_reference::<T>,
            write_reference::<T>,
        )
    }

    /// Starts describing a value type, stored directly.
    #[must_use]
    pub fn value<T: Bindable>(name: &'static str) -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder::new(
            TypeKey::new::<T>(name),
            TypeKind::Value,
            TypeId::of::<T>(),
            read_value::<T>,
            write_value::<T>,
        )
    }

    /// Returns the described type's key.
    #[must_use]
    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Returns the declared type name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    /// Returns the storage kind.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Returns the [`TypeId`] of the erased representation (`Shared<T>` or `T`).
    #[must_use]
    #[inline]
    pub fn storage_type(&self) -> TypeId {
        self.storage_type
    }

    /// Looks up a property member by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyMember> {
        self.properties.iter().find(|member| member.name == name)
    }

    /// Looks up a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodMember> {
        self.methods.iter().find(|member| member.name == name)
    }

    /// Returns every method with the given name.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodMember> {
        self.methods.iter().filter(move |member| member.name == name)
    }

    /// Returns all property members.
    #[must_use]
    pub fn properties(&self) -> &[PropertyMember] {
        &self.properties
    }

    /// Reads `member` from `object`.
    ///
    /// Returns `None` when `object` is not an instance of this type or the
    /// member value is null.
    #[must_use]
    pub fn read_member(&self, object: &ErasedValue, member: &PropertyMember) -> Option<ErasedValue> {
        let mut out = None;
        (self.read)(object, &mut |target| out = (member.getter)(target));
        out
    }

    /// Writes `value` to `member` on `object`, returning `true` if the write landed.
    ///
    /// On a value type this mutates the erased copy only.
    pub fn write_member(
        &self,
        object: &mut ErasedValue,
        member: &PropertyMember,
        value: ErasedValue,
    ) -> bool {
        let Some(setter) = &member.setter else {
            return false;
        };
        let mut value = Some(value);
        let mut written = false;
        (self.write)(object, &mut |target| {
            if let Some(value) = value.take() {
                written = setter(target, value);
            }
        });
        written
    }

    /// Invokes `method` on `object` with an erased argument tuple.
    pub fn invoke_method(
        &self,
        object: &mut ErasedValue,
        method: &MethodMember,
        arguments: &ErasedValue,
    ) -> bool {
        let mut invoked = false;
        (self.write)(object, &mut |target| {
            invoked = (method.invoker)(target, arguments);
        });
        invoked
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("properties", &self.properties)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

fn read_reference<T: Send + Sync + 'static>(
    object: &ErasedValue,
    f: &mut dyn FnMut(&dyn Any),
) -> bool {
    let Some(shared) = object.downcast_ref::<Shared<T>>() else {
        return false;
    };
    f(&*shared.read());
    true
}

fn write_reference<T: Send + Sync + 'static>(
    object: &mut ErasedValue,
    f: &mut dyn FnMut(&mut dyn Any),
) -> bool {
    let Some(shared) = object.downcast_ref::<Shared<T>>() else {
        return false;
    };
    f(&mut *shared.write());
    true
}

fn read_value<T: Bindable>(object: &ErasedValue, f: &mut dyn FnMut(&dyn Any)) -> bool {
    let Some(value) = object.downcast_ref::<T>() else {
        return false;
    };
    f(value);
    true
}

fn write_value<T: Bindable>(object: &mut ErasedValue, f: &mut dyn FnMut(&mut dyn Any)) -> bool {
    let Some(value) = object.downcast_mut::<T>() else {
        return false;
    };
    f(value);
    true
}

/// Builder for [`TypeDescriptor`]. See [`TypeDescriptor::reference`] and
/// [`TypeDescriptor::value`].
///
/// # Example
///
/// ```rust
/// use understory_reflect::{ErasedValue, Shared, TypeDescriptor};
///
/// struct Person {
///     name: String,
/// }
///
/// let descriptor = TypeDescriptor::reference::<Person>("Person")
///     .writable_property("Name", |p: &Person| p.name.clone(), |p, v| p.name = v)
///     .build();
///
/// let ada = Shared::new(Person { name: "Ada".into() });
/// let mut object = ada.to_erased();
/// let name = descriptor.property("Name").unwrap();
///
/// assert_eq!(
///     descriptor.read_member(&object, name),
///     Some(ErasedValue::new(String::from("Ada")))
/// );
/// assert!(descriptor.write_member(&mut object, name, ErasedValue::new(String::from("Grace"))));
/// assert_eq!(ada.read().name, "Grace");
/// ```
pub struct TypeDescriptorBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: core::marker::PhantomData<fn(T)>,
}

impl<T: 'static> TypeDescriptorBuilder<T> {
    fn new(key: TypeKey, kind: TypeKind, storage_type: TypeId, read: ReadFn, write: WriteFn) -> Self {
        Self {
            descriptor: TypeDescriptor {
                key,
                kind,
                storage_type,
                properties: Vec::new(),
                methods: Vec::new(),
                read,
                write,
            },
            _marker: core::marker::PhantomData,
        }
    }

    /// Replaces the key, for types that declare a base through [`Typed`](crate::Typed).
    #[must_use]
    pub fn with_key(mut self, key: TypeKey) -> Self {
        self.descriptor.key = key;
        self
    }

    /// Adds a read-only property.
    #[must_use]
    pub fn property<V, G>(self, name: &'static str, get: G) -> Self
    where
        V: Bindable,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push_property::<V>(name, getter(move |target: &T| Some(ErasedValue::new(get(target)))), None)
    }

    /// Adds a readable and writable property.
    #[must_use]
    pub fn writable_property<V, G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        V: Bindable,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let setter: MemberSetter = Arc::new(move |target: &mut dyn Any, value: ErasedValue| {
            let (Some(target), Ok(value)) = (target.downcast_mut::<T>(), value.downcast::<V>())
            else {
                return false;
            };
            set(target, value);
            true
        });
        self.push_property::<V>(
            name,
            getter(move |target: &T| Some(ErasedValue::new(get(target)))),
            Some(setter),
        )
    }

    /// Adds a nullable read-only reference to another described reference type.
    #[must_use]
    pub fn reference<C, G>(self, name: &'static str, get: G) -> Self
    where
        C: Send + Sync + 'static,
        G: Fn(&T) -> Option<Shared<C>> + Send + Sync + 'static,
    {
        self.push_property::<Shared<C>>(
            name,
            getter(move |target: &T| get(target).map(ErasedValue::new)),
            None,
        )
    }

    /// Adds a nullable reference that can be reassigned.
    #[must_use]
    pub fn writable_reference<C, G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        C: Send + Sync + 'static,
        G: Fn(&T) -> Option<Shared<C>> + Send + Sync + 'static,
        S: Fn(&mut T, Shared<C>) + Send + Sync + 'static,
    {
        let setter: MemberSetter = Arc::new(move |target: &mut dyn Any, value: ErasedValue| {
            let (Some(target), Ok(value)) =
                (target.downcast_mut::<T>(), value.downcast::<Shared<C>>())
            else {
                return false;
            };
            set(target, value);
            true
        });
        self.push_property::<Shared<C>>(
            name,
            getter(move |target: &T| get(target).map(ErasedValue::new)),
            Some(setter),
        )
    }

    /// Adds a method taking the argument tuple `A`.
    #[must_use]
    pub fn method<A, F>(mut self, name: &'static str, f: F) -> Self
    where
        A: ArgList,
        F: Fn(&mut T, A) + Send + Sync + 'static,
    {
        let mut parameters = SmallVec::new();
        A::parameter_types(&mut parameters);
        let invoker: MethodInvoker = Arc::new(move |target: &mut dyn Any, args: &ErasedValue| {
            let (Some(target), Some(args)) = (target.downcast_mut::<T>(), args.downcast_ref::<A>())
            else {
                return false;
            };
            f(target, args.clone());
            true
        });
        self.descriptor.methods.push(MethodMember {
            name,
            arguments_type: TypeId::of::<A>(),
            parameters,
            invoker,
        });
        self
    }

    /// Finishes the descriptor.
    #[must_use]
    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }

    fn push_property<V: 'static>(
        mut self,
        name: &'static str,
        getter: MemberGetter,
        setter: Option<MemberSetter>,
    ) -> Self {
        self.descriptor.properties.push(PropertyMember {
            name,
            value_type: TypeId::of::<V>(),
            value_type_name: core::any::type_name::<V>(),
            getter,
            setter,
        });
        self
    }
}

impl<T> fmt::Debug for TypeDescriptorBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeDescriptorBuilder")
            .field(&self.descriptor)
            .finish()
    }
}

fn getter<T: 'static>(
    get: impl Fn(&T) -> Option<ErasedValue> + Send + Sync + 'static,
) -> MemberGetter {
    Arc::new(move |target: &dyn Any| target.downcast_ref::<T>().and_then(&get))
}

/// Errors from [`TypeRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeRegistrationError {
    /// The type already has a descriptor.
    #[error("type '{name}' is already registered")]
    DuplicateType {
        /// Declared name of the type.
        name: &'static str,
    },
}

/// A collection of [`TypeDescriptor`]s.
///
/// Descriptors are found either by the described type's id or by the id of
/// its erased storage (`Shared<T>` for reference types).
#[derive(Default)]
pub struct TypeRegistry {
    descriptors: HashMap<TypeId, Arc<TypeDescriptor>>,
    count: usize,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<(), TypeRegistrationError> {
        let id = descriptor.key.id();
        if self.descriptors.contains_key(&id) {
            return Err(TypeRegistrationError::DuplicateType {
                name: descriptor.name(),
            });
        }
        tracing::trace!(name = descriptor.name(), kind = ?descriptor.kind, "registered type");
        let storage = descriptor.storage_type;
        let descriptor = Arc::new(descriptor);
        if storage != id {
            self.descriptors.insert(storage, Arc::clone(&descriptor));
        }
        self.descriptors.insert(id, descriptor);
        self.count += 1;
        Ok(())
    }

    /// Returns the descriptor for a described type or its storage type.
    #[must_use]
    pub fn get(&self, type_id: TypeId) -> Option<&Arc<TypeDescriptor>> {
        self.descriptors.get(&type_id)
    }

    /// Returns the number of described types.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no types are described.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person {
        name: String,
        age: u32,
        friend: Option<Shared<Person>>,
        clicks: Vec<(i32, String)>,
    }

    impl Person {
        fn new(name: &str) -> Self {
            Self {
                name: name.into(),
                age: 0,
                friend: None,
                clicks: Vec::new(),
            }
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Point {
        x: f64,
        y: f64,
    }

    fn person() -> TypeDescriptor {
        TypeDescriptor::reference::<Person>("Person")
            .writable_property("Name", |p: &Person| p.name.clone(), |p, v| p.name = v)
            .property("Age", |p: &Person| p.age)
            .writable_reference("Friend", |p: &Person| p.friend.clone(), |p, v| {
                p.friend = Some(v);
            })
            .method("Clicked", |p: &mut Person, (x, label): (i32, String)| {
                p.clicks.push((x, label));
            })
            .build()
    }

    #[test]
    fn read_and_write_reference_members() {
        let descriptor = person();
        let ada = Shared::new(Person::new("Ada"));
        let mut object = ada.to_erased();

        let age = descriptor.property("Age").unwrap();
        assert!(!age.is_writable());
        assert_eq!(
            descriptor.read_member(&object, age),
            Some(ErasedValue::new(0_u32))
        );
        assert!(!descriptor.write_member(&mut object, age, ErasedValue::new(3_u32)));

        let name = descriptor.property("Name").unwrap();
        assert!(descriptor.write_member(&mut object, name, ErasedValue::new(String::from("Grace"))));
        assert_eq!(ada.read().name, "Grace");
    }

    #[test]
    fn null_reference_member_reads_as_none() {
        let descriptor = person();
        let object = Shared::new(Person::new("Ada")).to_erased();
        let friend = descriptor.property("Friend").unwrap();
        assert_eq!(friend.value_type(), TypeId::of::<Shared<Person>>());
        assert_eq!(descriptor.read_member(&object, friend), None);
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let descriptor = person();
        let mut object = Shared::new(Person::new("Ada")).to_erased();
        let name = descriptor.property("Name").unwrap();
        assert!(!descriptor.write_member(&mut object, name, ErasedValue::new(5_i32)));
        let mut not_a_person = ErasedValue::new(5_i32);
        assert!(!descriptor.write_member(
            &mut not_a_person,
            name,
            ErasedValue::new(String::new())
        ));
    }

    #[test]
    fn methods_carry_their_signature() {
        let descriptor = person();
        let ada = Shared::new(Person::new("Ada"));
        let mut object = ada.to_erased();
        let clicked = descriptor.method("Clicked").unwrap();

        assert_eq!(clicked.arguments_type(), TypeId::of::<(i32, String)>());
        assert_eq!(
            clicked.parameters().collect::<Vec<_>>(),
            [TypeId::of::<i32>(), TypeId::of::<String>()]
        );
        assert!(descriptor.invoke_method(
            &mut object,
            clicked,
            &ErasedValue::new((4_i32, String::from("ok")))
        ));
        assert!(!descriptor.invoke_method(&mut object, clicked, &ErasedValue::new((4_i32,))));
        assert_eq!(ada.read().clicks, [(4, String::from("ok"))]);
    }

    #[test]
    fn value_types_write_to_the_copy_only() {
        let descriptor = TypeDescriptor::value::<Point>("Point")
            .writable_property("X", |p: &Point| p.x, |p, v| p.x = v)
            .property("Y", |p: &Point| p.y)
            .build();
        assert_eq!(descriptor.kind(), TypeKind::Value);

        let original = Point { x: 1.0, y: 2.0 };
        let mut copy = ErasedValue::new(original.clone());
        let x = descriptor.property("X").unwrap();
        assert!(descriptor.write_member(&mut copy, x, ErasedValue::new(9.0_f64)));
        assert_eq!(copy.downcast_ref::<Point>().map(|p| p.x), Some(9.0));
        assert_eq!(original.x, 1.0);
    }

    #[test]
    fn registry_finds_by_type_and_storage() {
        let mut registry = TypeRegistry::new();
        registry.register(person()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(TypeId::of::<Person>()).is_some());
        assert!(registry.get(TypeId::of::<Shared<Person>>()).is_some());
        assert!(registry.get(TypeId::of::<Point>()).is_none());

        let err = registry.register(person()).unwrap_err();
        assert_eq!(err, TypeRegistrationError::DuplicateType { name: "Person" });
        assert_eq!(err.to_string(), "type 'Person' is already registered");
    }

    #[test]
    fn signature_and_debug() {
        let descriptor = person();
        assert_eq!(
            descriptor.method("Clicked").unwrap().signature(),
            "(i32, alloc::string::String)"
        );
        let debug = format!("{descriptor:?}");
        assert!(debug.contains("Person"));
        assert!(debug.contains("Name"));
    }
}
