// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The cached front end over an [`AccessorCompiler`].

use core::any::TypeId;
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use understory_property::BoundValue;
use understory_reflect::{ArgList, Bindable, TypeRegistry, ValueConverter};

use crate::accessor::{self, Accessor, AccessorCompiler, Arguments, Invoker, Strategy};
use crate::bound::{ConvertingBoundValue, EventBinding, NonConvertingBoundValue};
use crate::error::BindingError;
use crate::expression::BindingExpression;

/// Accessors by `(bound type, data source type)`, then by expression text.
type AccessorCache = HashMap<(TypeId, TypeId), HashMap<Box<str>, Accessor>>;

/// Invokers by `(argument tuple type, data source type)`, then by expression text.
type InvokerCache = HashMap<(TypeId, TypeId), HashMap<Box<str>, Invoker>>;

/// Compiles binding expressions into accessors and caches the results.
///
/// Compiling the same expression for the same bound and data source types
/// returns the cached accessor, so every property bound to `"Item.Name"` on
/// a `Row` shares one compiled closure chain. Failed compilations are not
/// cached.
///
/// ```rust
/// use core::any::TypeId;
/// use std::sync::Arc;
/// use understory_binding::BindingCompiler;
/// use understory_reflect::{Shared, TypeDescriptor, TypeRegistry};
///
/// struct Person {
///     name: String,
/// }
///
/// let mut types = TypeRegistry::new();
/// types
///     .register(
///         TypeDescriptor::reference::<Person>("Person")
///             .writable_property("Name", |p: &Person| p.name.clone(), |p, v| p.name = v)
///             .build(),
///     )
///     .unwrap();
///
/// let compiler = BindingCompiler::new(Arc::new(types));
/// let accessor = compiler
///     .accessor(TypeId::of::<String>(), TypeId::of::<Person>(), "Name")
///     .unwrap();
///
/// let person = Shared::new(Person { name: "Ada".into() });
/// let value = accessor.get(Some(&person.to_erased())).unwrap();
/// assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("Ada"));
/// assert_eq!(compiler.cached_accessors(), 1);
/// ```
pub struct BindingCompiler {
    types: Arc<TypeRegistry>,
    converter: Arc<ValueConverter>,
    compiler: Box<dyn AccessorCompiler>,
    accessors: Mutex<AccessorCache>,
    invokers: Mutex<InvokerCache>,
}

impl BindingCompiler {
    /// Creates a compiler using the default [`Strategy`] and the default
    /// [`ValueConverter`].
    #[must_use]
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self::with_strategy(types, Strategy::default())
    }

    /// Creates a compiler using `strategy`.
    #[must_use]
    pub fn with_strategy(types: Arc<TypeRegistry>, strategy: Strategy) -> Self {
        Self::with_compiler(types, strategy.compiler())
    }

    /// Creates a compiler around a custom [`AccessorCompiler`].
    #[must_use]
    pub fn with_compiler(types: Arc<TypeRegistry>, compiler: Box<dyn AccessorCompiler>) -> Self {
        Self {
            types,
            converter: Arc::new(ValueConverter::default()),
            compiler,
            accessors: Mutex::new(HashMap::new()),
            invokers: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the converter handed to converting bound values.
    #[must_use]
    pub fn with_converter(mut self, converter: Arc<ValueConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Returns the type registry expressions resolve against.
    #[must_use]
    #[inline]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Returns the converter used by converting bound values.
    #[must_use]
    #[inline]
    pub fn value_converter(&self) -> &Arc<ValueConverter> {
        &self.converter
    }

    /// Returns the accessor compiler in use.
    #[must_use]
    #[inline]
    pub fn compiler(&self) -> &dyn AccessorCompiler {
        &*self.compiler
    }

    /// Returns the accessor for `text` on data sources of type `source`,
    /// compiling it on first use.
    ///
    /// `bound` is the type of the property the accessor will feed. It only
    /// partitions the cache.
    ///
    /// # Errors
    ///
    /// Fails with [`BindingError::InvalidExpression`] if `text` does not
    /// parse, and [`BindingError::UnresolvableBindingExpression`] if it does
    /// not resolve against `source`.
    pub fn accessor(&self, bound: TypeId, source: TypeId, text: &str) -> Result<Accessor, BindingError> {
        if let Some(accessor) = self
            .accessors
            .lock()
            .get(&(bound, source))
            .and_then(|by_text| by_text.get(text))
        {
            return Ok(accessor.clone());
        }
        tracing::debug!(expression = text, strategy = ?self.compiler.strategy(), "compiling accessor");
        let expression = parse(text)?;
        let accessor = self
            .compiler
            .compile_accessor(&self.types, source, expression)?;
        Ok(self
            .accessors
            .lock()
            .entry((bound, source))
            .or_default()
            .entry(text.into())
            .or_insert(accessor)
            .clone())
    }

    /// Returns the invoker for the method `text` names, compiling it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Fails with [`BindingError::InvalidExpression`] if `text` does not
    /// parse, [`BindingError::UnresolvableBindingExpression`] if the path
    /// before the method does not resolve, and
    /// [`BindingError::CannotResolveBindingExpression`] if no method of that
    /// name takes `arguments`.
    pub fn invoker(&self, arguments: Arguments, source: TypeId, text: &str) -> Result<Invoker, BindingError> {
        let key = (arguments.type_id, source);
        if let Some(invoker) = self
            .invokers
            .lock()
            .get(&key)
            .and_then(|by_text| by_text.get(text))
        {
            return Ok(invoker.clone());
        }
        tracing::debug!(expression = text, arguments = arguments.type_name, "compiling invoker");
        let expression = parse(text)?;
        let invoker = self
            .compiler
            .compile_invoker(&self.types, source, expression, arguments)?;
        Ok(self
            .invokers
            .lock()
            .entry(key)
            .or_default()
            .entry(text.into())
            .or_insert(invoker)
            .clone())
    }

    /// Compiles a bound value for a property of type `T`.
    ///
    /// The value passes through untouched when the member type is `T`;
    /// otherwise it is converted with the expression's format segment.
    ///
    /// # Errors
    ///
    /// As for [`BindingCompiler::accessor`].
    pub fn bound_value<T: Bindable + Default>(
        &self,
        source: TypeId,
        text: &str,
        coerce_object_to_string: bool,
    ) -> Result<Box<dyn BoundValue<T>>, BindingError> {
        let accessor = self.accessor(TypeId::of::<T>(), source, text)?;
        if accessor.member_type() == TypeId::of::<T>() {
            return Ok(Box::new(NonConvertingBoundValue::new(accessor)));
        }
        Ok(Box::new(ConvertingBoundValue::new(
            accessor,
            Arc::clone(&self.converter),
            coerce_object_to_string,
        )))
    }

    /// Compiles an event binding for handlers taking the argument tuple `A`.
    ///
    /// # Errors
    ///
    /// As for [`BindingCompiler::invoker`].
    pub fn event<A: ArgList>(&self, source: TypeId, text: &str) -> Result<EventBinding<A>, BindingError> {
        self.invoker(Arguments::of::<A>(), source, text)
            .map(EventBinding::new)
    }

    /// Checks that `text` names a property or method on `source`, without
    /// compiling or caching anything.
    ///
    /// # Errors
    ///
    /// As for [`BindingCompiler::accessor`].
    pub fn validate(&self, source: TypeId, text: &str) -> Result<(), BindingError> {
        let expression = parse(text)?;
        accessor::validate(&self.types, source, &expression)
    }

    /// Returns the number of cached accessors.
    #[must_use]
    pub fn cached_accessors(&self) -> usize {
        self.accessors.lock().values().map(HashMap::len).sum()
    }

    /// Returns the number of cached invokers.
    #[must_use]
    pub fn cached_invokers(&self) -> usize {
        self.invokers.lock().values().map(HashMap::len).sum()
    }

    /// Drops every cached accessor and invoker.
    pub fn clear_cache(&self) {
        self.accessors.lock().clear();
        self.invokers.lock().clear();
    }
}

impl fmt::Debug for BindingCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCompiler")
            .field("strategy", &self.compiler.strategy())
            .field("types", &self.types)
            .field("cached_accessors", &self.cached_accessors())
            .field("cached_invokers", &self.cached_invokers())
            .finish_non_exhaustive()
    }
}

fn parse(text: &str) -> Result<Arc<BindingExpression>, BindingError> {
    BindingExpression::parse(text)
        .map(Arc::new)
        .map_err(|source| BindingError::InvalidExpression {
            text: text.to_owned(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_reflect::{Shared, TypeDescriptor};

    struct Item {
        count: i32,
    }

    fn compiler(strategy: Strategy) -> BindingCompiler {
        let mut types = TypeRegistry::new();
        types
            .register(
                TypeDescriptor::reference::<Item>("Item")
                    .writable_property("Count", |i: &Item| i.count, |i, v| i.count = v)
                    .method("Reset", |i: &mut Item, (): ()| i.count = 0)
                    .build(),
            )
            .unwrap();
        BindingCompiler::with_strategy(Arc::new(types), strategy)
    }

    #[test]
    fn same_triple_reuses_the_accessor() {
        let compiler = compiler(Strategy::Compiled);
        let source = TypeId::of::<Item>();
        let a = compiler.accessor(TypeId::of::<i32>(), source, "Count").unwrap();
        let b = compiler.accessor(TypeId::of::<i32>(), source, "Count").unwrap();
        assert!(a.ptr_eq(&b), "second lookup should hit the cache");
        let c = compiler.accessor(TypeId::of::<String>(), source, "Count").unwrap();
        assert!(!a.ptr_eq(&c), "bound type partitions the cache");
        assert_eq!(compiler.cached_accessors(), 2);

        compiler.clear_cache();
        assert_eq!(compiler.cached_accessors(), 0);
    }

    #[test]
    fn failures_are_not_cached() {
        let compiler = compiler(Strategy::Reflection);
        let err = compiler
            .accessor(TypeId::of::<i32>(), TypeId::of::<Item>(), "Missing")
            .unwrap_err();
        assert_eq!(err.text(), Some("Missing"));
        assert!(
            matches!(
                compiler.accessor(TypeId::of::<i32>(), TypeId::of::<Item>(), "Count."),
                Err(BindingError::InvalidExpression { .. })
            ),
            "a trailing dot is a parse error"
        );
        assert_eq!(compiler.cached_accessors(), 0);
    }

    #[test]
    fn validate_accepts_methods_and_properties() {
        let compiler = compiler(Strategy::Compiled);
        let source = TypeId::of::<Item>();
        assert_eq!(compiler.validate(source, "Count"), Ok(()));
        assert_eq!(compiler.validate(source, "Reset"), Ok(()));
        assert!(compiler.validate(source, "Nope").is_err(), "unknown member");
        assert_eq!(compiler.cached_accessors(), 0);
    }

    #[test]
    fn events_are_cached_separately() {
        let compiler = compiler(Strategy::Compiled);
        let event = compiler.event::<()>(TypeId::of::<Item>(), "Reset").unwrap();
        let item = Shared::new(Item { count: 4 });
        assert!(event.invoke(Some(&item.to_erased()), ()), "reset should run");
        assert_eq!(item.read().count, 0);
        assert_eq!(compiler.cached_invokers(), 1);
        assert_eq!(compiler.cached_accessors(), 0);
    }
}
