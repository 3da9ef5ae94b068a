// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compiled accessors and the strategies that build them.
//!
//! An [`Accessor`] reads and writes the member a [`BindingExpression`] names,
//! starting from an erased data source. An [`Invoker`] calls the method an
//! event binding names. Both are produced by an [`AccessorCompiler`]; the
//! [`Strategy`] enum selects one of the two built-in compilers.
//!
//! Resolution against the [`TypeRegistry`] happens once, when the accessor is
//! compiled. Unknown members fail then. After that, reads of a null
//! intermediate return `None` and writes that cannot land return `false`;
//! neither path has an error.

use core::any::TypeId;
use core::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use understory_reflect::{
    ErasedValue, MethodMember, PropertyMember, TypeDescriptor, TypeKind, TypeRegistry,
};

use crate::compiled::CompiledAccessors;
use crate::error::BindingError;
use crate::expression::BindingExpression;
use crate::reflection::ReflectionAccessors;

/// Reads the bound member from a data source.
pub type GetFn = Arc<dyn Fn(Option<&ErasedValue>) -> Option<ErasedValue> + Send + Sync>;

/// Writes the bound member on a data source, returning `true` if the write landed.
pub type SetFn = Arc<dyn Fn(Option<&ErasedValue>, ErasedValue) -> bool + Send + Sync>;

/// Invokes the bound method with an erased argument tuple.
pub type InvokeFn = Arc<dyn Fn(Option<&ErasedValue>, &ErasedValue) -> bool + Send + Sync>;

/// How binding expressions are turned into accessors.
///
/// Both strategies resolve the expression once and report the same errors;
/// they differ only in how each access runs. The default is
/// [`Strategy::Compiled`], or [`Strategy::Reflection`] with the `reflection`
/// feature.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Composes the resolved member accessors into one closure chain.
    /// Accesses run with no lookups.
    #[cfg_attr(not(feature = "reflection"), default)]
    Compiled,
    /// Keeps the path as names and walks it through the type registry on
    /// every access, dispatching on the runtime type of each object.
    #[cfg_attr(feature = "reflection", default)]
    Reflection,
}

impl Strategy {
    /// Returns the compiler implementing this strategy.
    #[must_use]
    pub fn compiler(self) -> Box<dyn AccessorCompiler> {
        match self {
            Self::Compiled => Box::new(CompiledAccessors),
            Self::Reflection => Box::new(ReflectionAccessors),
        }
    }
}

/// Builds accessors and invokers for parsed expressions.
pub trait AccessorCompiler: fmt::Debug + Send + Sync {
    /// Returns the strategy this compiler implements.
    fn strategy(&self) -> Strategy;

    /// Compiles a getter and setter for `expression` on data sources of type
    /// `source`.
    ///
    /// # Errors
    ///
    /// Fails with [`BindingError::UnresolvableBindingExpression`] if a type
    /// on the path has no descriptor or a segment names no property.
    fn compile_accessor(
        &self,
        types: &Arc<TypeRegistry>,
        source: TypeId,
        expression: Arc<BindingExpression>,
    ) -> Result<Accessor, BindingError>;

    /// Compiles an invoker for the method `expression` names, which must take
    /// exactly the argument tuple `arguments`.
    ///
    /// # Errors
    ///
    /// Fails with [`BindingError::UnresolvableBindingExpression`] if the
    /// path before the method does not resolve, and with
    /// [`BindingError::CannotResolveBindingExpression`] if no method of that
    /// name takes `arguments`.
    fn compile_invoker(
        &self,
        types: &Arc<TypeRegistry>,
        source: TypeId,
        expression: Arc<BindingExpression>,
        arguments: Arguments,
    ) -> Result<Invoker, BindingError>;
}

/// The argument tuple type an event binding raises.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Arguments {
    /// [`TypeId`] of the tuple.
    pub type_id: TypeId,
    /// Rust name of the tuple, for diagnostics.
    pub type_name: &'static str,
}

impl Arguments {
    /// Describes the tuple type `A`.
    #[must_use]
    pub fn of<A: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: core::any::type_name::<A>(),
        }
    }
}

/// A compiled getter and setter for one expression.
///
/// Cloning is cheap; clones share the compiled closures.
#[derive(Clone)]
pub struct Accessor {
    expression: Arc<BindingExpression>,
    member_type: TypeId,
    member_type_name: &'static str,
    get: GetFn,
    set: Option<SetFn>,
}

impl Accessor {
    /// Creates an accessor. A `None` setter makes every write a no-op.
    #[must_use]
    pub fn new(
        expression: Arc<BindingExpression>,
        member_type: TypeId,
        member_type_name: &'static str,
        get: GetFn,
        set: Option<SetFn>,
    ) -> Self {
        Self {
            expression,
            member_type,
            member_type_name,
            get,
            set,
        }
    }

    /// Returns the expression this accessor was compiled from.
    #[must_use]
    #[inline]
    pub fn expression(&self) -> &BindingExpression {
        &self.expression
    }

    /// Returns the [`TypeId`] of the member's values.
    #[must_use]
    #[inline]
    pub fn member_type(&self) -> TypeId {
        self.member_type
    }

    /// Returns the Rust name of the member's type.
    #[must_use]
    #[inline]
    pub fn member_type_name(&self) -> &'static str {
        self.member_type_name
    }

    /// Returns `false` if writes are no-ops.
    #[must_use]
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    /// Reads the member. `None` if the data source or an intermediate is null.
    #[must_use]
    pub fn get(&self, data_source: Option<&ErasedValue>) -> Option<ErasedValue> {
        (self.get)(data_source)
    }

    /// Writes the member. Returns `false` if the write did not land.
    pub fn set(&self, data_source: Option<&ErasedValue>, value: ErasedValue) -> bool {
        self.set
            .as_ref()
            .is_some_and(|set| set(data_source, value))
    }

    /// Returns `true` if both accessors came from the same compilation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.expression, &other.expression)
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("expression", &self.expression.text())
            .field("member_type", &self.member_type_name)
            .field("writable", &self.is_writable())
            .finish_non_exhaustive()
    }
}

/// A compiled method call for one event binding.
#[derive(Clone)]
pub struct Invoker {
    expression: Arc<BindingExpression>,
    arguments: Arguments,
    invoke: InvokeFn,
}

impl Invoker {
    /// Creates an invoker.
    #[must_use]
    pub fn new(expression: Arc<BindingExpression>, arguments: Arguments, invoke: InvokeFn) -> Self {
        Self {
            expression,
            arguments,
            invoke,
        }
    }

    /// Returns the expression this invoker was compiled from.
    #[must_use]
    #[inline]
    pub fn expression(&self) -> &BindingExpression {
        &self.expression
    }

    /// Returns the argument tuple the method takes.
    #[must_use]
    #[inline]
    pub fn arguments(&self) -> Arguments {
        self.arguments
    }

    /// Calls the method. Returns `false` if the target was null or the
    /// arguments are not of the compiled tuple type.
    pub fn invoke(&self, data_source: Option<&ErasedValue>, arguments: &ErasedValue) -> bool {
        arguments.type_id() == self.arguments.type_id && (self.invoke)(data_source, arguments)
    }

    /// Returns `true` if both invokers came from the same compilation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.expression, &other.expression)
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("expression", &self.expression.text())
            .field("arguments", &self.arguments.type_name)
            .finish_non_exhaustive()
    }
}

/// A property read on the way to the last segment.
#[derive(Clone)]
pub(crate) struct Step {
    pub(crate) descriptor: Arc<TypeDescriptor>,
    pub(crate) member: PropertyMember,
}

/// The intermediate reads of an expression and the type that owns its last
/// segment.
pub(crate) struct ResolvedPath {
    pub(crate) steps: SmallVec<[Step; 4]>,
    pub(crate) owner: Arc<TypeDescriptor>,
}

impl ResolvedPath {
    /// Resolves every segment but the last, starting from `source`.
    pub(crate) fn resolve(
        types: &TypeRegistry,
        source: TypeId,
        expression: &BindingExpression,
    ) -> Result<Self, BindingError> {
        let text = expression.text();
        let mut current = types.get(source).cloned().ok_or_else(|| {
            BindingError::unresolvable(text, "the data source type has no descriptor")
        })?;
        let mut steps = SmallVec::new();
        for segment in expression.parents() {
            let member = current.property(segment).cloned().ok_or_else(|| {
                BindingError::unresolvable(
                    text,
                    format!("type '{}' has no property '{segment}'", current.name()),
                )
            })?;
            let next = types.get(member.value_type()).cloned().ok_or_else(|| {
                BindingError::unresolvable(
                    text,
                    format!(
                        "'{}.{segment}' is a '{}', which has no descriptor",
                        current.name(),
                        member.value_type_name()
                    ),
                )
            })?;
            steps.push(Step {
                descriptor: current,
                member,
            });
            current = next;
        }
        Ok(Self {
            steps,
            owner: current,
        })
    }

    /// Resolves the last segment as a property.
    pub(crate) fn property(&self, expression: &BindingExpression) -> Result<PropertyMember, BindingError> {
        let segment = expression.last_segment();
        self.owner.property(segment).cloned().ok_or_else(|| {
            BindingError::unresolvable(
                expression.text(),
                format!("type '{}' has no property '{segment}'", self.owner.name()),
            )
        })
    }

    /// Resolves the last segment as a method taking exactly `arguments`.
    pub(crate) fn method(
        &self,
        expression: &BindingExpression,
        arguments: Arguments,
    ) -> Result<MethodMember, BindingError> {
        let segment = expression.last_segment();
        let mut candidates = self.owner.methods_named(segment).peekable();
        if candidates.peek().is_none() {
            return Err(BindingError::cannot_resolve(
                expression.text(),
                format!("type '{}' has no method '{segment}'", self.owner.name()),
            ));
        }
        let mut signatures = SmallVec::<[String; 2]>::new();
        for method in candidates {
            if method.arguments_type() == arguments.type_id {
                return Ok(method.clone());
            }
            signatures.push(method.signature());
        }
        Err(BindingError::cannot_resolve(
            expression.text(),
            format!(
                "'{}.{segment}' takes {}, not {}",
                self.owner.name(),
                signatures.join(" or "),
                arguments.type_name
            ),
        ))
    }

    /// Returns `true` if a write to `member` on the owner would reach the
    /// data source rather than a copy.
    pub(crate) fn can_write(&self, expression: &BindingExpression, member: &PropertyMember) -> bool {
        if self.owner.kind() == TypeKind::Value {
            tracing::debug!(
                expression = expression.text(),
                owner = self.owner.name(),
                "setter goes through a value type; compiled as a no-op"
            );
            return false;
        }
        if !member.is_writable() {
            tracing::debug!(
                expression = expression.text(),
                member = member.name(),
                "member has no setter; compiled as a no-op"
            );
            return false;
        }
        true
    }
}

/// Checks that `expression` names a property or a method on `source`.
pub(crate) fn validate(
    types: &TypeRegistry,
    source: TypeId,
    expression: &BindingExpression,
) -> Result<(), BindingError> {
    let path = ResolvedPath::resolve(types, source, expression)?;
    let segment = expression.last_segment();
    if path.owner.method(segment).is_some() {
        return Ok(());
    }
    path.property(expression).map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_follows_the_feature() {
        let expected = if cfg!(feature = "reflection") {
            Strategy::Reflection
        } else {
            Strategy::Compiled
        };
        assert_eq!(Strategy::default(), expected);
        assert_eq!(Strategy::Reflection.compiler().strategy(), Strategy::Reflection);
        assert_eq!(Strategy::Compiled.compiler().strategy(), Strategy::Compiled);
    }

    #[test]
    fn unwritable_accessor_ignores_writes() {
        let expression = Arc::new(BindingExpression::parse("Value").unwrap());
        let get: GetFn = Arc::new(|source: Option<&ErasedValue>| source.cloned());
        let accessor = Accessor::new(
            expression,
            TypeId::of::<i32>(),
            "i32",
            get,
            None,
        );
        assert!(!accessor.is_writable());
        assert!(!accessor.set(None, ErasedValue::new(1_i32)));
        let source = ErasedValue::new(5_i32);
        assert_eq!(accessor.get(Some(&source)), Some(source.clone()));
        assert!(accessor.ptr_eq(&accessor.clone()));
    }

    #[test]
    fn invoker_checks_the_argument_type() {
        let expression = Arc::new(BindingExpression::parse("Clicked").unwrap());
        let invoke: InvokeFn = Arc::new(|_: Option<&ErasedValue>, _: &ErasedValue| true);
        let invoker = Invoker::new(expression, Arguments::of::<(i32,)>(), invoke);
        assert!(invoker.invoke(None, &ErasedValue::new((1_i32,))));
        assert!(!invoker.invoke(None, &ErasedValue::new((1_i64,))));
    }
}
