// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Descriptor-walking accessors.
//!
//! The expression is resolved once to report errors up front, but each
//! access walks it again by name, finding every object's descriptor from its
//! runtime type. Slower than the compiled strategy, with the same results.

use core::any::TypeId;
use std::sync::Arc;

use understory_reflect::{ErasedValue, TypeDescriptor, TypeKind, TypeRegistry};

use crate::accessor::{
    Accessor, AccessorCompiler, Arguments, GetFn, InvokeFn, Invoker, ResolvedPath, SetFn,
    Strategy,
};
use crate::error::BindingError;
use crate::expression::BindingExpression;

/// The [`Strategy::Reflection`] compiler.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct ReflectionAccessors;

/// Walks every segment but the last, returning the object that owns the
/// last segment and its descriptor.
fn walk<'a>(
    types: &'a TypeRegistry,
    root: &ErasedValue,
    expression: &BindingExpression,
) -> Option<(ErasedValue, &'a TypeDescriptor)> {
    let mut current = root.clone();
    for segment in expression.parents() {
        let descriptor = types.get(current.type_id())?;
        let member = descriptor.property(segment)?;
        current = descriptor.read_member(&current, member)?;
    }
    let descriptor = types.get(current.type_id())?;
    Some((current, &**descriptor))
}

impl AccessorCompiler for ReflectionAccessors {
    fn strategy(&self) -> Strategy {
        Strategy::Reflection
    }

    fn compile_accessor(
        &self,
        types: &Arc<TypeRegistry>,
        source: TypeId,
        expression: Arc<BindingExpression>,
    ) -> Result<Accessor, BindingError> {
        let path = ResolvedPath::resolve(types, source, &expression)?;
        let member = path.property(&expression)?;
        let writable = path.can_write(&expression, &member);

        let set: Option<SetFn> = writable.then(|| {
            let (types, expression) = (Arc::clone(types), Arc::clone(&expression));
            let set: SetFn = Arc::new(move |source: Option<&ErasedValue>, value: ErasedValue| {
                let Some((mut target, descriptor)) =
                    source.and_then(|source| walk(&types, source, &expression))
                else {
                    return false;
                };
                if descriptor.kind() != TypeKind::Reference {
                    return false;
                }
                descriptor
                    .property(expression.last_segment())
                    .is_some_and(|member| descriptor.write_member(&mut target, member, value))
            });
            set
        });
        let get: GetFn = {
            let (types, expression) = (Arc::clone(types), Arc::clone(&expression));
            Arc::new(move |source: Option<&ErasedValue>| {
                let (target, descriptor) = walk(&types, source?, &expression)?;
                let member = descriptor.property(expression.last_segment())?;
                descriptor.read_member(&target, member)
            })
        };
        Ok(Accessor::new(
            expression,
            member.value_type(),
            member.value_type_name(),
            get,
            set,
        ))
    }

    fn compile_invoker(
        &self,
        types: &Arc<TypeRegistry>,
        source: TypeId,
        expression: Arc<BindingExpression>,
        arguments: Arguments,
    ) -> Result<Invoker, BindingError> {
        let path = ResolvedPath::resolve(types, source, &expression)?;
        path.method(&expression, arguments)?;

        let (types, walked) = (Arc::clone(types), Arc::clone(&expression));
        let invoke: InvokeFn = Arc::new(move |source: Option<&ErasedValue>, args: &ErasedValue| {
            let Some((mut target, descriptor)) =
                source.and_then(|source| walk(&types, source, &walked))
            else {
                return false;
            };
            descriptor
                .methods_named(walked.last_segment())
                .find(|method| method.arguments_type() == arguments.type_id)
                .is_some_and(|method| descriptor.invoke_method(&mut target, method, args))
        });
        Ok(Invoker::new(expression, arguments, invoke))
    }
}
