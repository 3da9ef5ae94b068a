// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Closure-composed accessors.
//!
//! Each resolved member read is wrapped around the previous one, so the
//! finished accessor is a single closure chain that never looks a name up.

use core::any::TypeId;
use std::sync::Arc;

use understory_reflect::{ErasedValue, TypeRegistry};

use crate::accessor::{
    Accessor, AccessorCompiler, Arguments, GetFn, InvokeFn, Invoker, ResolvedPath, SetFn, Step,
    Strategy,
};
use crate::error::BindingError;
use crate::expression::BindingExpression;

/// Maps a data source to the object owning the last segment.
type Walk = Arc<dyn Fn(&ErasedValue) -> Option<ErasedValue> + Send + Sync>;

/// The [`Strategy::Compiled`] compiler.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct CompiledAccessors;

impl CompiledAccessors {
    fn walk(steps: impl IntoIterator<Item = Step>) -> Walk {
        let mut walk: Walk = Arc::new(|root: &ErasedValue| Some(root.clone()));
        for Step { descriptor, member } in steps {
            let inner = walk;
            walk = Arc::new(move |root: &ErasedValue| {
                let parent = inner(root)?;
                descriptor.read_member(&parent, &member)
            });
        }
        walk
    }
}

impl AccessorCompiler for CompiledAccessors {
    fn strategy(&self) -> Strategy {
        Strategy::Compiled
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
        let (member_type, member_type_name) = (member.value_type(), member.value_type_name());
        let walk = Self::walk(path.steps);

        let set: Option<SetFn> = writable.then(|| {
            let (walk, owner, member) = (Arc::clone(&walk), Arc::clone(&path.owner), member.clone());
            let set: SetFn = Arc::new(move |source: Option<&ErasedValue>, value: ErasedValue| {
                let Some(mut target) = source.and_then(|source| walk(source)) else {
                    return false;
                };
                owner.write_member(&mut target, &member, value)
            });
            set
        });
        let owner = path.owner;
        let get: GetFn = Arc::new(move |source: Option<&ErasedValue>| {
            let target = walk(source?)?;
            owner.read_member(&target, &member)
        });
        Ok(Accessor::new(
            expression,
            member_type,
            member_type_name,
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
        let method = path.method(&expression, arguments)?;
        let owner = path.owner;
        let walk = Self::walk(path.steps);
        let invoke: InvokeFn = Arc::new(move |source: Option<&ErasedValue>, args: &ErasedValue| {
            let Some(mut target) = source.and_then(|source| walk(source)) else {
                return false;
            };
            owner.invoke_method(&mut target, &method, args)
        });
        Ok(Invoker::new(expression, arguments, invoke))
    }
}
