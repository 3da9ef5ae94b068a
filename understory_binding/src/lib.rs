// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Binding: binding expressions compiled into typed accessors.
//!
//! A binding string such as `"ViewModel.Name"` names a path of members on a
//! data source. This crate parses it, resolves it once against the
//! [`TypeRegistry`](understory_reflect::TypeRegistry), and produces an
//! [`Accessor`] that reads and writes the path without failing: a null
//! intermediate reads as absent and a write that cannot land does nothing.
//!
//! ## Core Concepts
//!
//! - [`BindingExpression`]: the parsed path and optional format segment.
//! - [`AccessorCompiler`] and [`Strategy`]: how a resolved path becomes a
//!   getter, setter, or invoker. [`Strategy::Compiled`] composes closures
//!   once; [`Strategy::Reflection`] walks the type registry on each access.
//! - [`BindingCompiler`]: the cached front end. It hands out
//!   [`BoundValue`](understory_property::BoundValue)s for properties and
//!   [`EventBinding`]s for handlers.
//! - [`PropertyStoreBindingExt`]: binds a store property from text.
//! - [`precompile`]: checks the bindings in template files ahead of time.
//!
//! ## Quick Start
//!
//! ```rust
//! use core::any::TypeId;
//! use core::time::Duration;
//! use std::sync::Arc;
//! use understory_binding::{BindingCompiler, PropertyStoreBindingExt};
//! use understory_property::{DigestCx, PropertyMetadataBuilder, PropertyRegistry, PropertyStore};
//! use understory_reflect::{Shared, TypeDescriptor, TypeKey, TypeRegistry, Typed};
//!
//! struct Person {
//!     name: String,
//! }
//!
//! struct Page {
//!     view_model: Option<Shared<Person>>,
//! }
//!
//! struct Label;
//! impl Typed for Label {
//!     fn type_key() -> TypeKey {
//!         TypeKey::new::<Self>("Label")
//!     }
//! }
//!
//! let mut types = TypeRegistry::new();
//! types
//!     .register(
//!         TypeDescriptor::reference::<Person>("Person")
//!             .writable_property("Name", |p: &Person| p.name.clone(), |p, v| p.name = v)
//!             .build(),
//!     )
//!     .unwrap();
//! types
//!     .register(
//!         TypeDescriptor::reference::<Page>("Page")
//!             .reference("ViewModel", |p: &Page| p.view_model.clone())
//!             .build(),
//!     )
//!     .unwrap();
//! let compiler = BindingCompiler::new(Arc::new(types));
//!
//! let mut registry = PropertyRegistry::new();
//! let text = registry
//!     .register(
//!         Label::type_key(),
//!         "Text",
//!         PropertyMetadataBuilder::new(String::new()).build(),
//!     )
//!     .unwrap();
//!
//! let page = Shared::new(Page { view_model: None });
//! let mut label = PropertyStore::for_type::<Label>();
//! label.set_data_source(Some(page.to_erased()));
//! label
//!     .bind_expression(&registry, &compiler, text, TypeId::of::<Page>(), "ViewModel.Name")
//!     .unwrap();
//!
//! // No view model yet: the binding reads the default.
//! let mut cx = DigestCx::new(&registry);
//! assert_eq!(label.digest(&mut cx, Duration::ZERO), 0);
//! assert_eq!(label.get(&registry, text), "");
//!
//! page.write().view_model = Some(Shared::new(Person { name: "Ada".into() }));
//! assert_eq!(label.digest(&mut cx, Duration::ZERO), 1);
//! assert_eq!(label.get(&registry, text), "Ada");
//! ```
//!
//! ## Features
//!
//! - `reflection`: makes [`Strategy::Reflection`] the default strategy.
//!   Both strategies are always available through
//!   [`BindingCompiler::with_strategy`].

mod accessor;
mod bound;
mod compiled;
mod compiler;
mod error;
mod expression;
pub mod precompile;
mod reflection;
mod store_ext;

pub use accessor::{
    Accessor, AccessorCompiler, Arguments, GetFn, InvokeFn, Invoker, SetFn, Strategy,
};
pub use bound::{ConvertingBoundValue, EventBinding, NonConvertingBoundValue};
pub use compiler::BindingCompiler;
pub use error::BindingError;
pub use expression::{BindingExpression, ExpressionError};
pub use store_ext::PropertyStoreBindingExt;
