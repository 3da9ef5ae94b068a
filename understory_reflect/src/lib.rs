// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Reflect: runtime type information for data binding.
//!
//! Bindings resolve strings such as `"ViewModel.Name"` against data source
//! types at load time. Rust has no runtime member reflection, so types that
//! take part in binding describe themselves explicitly. This crate holds
//! those descriptions and the value plumbing around them.
//!
//! ## Core Concepts
//!
//! - [`TypeKey`] and [`Typed`]: a type's identity and its declared base type,
//!   used for ancestor walks in the property and event registries.
//! - [`ErasedValue`]: a cloneable, comparable, type-erased value.
//! - [`Shared`]: a reference object. Clones share one object and compare by
//!   identity.
//! - [`TypeDescriptor`] and [`TypeRegistry`]: the members a binding may read,
//!   write, or invoke on a data source type.
//! - [`ValueConverter`]: lenient conversion between member and property types,
//!   including string formatting with .NET-style numeric format specifiers.
//!
//! ## Quick Start
//!
//! ```rust
//! use core::any::TypeId;
//! use understory_reflect::{Shared, TypeDescriptor, TypeRegistry, ValueConverter};
//!
//! struct Account {
//!     balance: f64,
//! }
//!
//! let mut types = TypeRegistry::new();
//! types
//!     .register(
//!         TypeDescriptor::reference::<Account>("Account")
//!             .property("Balance", |a: &Account| a.balance)
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let account = Shared::new(Account { balance: 1234.5 });
//! let descriptor = types.get(TypeId::of::<Account>()).unwrap();
//! let balance = descriptor.property("Balance").unwrap();
//! let value = descriptor.read_member(&account.to_erased(), balance);
//!
//! let converter = ValueConverter::default();
//! let text: String = converter.convert(value.as_ref(), Some("{0:N2}"), false);
//! assert_eq!(text, "1,234.50");
//! ```

mod convert;
mod format;
mod key;
mod types;
mod value;

pub use convert::{ConversionTarget, TypeConverter, ValueConverter};
pub use key::{Ancestors, MAX_HIERARCHY_DEPTH, TypeKey, Typed};
pub use types::{
    ArgList, MemberGetter, MemberSetter, MethodInvoker, MethodMember, PropertyMember,
    TypeDescriptor, TypeDescriptorBuilder, TypeKind, TypeRegistrationError, TypeRegistry,
};
pub use value::{Bindable, ErasedValue, Shared};
