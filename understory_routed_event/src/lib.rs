// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Routed Event: routed event identity and class handlers.
//!
//! A routed event is declared on an owner type, found by name or styling
//! name from any type derived from that owner, and handled first by class
//! handlers registered per type. Class handlers for an instance run from
//! the most derived declaring type to the least, and in registration order
//! among handlers on the same type.
//!
//! This crate does not walk element trees. [`RoutingStrategy::route`] orders
//! a root-to-source path; a dispatcher runs instance handlers along it.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use understory_property::ObjectId;
//! use understory_routed_event::{RoutedEventArgs, RoutedEventRegistry, RoutingStrategy};
//! use understory_reflect::{TypeKey, Typed};
//!
//! struct Base;
//! impl Typed for Base {
//!     fn type_key() -> TypeKey {
//!         TypeKey::new::<Self>("Base")
//!     }
//! }
//!
//! struct Derived;
//! impl Typed for Derived {
//!     fn type_key() -> TypeKey {
//!         TypeKey::new::<Self>("Derived").with_base::<Base>()
//!     }
//! }
//!
//! let mut registry = RoutedEventRegistry::new();
//! let pressed = registry
//!     .register::<()>(Base::type_key(), "Pressed", RoutingStrategy::Bubble)
//!     .unwrap();
//!
//! let order = Arc::new(Mutex::new(Vec::new()));
//! for (owner, label) in [(Base::type_key(), "base"), (Derived::type_key(), "derived")] {
//!     let order = Arc::clone(&order);
//!     registry
//!         .register_class_handler(owner, pressed, move |_, _| order.lock().unwrap().push(label), false)
//!         .unwrap();
//! }
//!
//! let sender = ObjectId::next();
//! let mut args = RoutedEventArgs::new(pressed, sender, ());
//! registry.invoke_class_handlers(pressed, Derived::type_key(), sender, &mut args);
//! assert_eq!(*order.lock().unwrap(), ["derived", "base"]);
//! ```

mod args;
mod error;
mod id;
mod registry;

pub use args::{RoutedEventArgs, RoutingStrategy};
pub use error::EventRegistrationError;
pub use id::{RoutedEvent, RoutedEventId};
pub use registry::{ClassHandler, ClassHandlerFn, RoutedEventDefinition, RoutedEventRegistry};
