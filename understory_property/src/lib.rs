// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Property: dependency properties with layered value resolution.
//!
//! This crate declares typed properties on owner types, stores their values
//! per object from several competing sources, and resolves, coerces, and
//! announces the effective value once per frame in a digest.
//!
//! ## Core Concepts
//!
//! ### Registration
//!
//! [`PropertyRegistry`] hands out [`Property<T>`] handles. Each property has
//! a name and a styling name unique within its owner type, plus
//! [`PropertyMetadata`] that derived types may override. Lookups from a type
//! walk its ancestors, nearest first.
//!
//! ### Value Sources
//!
//! A [`PropertyStore`] keeps one [`ValueSlot`] per property that was ever
//! written on its object. Sources, highest precedence first:
//!
//! - **Animated** - set directly or driven by a [`Tween`]
//! - **Local** - explicitly set values, or a [`BoundValue`] in their place
//! - **Triggered** - values applied by triggers
//! - **Styled** - values applied by stylesheets
//! - **Inherited** - the nearest ancestor's value, for `INHERITS` properties
//! - **Default** - from the metadata in effect for the owner type
//!
//! ### Digest
//!
//! Setters only record sources. [`PropertyStore::digest`] recomputes each
//! slot that needs it, applies the coerce callback, and on a change runs the
//! changed callbacks, then the [`InvalidationHook`], then the
//! [`ChangeNotificationServer`] for that property. A digest with nothing new
//! to report does nothing, so calling it every frame is cheap.
//!
//! ## Quick Start
//!
//! ```rust
//! use core::time::Duration;
//! use understory_property::{
//!     DigestCx, InvalidationQueue, PropertyMetadataBuilder, PropertyRegistry, PropertyStore,
//! };
//! use understory_reflect::{TypeKey, Typed};
//!
//! struct Widget;
//! impl Typed for Widget {
//!     fn type_key() -> TypeKey {
//!         TypeKey::new::<Self>("Widget")
//!     }
//! }
//!
//! let mut registry = PropertyRegistry::new();
//! let opacity = registry
//!     .register(
//!         Widget::type_key(),
//!         "Opacity",
//!         PropertyMetadataBuilder::new(1.0_f32)
//!             .affects_arrange(true)
//!             .coerce(|_, v| v.clamp(0.0, 1.0))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let mut store = PropertyStore::for_type::<Widget>();
//! store.set_styled(&registry, opacity, 0.8).unwrap();
//! store.set_local(&registry, opacity, 1.5).unwrap();
//!
//! let mut queue = InvalidationQueue::default();
//! let mut cx = DigestCx::new(&registry).with_hooks(&mut queue);
//! assert_eq!(store.digest(&mut cx, Duration::ZERO), 0); // 1.5 coerces to the default
//!
//! store.clear_local(opacity);
//! assert_eq!(store.digest(&mut cx, Duration::ZERO), 1);
//! assert_eq!(store.get(&registry, opacity), 0.8);
//! assert_eq!(queue.arrange(), &[store.owner()]);
//! ```
//!
//! ## Memory Optimizations
//!
//! | Optimization | Description |
//! |--------------|-------------|
//! | **Sparse storage** | `PropertyStore` only allocates slots for properties that were written |
//! | **Shared defaults** | Default values stored in registry metadata, not per-object |
//! | **Inline storage** | `SmallVec` for small property counts |
//! | **`PropertyId` as u16** | Compact property identification |

mod animation;
mod bound;
mod error;
mod id;
mod invalidate;
mod metadata;
mod notify;
mod object;
mod registry;
mod slot;
mod store;

pub use animation::{AnimationClock, Easing, Interpolate, Tween};
pub use bound::BoundValue;
pub use error::{PropertyError, RegistrationError};
pub use id::{ObjectId, Property, PropertyId, WriteKey};
pub use invalidate::{InvalidationHook, InvalidationQueue};
pub use metadata::{
    ChangedArgs, CoerceValueCallback, DefaultValue, DefaultValueFactory, MetadataFlags,
    PropertyChangedCallback, PropertyMetadata, PropertyMetadataBuilder,
};
pub use notify::{ChangeNotificationServer, ChangeNotifications, ChangeSubscriber};
pub use object::{
    DependencyObject, DependencyObjectExt, MAX_INHERITANCE_DEPTH, StoreLookup, walk_inherited,
};
pub use registry::{PropertyDefinition, PropertyRegistry, default_styling_name};
pub use slot::{SlotContext, SlotFlags, ValueSlot};
pub use store::{DigestCx, PropertyStore};
pub use understory_reflect::Bindable;
