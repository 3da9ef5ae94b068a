// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property metadata definitions.
//!
//! This module provides [`PropertyMetadata`] for storing property configuration
//! and [`PropertyMetadataBuilder`] for ergonomic construction.
//!
//! Metadata can be overridden per owner type. An override only states what
//! differs: [`PropertyMetadata::merged_with`] fills every unset field from the
//! nearest ancestor's resolved metadata, and changed callbacks accumulate,
//! ancestor callbacks first.

use core::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::id::{ObjectId, PropertyId};

bitflags! {
    /// Boolean options carried by [`PropertyMetadata`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MetadataFlags: u8 {
        /// The value is inherited from the logical parent when no own source is set.
        const INHERITS = 1 << 0;
        /// Changes invalidate the owner's measure pass.
        const AFFECTS_MEASURE = 1 << 1;
        /// Changes invalidate the owner's arrange pass.
        const AFFECTS_ARRANGE = 1 << 2;
        /// Bindings fall back to string formatting when a value cannot be converted.
        const COERCE_OBJECT_TO_STRING = 1 << 3;
    }
}

/// Arguments passed to a [`PropertyChangedCallback`].
#[derive(Debug)]
pub struct ChangedArgs<'a, T> {
    /// The object whose value changed.
    pub owner: ObjectId,
    /// The property that changed.
    pub property: PropertyId,
    /// The previous effective value.
    pub old: &'a T,
    /// The new effective value.
    pub new: &'a T,
}

/// Callback invoked when a property's effective value changes.
pub type PropertyChangedCallback<T> = Arc<dyn Fn(&ChangedArgs<'_, T>) + Send + Sync>;

/// Callback for coercing a property value before it becomes effective.
///
/// This can be used to clamp values, validate ranges, etc.
/// The callback receives the owner and the raw value and returns the coerced value.
pub type CoerceValueCallback<T> = Arc<dyn Fn(ObjectId, T) -> T + Send + Sync>;

/// Callback producing a fresh default value.
pub type DefaultValueFactory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Where a property's default value comes from.
#[derive(Clone)]
pub enum DefaultValue<T> {
    /// A fixed value, cloned on use.
    Value(T),
    /// A factory called on use.
    Factory(DefaultValueFactory<T>),
}

impl<T: Clone> DefaultValue<T> {
    /// Produces the default value.
    #[must_use]
    pub fn get(&self) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Factory(factory) => factory(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DefaultValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Metadata for a dependency property.
///
/// This contains the configuration for a property including its default value,
/// its flags, and optional callbacks.
///
/// # Example
///
/// ```rust
/// use understory_property::PropertyMetadataBuilder;
///
/// let metadata = PropertyMetadataBuilder::new(100.0_f64)
///     .inherits(true)
///     .affects_measure(true)
///     .build();
///
/// assert_eq!(metadata.default_value(), Some(100.0));
/// assert!(metadata.inherits());
/// assert!(metadata.affects_measure());
/// assert!(!metadata.affects_arrange());
/// ```
pub struct PropertyMetadata<T> {
    default: Option<DefaultValue<T>>,
    flags: MetadataFlags,
    explicit: MetadataFlags,
    changed: SmallVec<[PropertyChangedCallback<T>; 2]>,
    coerce: Option<CoerceValueCallback<T>>,
}

impl<T: Clone> PropertyMetadata<T> {
    /// Creates new property metadata with the given default value.
    ///
    /// No flags are set and no callbacks are registered.
    #[must_use]
    pub fn new(default_value: T) -> Self {
        Self {
            default: Some(DefaultValue::Value(default_value)),
            ..Self::overriding()
        }
    }

    /// Creates metadata that leaves every field to be filled from an ancestor.
    ///
    /// This is only useful as an override; registration requires a default.
    #[must_use]
    pub fn overriding() -> Self {
        Self {
            default: None,
            flags: MetadataFlags::empty(),
            explicit: MetadataFlags::empty(),
            changed: SmallVec::new(),
            coerce: None,
        }
    }

    /// Produces the default value, if this metadata has one.
    #[must_use]
    pub fn default_value(&self) -> Option<T> {
        self.default.as_ref().map(DefaultValue::get)
    }

    /// Returns `true` if this metadata carries a default value or factory.
    #[must_use]
    #[inline]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Returns the flag set.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> MetadataFlags {
        self.flags
    }

    /// Returns the flags that were set explicitly, as opposed to left unset.
    #[must_use]
    #[inline]
    pub fn explicit_flags(&self) -> MetadataFlags {
        self.explicit
    }

    /// Returns whether this property inherits from parent objects.
    #[must_use]
    #[inline]
    pub fn inherits(&self) -> bool {
        self.flags.contains(MetadataFlags::INHERITS)
    }

    /// Returns whether changes invalidate measure.
    #[must_use]
    #[inline]
    pub fn affects_measure(&self) -> bool {
        self.flags.contains(MetadataFlags::AFFECTS_MEASURE)
    }

    /// Returns whether changes invalidate arrange.
    #[must_use]
    #[inline]
    pub fn affects_arrange(&self) -> bool {
        self.flags.contains(MetadataFlags::AFFECTS_ARRANGE)
    }

    /// Returns whether bindings coerce unconvertible values to strings.
    #[must_use]
    #[inline]
    pub fn coerce_object_to_string(&self) -> bool {
        self.flags.contains(MetadataFlags::COERCE_OBJECT_TO_STRING)
    }

    /// Invokes every changed callback, in order.
    pub fn notify_changed(&self, args: &ChangedArgs<'_, T>) {
        for callback in &self.changed {
            callback(args);
        }
    }

    /// Coerces a value using the coerce callback if one is set.
    #[inline]
    pub fn coerce(&self, owner: ObjectId, value: T) -> T {
        match &self.coerce {
            Some(callback) => callback(owner, value),
            None => value,
        }
    }

    /// Returns the number of changed callbacks.
    #[must_use]
    #[inline]
    pub fn changed_callback_count(&self) -> usize {
        self.changed.len()
    }

    /// Returns whether a coerce callback is set.
    #[must_use]
    #[inline]
    pub fn has_coerce_callback(&self) -> bool {
        self.coerce.is_some()
    }

    /// Fills the unset parts of `self` from `base`, the nearest ancestor's
    /// resolved metadata.
    ///
    /// ```rust
    /// use understory_property::{PropertyMetadata, PropertyMetadataBuilder};
    ///
    /// let base = PropertyMetadataBuilder::new(1.0_f32)
    ///     .affects_arrange(true)
    ///     .on_changed(|_| {})
    ///     .build();
    /// let merged = PropertyMetadataBuilder::overriding()
    ///     .affects_measure(true)
    ///     .on_changed(|_| {})
    ///     .build()
    ///     .merged_with(&base);
    ///
    /// assert_eq!(merged.default_value(), Some(1.0));
    /// assert!(merged.affects_arrange() && merged.affects_measure());
    /// assert_eq!(merged.changed_callback_count(), 2);
    /// ```
    #[must_use]
    pub fn merged_with(self, base: &Self) -> Self {
        let mut changed = base.changed.clone();
        changed.extend(self.changed);
        Self {
            default: self.default.or_else(|| base.default.clone()),
            flags: (base.flags & !self.explicit) | (self.flags & self.explicit),
            explicit: base.explicit | self.explicit,
            changed,
            coerce: self.coerce.or_else(|| base.coerce.clone()),
        }
    }
}

impl<T: Clone> Clone for PropertyMetadata<T> {
    fn clone(&self) -> Self {
        Self {
            default: self.default.clone(),
            flags: self.flags,
            explicit: self.explicit,
            changed: self.changed.clone(),
            coerce: self.coerce.clone(),
        }
    }
}

// Manual Debug impl since callbacks aren't Debug
impl<T: fmt::Debug> fmt::Debug for PropertyMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("default", &self.default)
            .field("flags", &self.flags)
            .field("changed_callbacks", &self.changed.len())
            .field("has_coerce_callback", &self.coerce.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PropertyMetadata`].
///
/// # Example
///
/// ```rust
/// use understory_property::PropertyMetadataBuilder;
///
/// let metadata = PropertyMetadataBuilder::new(0.0_f64)
///     .affects_measure(true)
///     .affects_arrange(true)
///     .coerce(|_, v| v.clamp(0.0, 100.0))
///     .build();
/// assert!(metadata.has_coerce_callback());
/// ```
pub struct PropertyMetadataBuilder<T> {
    metadata: PropertyMetadata<T>,
}

impl<T: fmt::Debug> fmt::Debug for PropertyMetadataBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyMetadataBuilder")
            .field(&self.metadata)
            .finish()
    }
}

impl<T: Clone> PropertyMetadataBuilder<T> {
    /// Creates a new builder with the given default value.
    #[must_use]
    pub fn new(default_value: T) -> Self {
        Self {
            metadata: PropertyMetadata::new(default_value),
        }
    }

    /// Creates a builder whose default comes from a factory.
    #[must_use]
    pub fn with_default_factory<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let mut builder = Self::overriding();
        builder.metadata.default = Some(DefaultValue::Factory(Arc::new(factory)));
        builder
    }

    /// Creates a builder for override metadata, with no default.
    #[must_use]
    pub fn overriding() -> Self {
        Self {
            metadata: PropertyMetadata::overriding(),
        }
    }

    fn flag(mut self, flag: MetadataFlags, value: bool) -> Self {
        self.metadata.flags.set(flag, value);
        self.metadata.explicit |= flag;
        self
    }

    /// Sets whether this property inherits from parent objects.
    ///
    /// When `true`, a slot with no own source takes the nearest ancestor's
    /// value during digest.
    #[must_use]
    pub fn inherits(self, inherits: bool) -> Self {
        self.flag(MetadataFlags::INHERITS, inherits)
    }

    /// Sets whether changes invalidate measure.
    #[must_use]
    pub fn affects_measure(self, value: bool) -> Self {
        self.flag(MetadataFlags::AFFECTS_MEASURE, value)
    }

    /// Sets whether changes invalidate arrange.
    #[must_use]
    pub fn affects_arrange(self, value: bool) -> Self {
        self.flag(MetadataFlags::AFFECTS_ARRANGE, value)
    }

    /// Sets whether bindings coerce unconvertible values to strings.
    #[must_use]
    pub fn coerce_object_to_string(self, value: bool) -> Self {
        self.flag(MetadataFlags::COERCE_OBJECT_TO_STRING, value)
    }

    /// Adds a callback to be invoked when the effective value changes.
    #[must_use]
    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChangedArgs<'_, T>) + Send + Sync + 'static,
    {
        self.metadata.changed.push(Arc::new(callback));
        self
    }

    /// Sets a callback to coerce values before they become effective.
    #[must_use]
    pub fn coerce<F>(mut self, callback: F) -> Self
    where
        F: Fn(ObjectId, T) -> T + Send + Sync + 'static,
    {
        self.metadata.coerce = Some(Arc::new(callback));
        self
    }

    /// Builds the [`PropertyMetadata`].
    #[must_use]
    pub fn build(self) -> PropertyMetadata<T> {
        self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn metadata_defaults() {
        let metadata = PropertyMetadata::new(42_i32);
        assert_eq!(metadata.default_value(), Some(42));
        assert!(metadata.flags().is_empty());
        assert_eq!(metadata.changed_callback_count(), 0);
        assert!(!metadata.has_coerce_callback());
    }

    #[test]
    fn metadata_builder_flags() {
        let metadata = PropertyMetadataBuilder::new(100.0_f64)
            .inherits(true)
            .affects_arrange(true)
            .coerce_object_to_string(false)
            .build();

        assert!(metadata.inherits());
        assert!(metadata.affects_arrange());
        assert!(!metadata.affects_measure());
        assert!(!metadata.coerce_object_to_string());
        assert_eq!(
            metadata.explicit_flags(),
            MetadataFlags::INHERITS
                | MetadataFlags::AFFECTS_ARRANGE
                | MetadataFlags::COERCE_OBJECT_TO_STRING
        );
    }

    #[test]
    fn metadata_default_factory() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let metadata = PropertyMetadataBuilder::with_default_factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            String::from("fresh")
        })
        .build();

        assert_eq!(metadata.default_value().as_deref(), Some("fresh"));
        assert_eq!(metadata.default_value().as_deref(), Some("fresh"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn metadata_coerce() {
        let metadata = PropertyMetadataBuilder::new(0.0_f64)
            .coerce(|_, v| v.clamp(0.0, 100.0))
            .build();
        let owner = ObjectId::new(1);

        assert_eq!(metadata.coerce(owner, -10.0), 0.0);
        assert_eq!(metadata.coerce(owner, 50.0), 50.0);
        assert_eq!(metadata.coerce(owner, 150.0), 100.0);
    }

    #[test]
    fn merge_keeps_unset_fields_from_base() {
        let base = PropertyMetadataBuilder::new(5_i32)
            .inherits(true)
            .affects_measure(true)
            .coerce(|_, v| v.max(0))
            .build();
        let merged = PropertyMetadataBuilder::overriding()
            .affects_measure(false)
            .build()
            .merged_with(&base);

        assert_eq!(merged.default_value(), Some(5));
        assert!(merged.inherits());
        assert!(!merged.affects_measure());
        assert_eq!(merged.coerce(ObjectId::new(1), -3), 0);
    }

    #[test]
    fn merge_prefers_override_default() {
        let base = PropertyMetadata::new(5_i32);
        let merged = PropertyMetadata::new(9_i32).merged_with(&base);
        assert_eq!(merged.default_value(), Some(9));
    }

    #[test]
    fn merge_runs_ancestor_callbacks_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&order), Arc::clone(&order));
        let base = PropertyMetadataBuilder::new(0_i32)
            .on_changed(move |_| a.lock().unwrap().push("base"))
            .build();
        let merged = PropertyMetadataBuilder::overriding()
            .on_changed(move |_| b.lock().unwrap().push("derived"))
            .build()
            .merged_with(&base);

        merged.notify_changed(&ChangedArgs {
            owner: ObjectId::new(1),
            property: PropertyId::new(0),
            old: &0,
            new: &1,
        });
        assert_eq!(*order.lock().unwrap(), ["base", "derived"]);
    }

    #[test]
    fn metadata_debug() {
        let metadata = PropertyMetadataBuilder::new(42_i32).inherits(true).build();

        let debug = format!("{metadata:?}");
        assert!(debug.contains("PropertyMetadata"));
        assert!(debug.contains("42"));
        assert!(debug.contains("INHERITS"));
    }
}
