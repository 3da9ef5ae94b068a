// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seam between value slots and data bindings.

use understory_reflect::ErasedValue;

/// A value source backed by a data binding.
///
/// A bound value replaces a slot's local source: digest reads through
/// [`BoundValue::get`], and local writes go through [`BoundValue::set`].
/// Both take the store's current data source, which may be absent.
///
/// Implementations never fail. A path that cannot be read yields the
/// type's default, and a path that cannot be written ignores the write.
///
/// ```rust
/// use understory_property::BoundValue;
/// use understory_reflect::ErasedValue;
///
/// /// Reads the data source itself as an `i32`.
/// struct Identity;
///
/// impl BoundValue<i32> for Identity {
///     fn get(&mut self, data_source: Option<&ErasedValue>) -> i32 {
///         data_source
///             .and_then(|source| source.downcast_ref().copied())
///             .unwrap_or_default()
///     }
///
///     fn set(&mut self, _: Option<&ErasedValue>, _: i32) {}
///
///     fn is_writable(&self) -> bool {
///         false
///     }
///
///     fn expression(&self) -> &str {
///         ""
///     }
/// }
///
/// let mut bound = Identity;
/// assert_eq!(bound.get(Some(&ErasedValue::new(7_i32))), 7);
/// assert_eq!(bound.get(None), 0);
/// ```
pub trait BoundValue<T>: Send + Sync {
    /// Reads the current value from `data_source`.
    fn get(&mut self, data_source: Option<&ErasedValue>) -> T;

    /// Writes `value` to `data_source`, if the path is writable.
    fn set(&mut self, data_source: Option<&ErasedValue>, value: T);

    /// Forgets any cached display conversion, so the next read converts
    /// the source value again.
    fn invalidate_display_cache(&mut self) {}

    /// Returns whether [`BoundValue::set`] can reach the source.
    fn is_writable(&self) -> bool;

    /// Returns the binding expression text.
    fn expression(&self) -> &str;
}
