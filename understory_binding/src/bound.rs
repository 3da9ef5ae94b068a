// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bound values and event bindings built on compiled accessors.

use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

use understory_property::BoundValue;
use understory_reflect::{ArgList, Bindable, ConversionTarget, ErasedValue, ValueConverter};

use crate::accessor::{Accessor, Invoker};

/// A bound value whose member type is exactly the property type.
///
/// Reads hand the member value through untouched, and a null path reads as
/// `T::default()`.
pub struct NonConvertingBoundValue<T> {
    accessor: Accessor,
    _marker: PhantomData<fn() -> T>,
}

impl<T> NonConvertingBoundValue<T> {
    /// Wraps `accessor`, whose member type should be `T`.
    #[must_use]
    pub fn new(accessor: Accessor) -> Self {
        Self {
            accessor,
            _marker: PhantomData,
        }
    }
}

impl<T: Bindable + Default> BoundValue<T> for NonConvertingBoundValue<T> {
    fn get(&mut self, data_source: Option<&ErasedValue>) -> T {
        self.accessor
            .get(data_source)
            .and_then(ErasedValue::into_value)
            .unwrap_or_default()
    }

    fn set(&mut self, data_source: Option<&ErasedValue>, value: T) {
        self.accessor
            .set(data_source, ErasedValue::from_value(value));
    }

    fn is_writable(&self) -> bool {
        self.accessor.is_writable()
    }

    fn expression(&self) -> &str {
        self.accessor.expression().text()
    }
}

impl<T> fmt::Debug for NonConvertingBoundValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonConvertingBoundValue")
            .field("accessor", &self.accessor)
            .finish()
    }
}

/// The last conversion a [`ConvertingBoundValue`] made or was handed.
#[derive(Debug)]
struct DisplayCache<T> {
    input: Option<ErasedValue>,
    output: T,
}

/// A bound value that converts between the member type and the property
/// type, using the expression's format segment.
///
/// The last member value and its displayed form are cached. A read that sees
/// the same member value returns the cached display without converting
/// again. After a write the display is the value that was written, not the
/// value converted back, so text like `"1."` survives a round trip through a
/// numeric member until [`BoundValue::invalidate_display_cache`] is called.
pub struct ConvertingBoundValue<T> {
    accessor: Accessor,
    converter: Arc<ValueConverter>,
    coerce_object_to_string: bool,
    display: Option<DisplayCache<T>>,
}

impl<T> ConvertingBoundValue<T> {
    /// Wraps `accessor`, converting through `converter`.
    #[must_use]
    pub fn new(
        accessor: Accessor,
        converter: Arc<ValueConverter>,
        coerce_object_to_string: bool,
    ) -> Self {
        Self {
            accessor,
            converter,
            coerce_object_to_string,
            display: None,
        }
    }

    /// Returns `true` if a display value is cached.
    #[must_use]
    pub fn has_display_cache(&self) -> bool {
        self.display.is_some()
    }
}

impl<T: Bindable + Default> BoundValue<T> for ConvertingBoundValue<T> {
    fn get(&mut self, data_source: Option<&ErasedValue>) -> T {
        let input = self.accessor.get(data_source);
        if let Some(cache) = &self.display
            && cache.input == input
        {
            return cache.output.clone();
        }
        let output: T = self.converter.convert(
            input.as_ref(),
            self.accessor.expression().format(),
            self.coerce_object_to_string,
        );
        self.display = Some(DisplayCache {
            input,
            output: output.clone(),
        });
        output
    }

    fn set(&mut self, data_source: Option<&ErasedValue>, value: T) {
        if !self.accessor.is_writable() {
            return;
        }
        let Some(converted) = self.converter.convert_erased(
            Some(&ErasedValue::from_value(value.clone())),
            ConversionTarget::Type(self.accessor.member_type()),
            self.accessor.expression().format(),
            false,
        ) else {
            return;
        };
        if self.accessor.set(data_source, converted.clone()) {
            self.display = Some(DisplayCache {
                input: Some(converted),
                output: value,
            });
        }
    }

    fn invalidate_display_cache(&mut self) {
        self.display = None;
    }

    fn is_writable(&self) -> bool {
        self.accessor.is_writable()
    }

    fn expression(&self) -> &str {
        self.accessor.expression().text()
    }
}

impl<T: fmt::Debug> fmt::Debug for ConvertingBoundValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertingBoundValue")
            .field("accessor", &self.accessor)
            .field("coerce_object_to_string", &self.coerce_object_to_string)
            .field("display", &self.display.as_ref().map(|cache| &cache.output))
            .finish_non_exhaustive()
    }
}

/// A method on a data source, called with the argument tuple `A` when an
/// event is raised.
pub struct EventBinding<A> {
    invoker: Invoker,
    _marker: PhantomData<fn(A)>,
}

impl<A: ArgList> EventBinding<A> {
    /// Wraps `invoker`, which must have been compiled for `A`.
    #[must_use]
    pub fn new(invoker: Invoker) -> Self {
        Self {
            invoker,
            _marker: PhantomData,
        }
    }

    /// Calls the method on `data_source`.
    ///
    /// Returns `false` if the data source or an intermediate object is null.
    pub fn invoke(&self, data_source: Option<&ErasedValue>, arguments: A) -> bool {
        self.invoker
            .invoke(data_source, &ErasedValue::new(arguments))
    }

    /// Returns the expression text.
    #[must_use]
    pub fn expression(&self) -> &str {
        self.invoker.expression().text()
    }
}

impl<A> Clone for EventBinding<A> {
    fn clone(&self) -> Self {
        Self {
            invoker: self.invoker.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A> fmt::Debug for EventBinding<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinding")
            .field("invoker", &self.invoker)
            .finish()
    }
}
