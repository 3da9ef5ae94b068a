// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding property store entries straight from expression text.

use core::any::TypeId;

use understory_property::{Property, PropertyRegistry, PropertyStore};
use understory_reflect::Bindable;

use crate::compiler::BindingCompiler;
use crate::error::BindingError;

/// Binds store properties from expression text.
pub trait PropertyStoreBindingExt {
    /// Compiles `text` against data sources of type `source` and installs
    /// the result as `property`'s bound value.
    ///
    /// Object-to-string coercion follows the property's
    /// `COERCE_OBJECT_TO_STRING` flag for this store's owner type.
    ///
    /// # Errors
    ///
    /// Fails if the expression does not compile, or if the store refuses the
    /// binding (read-only or unregistered properties).
    fn bind_expression<T: Bindable + Default>(
        &mut self,
        registry: &PropertyRegistry,
        compiler: &BindingCompiler,
        property: Property<T>,
        source: TypeId,
        text: &str,
    ) -> Result<(), BindingError>;
}

impl PropertyStoreBindingExt for PropertyStore {
    fn bind_expression<T: Bindable + Default>(
        &mut self,
        registry: &PropertyRegistry,
        compiler: &BindingCompiler,
        property: Property<T>,
        source: TypeId,
        text: &str,
    ) -> Result<(), BindingError> {
        let coerce = registry
            .metadata_for(property, self.owner_type())
            .is_some_and(|metadata| metadata.coerce_object_to_string());
        let bound = compiler.bound_value::<T>(source, text, coerce)?;
        self.bind(registry, property, bound)?;
        Ok(())
    }
}
