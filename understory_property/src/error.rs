// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for registration and store access.

use thiserror::Error;

use crate::id::PropertyId;

/// Errors raised while registering properties or overriding their metadata.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A property with this name already exists in the owner's domain.
    #[error("property '{name}' is already registered on '{owner}'")]
    DuplicateRegistration {
        /// The property name.
        name: &'static str,
        /// The owner type name.
        owner: &'static str,
    },
    /// A property with this styling name already exists in the owner's domain.
    #[error("styling name '{styling_name}' is already registered on '{owner}'")]
    DuplicateStylingName {
        /// The styling name.
        styling_name: String,
        /// The owner type name.
        owner: &'static str,
    },
    /// The metadata for this property was already overridden for the type.
    #[error("metadata for property '{name}' is already overridden on '{owner}'")]
    DuplicateOverride {
        /// The property name.
        name: &'static str,
        /// The type whose override already exists.
        owner: &'static str,
    },
    /// The property id does not belong to this registry.
    #[error("{id} is not registered")]
    UnknownProperty {
        /// The unknown id.
        id: PropertyId,
    },
    /// Registration metadata must provide a default value or factory.
    #[error("property '{name}' on '{owner}' has no default value")]
    MissingDefaultValue {
        /// The property name.
        name: &'static str,
        /// The owner type name.
        owner: &'static str,
    },
    /// The metadata type differs from the property's value type.
    #[error("property '{name}' holds '{expected}', not '{found}'")]
    TypeMismatch {
        /// The property name.
        name: &'static str,
        /// The registered value type.
        expected: &'static str,
        /// The type that was supplied.
        found: &'static str,
    },
    /// Every property id is in use.
    #[error("too many properties registered (max {max})", max = u16::MAX)]
    TooManyProperties,
}

/// Errors raised when writing values into a [`PropertyStore`](crate::PropertyStore).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// The property is read-only and no write key was presented.
    #[error("property '{name}' is read-only")]
    ReadOnly {
        /// The property name.
        name: &'static str,
    },
    /// The property id does not belong to the registry.
    #[error("{id} is not registered")]
    NotRegistered {
        /// The unknown id.
        id: PropertyId,
    },
    /// The typed handle does not match the registered value type.
    #[error("property '{name}' holds '{expected}', not '{found}'")]
    TypeMismatch {
        /// The property name.
        name: &'static str,
        /// The registered value type.
        expected: &'static str,
        /// The type that was supplied.
        found: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_property_and_owner() {
        let error = RegistrationError::DuplicateRegistration {
            name: "Opacity",
            owner: "Widget",
        };
        assert_eq!(
            error.to_string(),
            "property 'Opacity' is already registered on 'Widget'"
        );

        let error = RegistrationError::DuplicateStylingName {
            styling_name: String::from("font-size"),
            owner: "Text",
        };
        assert!(error.to_string().contains("font-size"));
        assert!(
            RegistrationError::TooManyProperties
                .to_string()
                .contains("65535")
        );
    }

    #[test]
    fn property_errors_display() {
        let error = PropertyError::ReadOnly { name: "IsFocused" };
        assert_eq!(error.to_string(), "property 'IsFocused' is read-only");
        let error = PropertyError::NotRegistered {
            id: PropertyId::new(9),
        };
        assert_eq!(error.to_string(), "PropertyId(9) is not registered");
    }
}
