// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use thiserror::Error;

use crate::id::RoutedEventId;

/// Errors raised while registering routed events or class handlers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EventRegistrationError {
    /// An event with this name already exists in the owner's domain.
    #[error("routed event '{name}' is already registered on '{owner}'")]
    DuplicateRegistration {
        /// The event name.
        name: &'static str,
        /// The owner type name.
        owner: &'static str,
    },
    /// An event with this styling name already exists in the owner's domain.
    #[error("styling name '{styling_name}' is already registered on '{owner}'")]
    DuplicateStylingName {
        /// The styling name.
        styling_name: String,
        /// The owner type name.
        owner: &'static str,
    },
    /// The id does not belong to this registry.
    #[error("{id} is not registered")]
    UnknownEvent {
        /// The unknown id.
        id: RoutedEventId,
    },
    /// A typed handle or handler disagrees with the event's payload type.
    #[error("routed event '{name}' carries '{expected}', not '{found}'")]
    TypeMismatch {
        /// The event name.
        name: &'static str,
        /// The registered payload type.
        expected: &'static str,
        /// The type that was supplied.
        found: &'static str,
    },
    /// Every event id is in use.
    #[error("too many routed events registered (max {max})", max = u16::MAX)]
    TooManyEvents,
}
