// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for binding compilation.

use thiserror::Error;
use understory_property::PropertyError;

use crate::expression::ExpressionError;

/// Errors raised when a binding is compiled or installed.
///
/// Every variant that comes from an expression carries its text, so a
/// template loader can point at the offending source.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The expression text does not parse.
    #[error("invalid binding expression '{text}': {source}")]
    InvalidExpression {
        /// The expression text.
        text: String,
        /// The parse failure.
        source: ExpressionError,
    },
    /// A segment names a member the data source type does not have, or the
    /// path passes through a type with no descriptor.
    #[error("cannot resolve binding expression '{text}': {reason}")]
    UnresolvableBindingExpression {
        /// The expression text.
        text: String,
        /// What could not be resolved.
        reason: String,
    },
    /// An event binding whose last segment is not a method taking exactly
    /// the event's argument types.
    #[error("cannot resolve event binding '{text}': {reason}")]
    CannotResolveBindingExpression {
        /// The expression text.
        text: String,
        /// What could not be resolved.
        reason: String,
    },
    /// The property store refused the bound value.
    #[error(transparent)]
    Property(#[from] PropertyError),
}

impl BindingError {
    /// Returns the expression text the error is about, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::InvalidExpression { text, .. }
            | Self::UnresolvableBindingExpression { text, .. }
            | Self::CannotResolveBindingExpression { text, .. } => Some(text),
            Self::Property(_) => None,
        }
    }

    pub(crate) fn unresolvable(text: &str, reason: impl Into<String>) -> Self {
        Self::UnresolvableBindingExpression {
            text: text.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn cannot_resolve(text: &str, reason: impl Into<String>) -> Self {
        Self::CannotResolveBindingExpression {
            text: text.to_owned(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_expression() {
        let err = BindingError::unresolvable("A.B", "type 'Root' has no member 'A'");
        assert_eq!(
            err.to_string(),
            "cannot resolve binding expression 'A.B': type 'Root' has no member 'A'"
        );
        assert_eq!(err.text(), Some("A.B"));

        let err = BindingError::InvalidExpression {
            text: "A.".into(),
            source: ExpressionError::ExpectedSegment { offset: 2 },
        };
        assert_eq!(
            err.to_string(),
            "invalid binding expression 'A.': expected a member name at offset 2"
        );
    }

    #[test]
    fn property_errors_pass_through() {
        let err = BindingError::from(PropertyError::ReadOnly { name: "IsFocused" });
        assert_eq!(err.text(), None);
        assert_eq!(err.to_string(), PropertyError::ReadOnly { name: "IsFocused" }.to_string());
    }
}
