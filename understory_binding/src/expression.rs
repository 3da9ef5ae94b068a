// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding expression parsing.
//!
//! ```text
//! expression := segment ('.' segment)* ('{' format '}')?
//! segment    := [A-Za-z_][A-Za-z0-9_]*
//! ```
//!
//! The whole expression may be wrapped in `{{ }}`, as it appears in template
//! text. The format segment is kept verbatim; see
//! [`ValueConverter::format`](understory_reflect::ValueConverter::format) for
//! what it may contain.

use core::fmt;
use core::str::FromStr;

use smallvec::SmallVec;
use thiserror::Error;

/// Why a binding expression failed to parse.
///
/// Offsets are byte offsets into the text given to [`BindingExpression::parse`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The expression has no path.
    #[error("binding expression is empty")]
    Empty,
    /// The text ended where a member name was expected.
    #[error("expected a member name at offset {offset}")]
    ExpectedSegment {
        /// Byte offset of the missing segment.
        offset: usize,
    },
    /// A character that cannot appear at this position.
    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedCharacter {
        /// The offending character.
        found: char,
        /// Byte offset of the character.
        offset: usize,
    },
    /// A `{` format segment that does not end with `}`.
    #[error("format segment at offset {offset} is not closed")]
    UnterminatedFormat {
        /// Byte offset of the opening brace.
        offset: usize,
    },
    /// A `{}` format segment with nothing inside.
    #[error("format segment at offset {offset} is empty")]
    EmptyFormat {
        /// Byte offset of the opening brace.
        offset: usize,
    },
    /// A `{{` wrapper without its closing `}}`.
    #[error("'{{{{' at offset {offset} is not closed")]
    UnterminatedWrapper {
        /// Byte offset of the opening braces.
        offset: usize,
    },
}

impl ExpressionError {
    /// Returns the byte offset the error points at.
    #[must_use]
    pub fn offset(&self) -> usize {
        match *self {
            Self::Empty => 0,
            Self::ExpectedSegment { offset }
            | Self::UnexpectedCharacter { offset, .. }
            | Self::UnterminatedFormat { offset }
            | Self::EmptyFormat { offset }
            | Self::UnterminatedWrapper { offset } => offset,
        }
    }
}

/// The parsed form of a binding string such as `"ViewModel.Total{0:N2}"`.
///
/// A path with N segments reads N-1 intermediate objects, each of which may
/// be null, and then reads, writes, or invokes the last segment.
///
/// # Example
///
/// ```rust
/// use understory_binding::BindingExpression;
///
/// let expression = BindingExpression::parse("{{ Order.Total{0:N2} }}").unwrap();
/// assert_eq!(expression.segments().collect::<Vec<_>>(), ["Order", "Total"]);
/// assert_eq!(expression.last_segment(), "Total");
/// assert_eq!(expression.format(), Some("0:N2"));
///
/// let err = BindingExpression::parse("Order..Total").unwrap_err();
/// assert_eq!(err.offset(), 6);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingExpression {
    text: Box<str>,
    path: SmallVec<[Box<str>; 4]>,
    format: Option<Box<str>>,
}

impl BindingExpression {
    /// Parses `text`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] pointing at the first offending byte.
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let (body, base) = unwrap(text)?;
        let bytes = body.as_bytes();
        let mut pos = body.len() - body.trim_start().len();
        if body[pos..].trim_end().is_empty() {
            return Err(ExpressionError::Empty);
        }

        let mut path = SmallVec::new();
        loop {
            let start = pos;
            match body[pos..].chars().next() {
                Some(c) if c == '_' || c.is_ascii_alphabetic() => pos += 1,
                Some(found) => {
                    return Err(ExpressionError::UnexpectedCharacter {
                        found,
                        offset: base + pos,
                    });
                }
                None => return Err(ExpressionError::ExpectedSegment { offset: base + pos }),
            }
            while bytes
                .get(pos)
                .is_some_and(|&b| b == b'_' || b.is_ascii_alphanumeric())
            {
                pos += 1;
            }
            path.push(body[start..pos].into());
            if bytes.get(pos) != Some(&b'.') {
                break;
            }
            pos += 1;
        }

        let rest = &body[pos..];
        pos += rest.len() - rest.trim_start().len();
        let rest = rest.trim();
        let format = match rest.chars().next() {
            None => None,
            Some('{') => {
                let Some(inner) = rest.strip_prefix('{').and_then(|r| r.strip_suffix('}')) else {
                    return Err(ExpressionError::UnterminatedFormat { offset: base + pos });
                };
                if inner.is_empty() {
                    return Err(ExpressionError::EmptyFormat { offset: base + pos });
                }
                Some(inner.into())
            }
            Some(found) => {
                return Err(ExpressionError::UnexpectedCharacter {
                    found,
                    offset: base + pos,
                });
            }
        };

        Ok(Self {
            text: text.into(),
            path,
            format,
        })
    }

    /// Returns the text this expression was parsed from.
    #[must_use]
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the path segments in order.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.path.iter().map(|segment| &**segment)
    }

    /// Returns the number of path segments. Always at least one.
    #[must_use]
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.path.len()
    }

    /// Returns the segments read before the last one.
    pub fn parents(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.path[..self.path.len() - 1].iter().map(|segment| &**segment)
    }

    /// Returns the segment that is read, written, or invoked.
    #[must_use]
    pub fn last_segment(&self) -> &str {
        self.path.last().map_or("", |segment| &**segment)
    }

    /// Returns the verbatim format segment, without its braces.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}

impl FromStr for BindingExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BindingExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Strips an optional `{{ }}` wrapper, returning the body and its offset.
fn unwrap(text: &str) -> Result<(&str, usize), ExpressionError> {
    let leading = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("{{") else {
        return Ok((text, 0));
    };
    match inner.strip_suffix("}}") {
        Some(body) => Ok((body, leading + 2)),
        None => Err(ExpressionError::UnterminatedWrapper { offset: leading }),
    }
}
