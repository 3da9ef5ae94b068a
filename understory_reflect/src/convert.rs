// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lenient value conversion.
//!
//! [`ValueConverter`] converts between the member types of data sources and the
//! value types of properties. It never fails: a combination it cannot convert
//! degrades to the target's registered default (or null when none is
//! registered), so malformed user input such as a half-typed number does not
//! interrupt the frame loop.
//!
//! The steps, in order:
//!
//! 1. A `String` target (or [`ConversionTarget::Any`] with object-to-string
//!    coercion) formats the value through the format string or the value's
//!    natural string. Null stays null.
//! 2. [`ConversionTarget::Any`] without coercion passes the value through.
//! 3. Null becomes the target default.
//! 4. A registered [`TypeConverter`] for the target that accepts the source
//!    type and reports the value valid converts it. A blank string headed for
//!    a numeric target is treated as invalid without asking the converter.
//! 5. A value already of the target type passes through.
//! 6. Everything else becomes the target default.

use core::any::TypeId;
use core::fmt;
use core::marker::PhantomData;
use core::str::FromStr;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::format::{Number, expand, format_number};
use crate::value::{Bindable, ErasedValue};

/// The type a conversion should produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConversionTarget {
    /// A concrete type.
    Type(TypeId),
    /// Any type; used for properties holding an [`ErasedValue`].
    Any,
}

impl ConversionTarget {
    /// Returns the target for a property of type `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        if TypeId::of::<T>() == TypeId::of::<ErasedValue>() {
            Self::Any
        } else {
            Self::Type(TypeId::of::<T>())
        }
    }
}

/// Converts values of some source types into one target type.
pub trait TypeConverter: Send + Sync {
    /// Returns `true` if values of `source` type can be offered to this converter.
    fn can_convert_from(&self, source: TypeId) -> bool;

    /// Returns `true` if `value` would convert successfully.
    fn is_valid(&self, value: &ErasedValue) -> bool;

    /// Converts `value`, returning `None` if it cannot be converted.
    fn convert_from(&self, value: &ErasedValue) -> Option<ErasedValue>;

    /// Returns `true` for numeric targets, which treat blank strings as invalid.
    fn is_numeric(&self) -> bool {
        false
    }
}

type Formatter = Arc<dyn Fn(&ErasedValue, Option<&str>) -> Option<String> + Send + Sync>;
type DefaultFactory = Arc<dyn Fn() -> ErasedValue + Send + Sync>;

/// Converts erased values between types. See the [module docs](self).
///
/// `ValueConverter::default()` knows every primitive number type, `bool`,
/// `char`, and `String`.
///
/// # Example
///
/// ```rust
/// use understory_reflect::{ErasedValue, ValueConverter};
///
/// let converter = ValueConverter::default();
///
/// let text = ErasedValue::new(String::from("42"));
/// assert_eq!(converter.convert::<i32>(Some(&text), None, false), 42);
///
/// let half = ErasedValue::new(0.5_f64);
/// assert_eq!(converter.convert::<String>(Some(&half), Some("{0:P0}"), false), "50%");
///
/// // Unconvertible input degrades to the default.
/// let junk = ErasedValue::new(String::from("4x"));
/// assert_eq!(converter.convert::<i32>(Some(&junk), None, false), 0);
/// ```
pub struct ValueConverter {
    converters: HashMap<TypeId, Arc<dyn TypeConverter>>,
    formatters: HashMap<TypeId, Formatter>,
    defaults: HashMap<TypeId, DefaultFactory>,
}

impl ValueConverter {
    /// Creates a converter with no built-in knowledge at all.
    ///
    /// Most callers want [`ValueConverter::default`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
            formatters: HashMap::new(),
            defaults: HashMap::new(),
        }
    }

    /// Registers the converter used for target type `T`, replacing any existing one.
    pub fn register_converter<T: 'static>(&mut self, converter: impl TypeConverter + 'static) {
        self.converters
            .insert(TypeId::of::<T>(), Arc::new(converter));
    }

    /// Uses `T`'s [`Display`](fmt::Display) implementation as its natural string.
    pub fn register_display<T: Bindable + fmt::Display>(&mut self) {
        self.formatters.insert(
            TypeId::of::<T>(),
            Arc::new(|value: &ErasedValue, _: Option<&str>| {
                value.downcast_ref::<T>().map(ToString::to_string)
            }),
        );
    }

    /// Registers `T::default()` as the value unconvertible input degrades to.
    pub fn register_default<T: Bindable + Default>(&mut self) {
        self.defaults
            .insert(TypeId::of::<T>(), Arc::new(|| ErasedValue::new(T::default())));
    }

    /// Returns `true` if a converter is registered for `target`.
    #[must_use]
    pub fn has_converter(&self, target: TypeId) -> bool {
        self.converters.contains_key(&target)
    }

    /// Returns the registered default for `target`, or `None` (null).
    #[must_use]
    pub fn default_for(&self, target: TypeId) -> Option<ErasedValue> {
        self.defaults.get(&target).map(|factory| factory())
    }

    /// Converts `value` (where `None` is null) to `to`.
    #[must_use]
    pub fn convert_erased(
        &self,
        value: Option<&ErasedValue>,
        to: ConversionTarget,
        format: Option<&str>,
        coerce_object_to_string: bool,
    ) -> Option<ErasedValue> {
        let target = match to {
            ConversionTarget::Type(target) if target == TypeId::of::<String>() => {
                return value.map(|value| ErasedValue::new(self.format(value, format)));
            }
            ConversionTarget::Any if coerce_object_to_string => {
                return value.map(|value| ErasedValue::new(self.format(value, format)));
            }
            ConversionTarget::Any => return value.cloned(),
            ConversionTarget::Type(target) => target,
        };

        let Some(value) = value else {
            return self.default_for(target);
        };

        if let Some(converter) = self.converters.get(&target)
            && converter.can_convert_from(value.type_id())
        {
            let blank = converter.is_numeric() && text_of(value).is_some_and(is_blank);
            if !blank
                && converter.is_valid(value)
                && let Some(converted) = converter.convert_from(value)
            {
                return Some(converted);
            }
        }

        if value.type_id() == target {
            return Some(value.clone());
        }

        tracing::trace!(from = value.type_name(), "conversion fell back to the default");
        self.default_for(target)
    }

    /// Converts `value` to `T`, falling back to `T::default()`.
    #[must_use]
    pub fn convert<T: Bindable + Default>(
        &self,
        value: Option<&ErasedValue>,
        format: Option<&str>,
        coerce_object_to_string: bool,
    ) -> T {
        self.convert_erased(value, ConversionTarget::of::<T>(), format, coerce_object_to_string)
            .and_then(ErasedValue::into_value)
            .unwrap_or_default()
    }

    /// Formats `value` as a string, through `format` when one is given.
    #[must_use]
    pub fn format(&self, value: &ErasedValue, format: Option<&str>) -> String {
        let formatter = self.formatters.get(&value.type_id());
        let mut render = |spec: Option<&str>| {
            formatter
                .and_then(|formatter| formatter(value, spec))
                .unwrap_or_else(|| value.type_name().to_owned())
        };
        match format {
            Some(format) => expand(format, &mut render),
            None => render(None),
        }
    }

    fn register_builtin<T: Bindable + Default>(
        &mut self,
        converter: impl TypeConverter + 'static,
        formatter: Formatter,
    ) {
        self.register_converter::<T>(converter);
        self.formatters.insert(TypeId::of::<T>(), formatter);
        self.register_default::<T>();
    }

    fn register_number<T: Numeric>(&mut self) {
        self.register_builtin::<T>(
            NumericConverter::<T>(PhantomData),
            Arc::new(|value: &ErasedValue, spec: Option<&str>| {
                let value = value.downcast_ref::<T>()?;
                Some(match spec {
                    Some(spec) => format_number(value.to_number(), spec)
                        .unwrap_or_else(|| value.to_string()),
                    None => value.to_string(),
                })
            }),
        );
    }
}

impl Default for ValueConverter {
    fn default() -> Self {
        let mut converter = Self::empty();
        converter.register_number::<i8>();
        converter.register_number::<i16>();
        converter.register_number::<i32>();
        converter.register_number::<i64>();
        converter.register_number::<i128>();
        converter.register_number::<isize>();
        converter.register_number::<u8>();
        converter.register_number::<u16>();
        converter.register_number::<u32>();
        converter.register_number::<u64>();
        converter.register_number::<u128>();
        converter.register_number::<usize>();
        converter.register_number::<f32>();
        converter.register_number::<f64>();
        converter.register_builtin::<bool>(
            ParseConverter::<bool>::new(|text| {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }),
            display_formatter::<bool>(),
        );
        converter.register_builtin::<char>(
            ParseConverter::<char>::new(|text| {
                let mut chars = text.chars();
                let first = chars.next()?;
                chars.next().is_none().then_some(first)
            }),
            display_formatter::<char>(),
        );
        converter.formatters.insert(
            TypeId::of::<String>(),
            Arc::new(|value: &ErasedValue, _: Option<&str>| {
                value.downcast_ref::<String>().cloned()
            }),
        );
        converter.formatters.insert(
            TypeId::of::<&'static str>(),
            Arc::new(|value: &ErasedValue, _: Option<&str>| {
                value.downcast_ref::<&'static str>().map(|s| (*s).to_owned())
            }),
        );
        converter.register_default::<String>();
        converter
    }
}

impl fmt::Debug for ValueConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueConverter")
            .field("converters", &self.converters.len())
            .field("formatters", &self.formatters.len())
            .field("defaults", &self.defaults.len())
            .finish()
    }
}

fn display_formatter<T: Bindable + fmt::Display>() -> Formatter {
    Arc::new(|value: &ErasedValue, _: Option<&str>| {
        value.downcast_ref::<T>().map(ToString::to_string)
    })
}

fn text_of(value: &ErasedValue) -> Option<&str> {
    value
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| value.downcast_ref::<&'static str>().copied())
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn is_text(source: TypeId) -> bool {
    source == TypeId::of::<String>() || source == TypeId::of::<&'static str>()
}

/// Converts text with a parse function.
struct ParseConverter<T> {
    parse: fn(&str) -> Option<T>,
}

impl<T> ParseConverter<T> {
    fn new(parse: fn(&str) -> Option<T>) -> Self {
        Self { parse }
    }
}

impl<T: Bindable> TypeConverter for ParseConverter<T> {
    fn can_convert_from(&self, source: TypeId) -> bool {
        is_text(source)
    }

    fn is_valid(&self, value: &ErasedValue) -> bool {
        text_of(value).and_then(self.parse).is_some()
    }

    fn convert_from(&self, value: &ErasedValue) -> Option<ErasedValue> {
        text_of(value).and_then(self.parse).map(ErasedValue::new)
    }
}

/// Primitive number types.
trait Numeric: Bindable + Default + FromStr + fmt::Display {
    fn to_number(&self) -> Number;
    fn from_number(number: Number) -> Option<Self>;
}

macro_rules! impl_integer {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl Numeric for $ty {
                fn to_number(&self) -> Number {
                    Number::$variant((*self).try_into().unwrap_or_default())
                }

                fn from_number(number: Number) -> Option<Self> {
                    match number {
                        Number::Signed(v) => v.try_into().ok(),
                        Number::Unsigned(v) => v.try_into().ok(),
                        Number::Float(v) => float_to_integer(v).and_then(|v| v.try_into().ok()),
                    }
                }
            }
        )+
    };
}

impl_integer!(Signed: i8, i16, i32, i64, i128, isize);
impl_integer!(Unsigned: u8, u16, u32, u64, u128, usize);

/// Truncates toward zero; `None` for non-finite or out-of-range values.
fn float_to_integer(value: f64) -> Option<i128> {
    const LIMIT: f64 = 1.7e38;
    let truncated = value.trunc();
    if !truncated.is_finite() || truncated.abs() >= LIMIT {
        return None;
    }
    #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
    let whole = truncated as i128;
    Some(whole)
}

impl Numeric for f64 {
    fn to_number(&self) -> Number {
        Number::Float(*self)
    }

    fn from_number(number: Number) -> Option<Self> {
        Some(match number {
            Number::Signed(v) => v as Self,
            Number::Unsigned(v) => v as Self,
            Number::Float(v) => v,
        })
    }
}

impl Numeric for f32 {
    fn to_number(&self) -> Number {
        Number::Float(f64::from(*self))
    }

    #[expect(clippy::cast_possible_truncation, reason = "narrowing to f32 is the conversion")]
    fn from_number(number: Number) -> Option<Self> {
        Some(match number {
            Number::Signed(v) => v as Self,
            Number::Unsigned(v) => v as Self,
            Number::Float(v) => v as Self,
        })
    }
}

fn number_of(value: &ErasedValue) -> Option<Number> {
    macro_rules! try_types {
        ($($ty:ty),+) => {
            $(
                if let Some(v) = value.downcast_ref::<$ty>() {
                    return Some(v.to_number());
                }
            )+
        };
    }
    try_types!(i32, f64, f32, i64, u32, u64, u8, i8, i16, u16, i128, u128, isize, usize);
    None
}

struct NumericConverter<T>(PhantomData<fn() -> T>);

impl<T: Numeric> NumericConverter<T> {
    fn parse(&self, value: &ErasedValue) -> Option<T> {
        if let Some(text) = text_of(value) {
            return text.trim().parse().ok();
        }
        number_of(value).and_then(T::from_number)
    }
}

impl<T: Numeric> TypeConverter for NumericConverter<T> {
    fn can_convert_from(&self, source: TypeId) -> bool {
        is_text(source) || NUMERIC_TYPES.iter().any(|id| id() == source)
    }

    fn is_valid(&self, value: &ErasedValue) -> bool {
        self.parse(value).is_some()
    }

    fn convert_from(&self, value: &ErasedValue) -> Option<ErasedValue> {
        self.parse(value).map(ErasedValue::new)
    }

    fn is_numeric(&self) -> bool {
        true
    }
}

const NUMERIC_TYPES: [fn() -> TypeId; 14] = [
    TypeId::of::<i8>,
    TypeId::of::<i16>,
    TypeId::of::<i32>,
    TypeId::of::<i64>,
    TypeId::of::<i128>,
    TypeId::of::<isize>,
    TypeId::of::<u8>,
    TypeId::of::<u16>,
    TypeId::of::<u32>,
    TypeId::of::<u64>,
    TypeId::of::<u128>,
    TypeId::of::<usize>,
    TypeId::of::<f32>,
    TypeId::of::<f64>,
];
