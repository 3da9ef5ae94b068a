// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composite format strings and numeric format specifiers.
//!
//! A binding's trailing format segment is kept verbatim, so it arrives here as
//! something like `{0:F2}` or `Total: {0:N0} items`. Each `{index[:spec]}`
//! placeholder is replaced by the value formatted with `spec`; `{{` and `}}`
//! are literal braces; everything else is copied through. A format with no
//! placeholder at all is treated as a bare specifier.

use core::fmt::Write as _;

/// A numeric value in its widest lossless representation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Number {
    Signed(i128),
    Unsigned(u128),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Self::Signed(v) => v as f64,
            Self::Unsigned(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

/// Expands every placeholder in `format` with `render(spec)`.
pub(crate) fn expand(format: &str, render: &mut dyn FnMut(Option<&str>) -> String) -> String {
    if !format.contains(['{', '}']) {
        return render(Some(format));
    }
    let mut out = String::with_capacity(format.len() + 8);
    let mut chars = format.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            '{' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let Some(end) = format[start..].find('}') else {
                    out.push_str(&format[start..]);
                    break;
                };
                let inner = &format[start + 1..start + end];
                let spec = inner.split_once(':').map(|(_, spec)| spec);
                out.push_str(&render(spec.filter(|spec| !spec.is_empty())));
                while chars.peek().is_some_and(|&(i, _)| i <= start + end) {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Formats `value` with a standard numeric specifier such as `F2` or `X`.
///
/// Returns `None` for unknown specifiers and for specifiers that do not apply
/// to the value (`D` and `X` on floats); callers fall back to the natural
/// representation.
pub(crate) fn format_number(value: Number, spec: &str) -> Option<String> {
    let mut letters = spec.chars();
    let kind = letters.next()?;
    let digits = letters.as_str();
    let precision = if digits.is_empty() {
        None
    } else {
        Some(digits.parse::<usize>().ok()?.min(99))
    };

    let formatted = match kind {
        'F' | 'f' => format!("{:.*}", precision.unwrap_or(2), value.as_f64()),
        'N' | 'n' => group_thousands(&format!("{:.*}", precision.unwrap_or(2), value.as_f64())),
        'P' | 'p' => format!("{:.*}%", precision.unwrap_or(2), value.as_f64() * 100.0),
        'E' | 'e' => scientific(value.as_f64(), precision.unwrap_or(6), kind == 'E'),
        'G' | 'g' => general(value, precision.filter(|&p| p > 0), kind == 'G'),
        'D' | 'd' => {
            let width = precision.unwrap_or(0);
            match value {
                Number::Signed(v) if v < 0 => format!("-{:0width$}", v.unsigned_abs()),
                Number::Signed(v) => format!("{v:0width$}"),
                Number::Unsigned(v) => format!("{v:0width$}"),
                Number::Float(_) => return None,
            }
        }
        'X' | 'x' => {
            let width = precision.unwrap_or(0);
            let bits = match value {
                // Two's complement, 64 bits unless the value is wider.
                Number::Signed(v) if v < 0 => match i64::try_from(v) {
                    Ok(small) => u128::from(small.cast_unsigned()),
                    Err(_) => v.cast_unsigned(),
                },
                Number::Signed(v) => v.unsigned_abs(),
                Number::Unsigned(v) => v,
                Number::Float(_) => return None,
            };
            if kind == 'X' {
                format!("{bits:0width$X}")
            } else {
                format!("{bits:0width$x}")
            }
        }
        _ => return None,
    };
    Some(formatted)
}

fn scientific(value: f64, precision: usize, upper: bool) -> String {
    let rendered = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = rendered.split_once('e') else {
        return rendered;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mut out = String::with_capacity(rendered.len() + 4);
    out.push_str(mantissa);
    out.push(if upper { 'E' } else { 'e' });
    out.push(if exponent < 0 { '-' } else { '+' });
    let _ = write!(out, "{:03}", exponent.unsigned_abs());
    out
}

/// The shorter of fixed and scientific notation, with `precision`
/// significant digits (15 when unspecified). Trailing zeros are dropped.
fn general(value: Number, precision: Option<usize>, upper: bool) -> String {
    match (value, precision) {
        (Number::Signed(v), None) => return v.to_string(),
        (Number::Unsigned(v), None) => return v.to_string(),
        _ => {}
    }
    let value = value.as_f64();
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return String::from("0");
    }
    let significant = precision.unwrap_or(15);
    let rendered = format!("{:.*e}", significant - 1, value.abs());
    let Some((mantissa, exponent)) = rendered.split_once('e') else {
        return rendered;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let mut out = String::with_capacity(digits.len() + 8);
    if value < 0.0 {
        out.push('-');
    }
    let scientific = exponent < -5 || usize::try_from(exponent).is_ok_and(|e| e >= significant);
    if scientific {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push(if upper { 'E' } else { 'e' });
        out.push(if exponent < 0 { '-' } else { '+' });
        let _ = write!(out, "{:02}", exponent.unsigned_abs());
    } else if let Ok(whole) = usize::try_from(exponent) {
        let split = whole + 1;
        if digits.len() > split {
            out.push_str(&digits[..split]);
            out.push('.');
            out.push_str(&digits[split..]);
        } else {
            out.push_str(digits);
            out.extend(core::iter::repeat_n('0', split - digits.len()));
        }
    } else {
        out.push_str("0.");
        let leading = usize::try_from(-exponent - 1).unwrap_or(0);
        out.extend(core::iter::repeat_n('0', leading));
        out.push_str(digits);
    }
    out
}

fn group_thousands(fixed: &str) -> String {
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    let mut out = String::with_capacity(fixed.len() + integer.len() / 3);
    out.push_str(sign);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(format: &str, value: Number) -> String {
        expand(format, &mut |spec| {
            spec.and_then(|spec| format_number(value, spec))
                .unwrap_or_else(|| match value {
                    Number::Signed(v) => v.to_string(),
                    Number::Unsigned(v) => v.to_string(),
                    Number::Float(v) => v.to_string(),
                })
        })
    }

    #[test]
    fn fixed_and_grouped() {
        assert_eq!(number("{0:F2}", Number::Float(3.14159)), "3.14");
        assert_eq!(number("{0:F0}", Number::Signed(7)), "7");
        assert_eq!(number("{0:N0}", Number::Signed(1_234_567)), "1,234,567");
        assert_eq!(number("{0:N2}", Number::Float(-1234.5)), "-1,234.50");
        assert_eq!(number("{0:N}", Number::Unsigned(999)), "999.00");
    }

    #[test]
    fn integral_specifiers() {
        assert_eq!(number("{0:D4}", Number::Signed(42)), "0042");
        assert_eq!(number("{0:D4}", Number::Signed(-42)), "-0042");
        assert_eq!(number("{0:X}", Number::Unsigned(255)), "FF");
        assert_eq!(number("{0:x4}", Number::Signed(255)), "00ff");
        assert_eq!(number("{0:X}", Number::Signed(-1)), "FFFFFFFFFFFFFFFF");
        assert_eq!(number("{0:D}", Number::Float(1.5)), "1.5");
    }

    #[test]
    fn percent_and_scientific() {
        assert_eq!(number("{0:P0}", Number::Float(0.5)), "50%");
        assert_eq!(number("{0:P1}", Number::Float(0.125)), "12.5%");
        assert_eq!(number("{0:E2}", Number::Float(12345.0)), "1.23E+004");
        assert_eq!(number("{0:e3}", Number::Float(0.00125)), "1.250e-003");
    }

    #[test]
    fn literal_text_is_preserved() {
        assert_eq!(
            number("Total: {0:F1} ({{approx}})", Number::Float(2.5)),
            "Total: 2.5 ({approx})"
        );
        assert_eq!(number("{0}", Number::Signed(5)), "5");
        assert_eq!(number("{}", Number::Signed(5)), "5");
        assert_eq!(number("[{0", Number::Signed(5)), "[{0");
    }

    #[test]
    fn bare_specifier_and_unknown() {
        assert_eq!(number("F1", Number::Float(1.04)), "1.0");
        assert_eq!(number("{0:Q}", Number::Signed(5)), "5");
        assert_eq!(number("{0:G}", Number::Float(0.1)), "0.1");
        assert_eq!(number("{0:Gx}", Number::Float(0.1)), "0.1");
        assert_eq!(format_number(Number::Float(0.1), "X"), None);
        assert_eq!(number("{0:Fx}", Number::Float(0.1)), "0.1");
    }

    #[test]
    fn general_picks_the_shorter_form() {
        assert_eq!(number("{0:G3}", Number::Float(1234.5678)), "1.23E+03");
        assert_eq!(number("{0:g3}", Number::Float(1234.5678)), "1.23e+03");
        assert_eq!(number("{0:G}", Number::Float(1234.5678)), "1234.5678");
        assert_eq!(number("{0:G6}", Number::Float(-1234.5678)), "-1234.57");
        assert_eq!(number("{0:G}", Number::Float(1e20)), "1E+20");
        assert_eq!(number("{0:G}", Number::Float(0.00001)), "0.00001");
        assert_eq!(number("{0:G}", Number::Float(0.000001)), "1E-06");
        assert_eq!(number("{0:G}", Number::Float(0.1 + 0.2)), "0.3");
        assert_eq!(number("{0:G}", Number::Signed(-42)), "-42");
        assert_eq!(number("{0:G2}", Number::Unsigned(12_345)), "1.2E+04");
        assert_eq!(number("{0:G}", Number::Float(0.0)), "0");
        assert_eq!(number("{0:G4}", Number::Float(100.0)), "100");
    }
}
