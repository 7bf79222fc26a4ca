//! Numeric promotion, number extraction and number formatting.

use core::ffi::c_long;

use dynvar_core::{
    CChar, CborSimpleType, CborValue, JsonValue, Long, MetaTypeId, ULong,
};

use crate::Variant;

/// Whether text may stand in for a boolean when extracting a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringToBool {
    /// Only numeric text parses.
    #[default]
    Strict,
    /// `"true"` and `"1"` read as 1, `"false"` and `"0"` as 0.
    Allow,
}

const fn family(ids: &[MetaTypeId]) -> u64 {
    let mut bits = 0;
    let mut i = 0;
    while i < ids.len() {
        bits |= 1 << ids[i].0;
        i += 1;
    }
    bits
}

/// Types compared as numbers when their types differ.
const NUMERIC_FAMILY: u64 = family(&[
    MetaTypeId::STRING,
    MetaTypeId::BOOL,
    MetaTypeId::DOUBLE,
    MetaTypeId::FLOAT,
    MetaTypeId::C_CHAR,
    MetaTypeId::SCHAR,
    MetaTypeId::UCHAR,
    MetaTypeId::SHORT,
    MetaTypeId::USHORT,
    MetaTypeId::INT,
    MetaTypeId::UINT,
    MetaTypeId::LONG,
    MetaTypeId::ULONG,
    MetaTypeId::LONG_LONG,
    MetaTypeId::ULONG_LONG,
]);

/// Whether `id` takes part in cross-type numeric comparison.
pub fn is_numeric_type(id: MetaTypeId) -> bool {
    id.0 < u64::BITS && NUMERIC_FAMILY & (1 << id.0) != 0
}

/// The type two numeric operands are compared in.
///
/// Follows C arithmetic promotion, except that text paired with a boolean
/// compares as a boolean and any floating point operand promotes to
/// [`MetaTypeId::DOUBLE`].
pub fn numeric_type_promotion(a: MetaTypeId, b: MetaTypeId) -> MetaTypeId {
    use MetaTypeId as T;

    if matches!((a, b), (T::BOOL, T::STRING) | (T::STRING, T::BOOL)) {
        return T::BOOL;
    }
    if [a, b].iter().any(|id| matches!(*id, T::DOUBLE | T::FLOAT)) {
        return T::DOUBLE;
    }

    let rank = |id: MetaTypeId| match id {
        T::BOOL | T::C_CHAR | T::SCHAR | T::UCHAR | T::SHORT | T::USHORT => T::INT,
        T::LONG if size_of::<c_long>() == size_of::<i32>() => T::INT,
        T::LONG => T::LONG_LONG,
        T::ULONG if size_of::<c_long>() == size_of::<i32>() => T::UINT,
        T::ULONG => T::ULONG_LONG,
        other => other,
    };
    let (a, b) = (rank(a), rank(b));
    [T::ULONG_LONG, T::LONG_LONG, T::UINT]
        .into_iter()
        .find(|id| a == *id || b == *id)
        .unwrap_or(T::INT)
}

pub(crate) fn is_signed_kind(id: MetaTypeId) -> bool {
    matches!(
        id,
        MetaTypeId::INT
            | MetaTypeId::LONG_LONG
            | MetaTypeId::SHORT
            | MetaTypeId::SCHAR
            | MetaTypeId::C_CHAR
            | MetaTypeId::LONG
    )
}

pub(crate) fn is_unsigned_kind(id: MetaTypeId) -> bool {
    matches!(
        id,
        MetaTypeId::UINT
            | MetaTypeId::ULONG_LONG
            | MetaTypeId::USHORT
            | MetaTypeId::UCHAR
            | MetaTypeId::ULONG
    )
}

fn round(d: f64) -> i64 {
    d.round_ties_even() as i64
}

fn parse_i64(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

fn parse_u64(text: &str) -> Option<u64> {
    text.trim().parse().ok()
}

fn parse_f64(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}

fn json_integer(value: &JsonValue) -> Option<i64> {
    let number = value.as_number()?;
    number.as_i64().or_else(|| number.as_f64().map(|d| d as i64))
}

/// Reads an unsigned kind without conversion.
fn unsigned_value(value: &Variant) -> Option<u64> {
    match value.type_id() {
        MetaTypeId::UINT => value.get::<u32>().map(|n| u64::from(*n)),
        MetaTypeId::ULONG_LONG => value.get::<u64>().copied(),
        MetaTypeId::UCHAR => value.get::<u8>().map(|n| u64::from(*n)),
        MetaTypeId::USHORT => value.get::<u16>().map(|n| u64::from(*n)),
        MetaTypeId::ULONG => value.get::<ULong>().map(|n| u64::from(n.0)),
        _ => None,
    }
}

/// Reads a signed kind without conversion.
fn signed_value(value: &Variant) -> Option<i64> {
    match value.type_id() {
        MetaTypeId::INT => value.get::<i32>().map(|n| i64::from(*n)),
        MetaTypeId::LONG_LONG => value.get::<i64>().copied(),
        MetaTypeId::SHORT => value.get::<i16>().map(|n| i64::from(*n)),
        MetaTypeId::SCHAR => value.get::<i8>().map(|n| i64::from(*n)),
        MetaTypeId::C_CHAR => value.get::<CChar>().map(|c| i64::from(c.0)),
        MetaTypeId::LONG => value.get::<Long>().map(|n| i64::from(n.0)),
        _ => None,
    }
}

/// Integral value of an enumeration or a CBOR simple type.
fn enum_value(value: &Variant) -> Option<i64> {
    if let Some(simple) = value.get::<CborSimpleType>() {
        return Some(i64::from(simple.0));
    }
    let ops = value.info?.vtable.enumeration?;
    Some((ops.to_i64)(value.payload()?))
}

/// The value as a signed 64-bit integer.
///
/// Text is trimmed and parsed; with [`StringToBool::Allow`] the boolean
/// words parse too. Floating point values round half to even, JSON
/// numbers truncate, and unsigned kinds keep their bits.
pub fn to_number(value: &Variant, mode: StringToBool) -> Option<i64> {
    match value.type_id() {
        MetaTypeId::STRING => {
            let text = value.get::<String>()?;
            parse_i64(text).or_else(|| match (mode, text.as_str()) {
                (StringToBool::Allow, "true" | "1") => Some(1),
                (StringToBool::Allow, "false" | "0") => Some(0),
                _ => None,
            })
        }
        MetaTypeId::CHAR => value.get::<char>().map(|c| i64::from(u32::from(*c))),
        MetaTypeId::BYTE_ARRAY => parse_i64(core::str::from_utf8(value.get::<Vec<u8>>()?).ok()?),
        MetaTypeId::BOOL => value.get::<bool>().map(|b| i64::from(*b)),
        MetaTypeId::DOUBLE => value.get::<f64>().map(|d| round(*d)),
        MetaTypeId::FLOAT => value.get::<f32>().map(|f| round(f64::from(*f))),
        MetaTypeId::JSON_VALUE => json_integer(value.get::<JsonValue>()?),
        MetaTypeId::CBOR_VALUE => value.get::<CborValue>()?.to_integer(),
        _ => signed_value(value)
            .or_else(|| unsigned_value(value).map(|n| n as i64))
            .or_else(|| enum_value(value)),
    }
}

/// The value as an unsigned 64-bit integer. Negative numbers keep their
/// two's complement bits; negative text does not parse.
pub fn to_unsigned_number(value: &Variant) -> Option<u64> {
    match value.type_id() {
        MetaTypeId::STRING => parse_u64(value.get::<String>()?),
        MetaTypeId::BYTE_ARRAY => parse_u64(core::str::from_utf8(value.get::<Vec<u8>>()?).ok()?),
        _ => unsigned_value(value).or_else(|| to_number(value, StringToBool::Strict).map(|n| n as u64)),
    }
}

/// The value as a double.
pub fn to_real(value: &Variant) -> Option<f64> {
    match value.type_id() {
        MetaTypeId::DOUBLE => value.get::<f64>().copied(),
        MetaTypeId::FLOAT => value.get::<f32>().map(|f| f64::from(*f)),
        MetaTypeId::STRING => parse_f64(value.get::<String>()?),
        MetaTypeId::BYTE_ARRAY => parse_f64(core::str::from_utf8(value.get::<Vec<u8>>()?).ok()?),
        MetaTypeId::JSON_VALUE => value.get::<JsonValue>()?.as_f64(),
        MetaTypeId::CBOR_VALUE => value.get::<CborValue>()?.to_double(),
        _ => unsigned_value(value)
            .map(|n| n as f64)
            .or_else(|| to_number(value, StringToBool::Strict).map(|n| n as f64)),
    }
}

/// Whether two doubles are equal up to about twelve significant digits.
pub(crate) fn fuzzy_compare(a: f64, b: f64) -> bool {
    (a - b).abs() * 1e12 <= a.abs().min(b.abs())
}

/// Formats a double with the fewest digits that read back to the same
/// value, switching to exponent form like C's `%g`.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.into();
    }
    shortest_g(&format!("{value:e}"))
}

/// [`format_double`] for single precision: digits are shortest for `f32`.
pub fn format_float(value: f32) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.into();
    }
    shortest_g(&format!("{value:e}"))
}

/// Rewrites Rust's shortest exponent form (`-1.25e-7`) in `%g` style.
fn shortest_g(scientific: &str) -> String {
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let precision = i32::try_from(digits.len()).unwrap_or(i32::MAX).max(6);

    let mut out = String::from(sign);
    if exponent < -4 || exponent >= precision {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        out.push_str(&format!("e{exp_sign}{:02}", exponent.unsigned_abs()));
    } else if exponent < 0 {
        out.push_str("0.");
        for _ in 0..(-exponent - 1) {
            out.push('0');
        }
        out.push_str(&digits);
    } else {
        let int_len = exponent as usize + 1;
        if digits.len() <= int_len {
            out.push_str(&digits);
            for _ in digits.len()..int_len {
                out.push('0');
            }
        } else {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use MetaTypeId as T;

    #[test]
    fn promotion_rules() {
        dynvar_testhelpers::setup();
        assert_eq!(numeric_type_promotion(T::BOOL, T::STRING), T::BOOL);
        assert_eq!(numeric_type_promotion(T::FLOAT, T::INT), T::DOUBLE);
        assert_eq!(numeric_type_promotion(T::FLOAT, T::DOUBLE), T::DOUBLE);
        assert_eq!(numeric_type_promotion(T::SHORT, T::UCHAR), T::INT);
        assert_eq!(numeric_type_promotion(T::BOOL, T::INT), T::INT);
        assert_eq!(numeric_type_promotion(T::INT, T::UINT), T::UINT);
        assert_eq!(numeric_type_promotion(T::UINT, T::LONG_LONG), T::LONG_LONG);
        assert_eq!(numeric_type_promotion(T::LONG_LONG, T::ULONG_LONG), T::ULONG_LONG);
        assert_eq!(numeric_type_promotion(T::STRING, T::INT), T::INT);

        let long = if size_of::<c_long>() == 4 { T::INT } else { T::LONG_LONG };
        assert_eq!(numeric_type_promotion(T::LONG, T::SHORT), long);
    }

    #[test]
    fn promotion_is_symmetric() {
        dynvar_testhelpers::setup();
        let family = [
            T::STRING, T::BOOL, T::DOUBLE, T::FLOAT, T::C_CHAR, T::SCHAR, T::UCHAR, T::SHORT,
            T::USHORT, T::INT, T::UINT, T::LONG, T::ULONG, T::LONG_LONG, T::ULONG_LONG,
        ];
        for a in family {
            assert!(is_numeric_type(a));
            for b in family {
                assert_eq!(numeric_type_promotion(a, b), numeric_type_promotion(b, a), "{a:?} {b:?}");
            }
        }
        assert!(!is_numeric_type(T::CHAR));
        assert!(!is_numeric_type(T::USER));
    }

    #[test]
    fn text_extraction() {
        dynvar_testhelpers::setup();
        assert_eq!(to_number(&Variant::from(" 42 "), StringToBool::Strict), Some(42));
        assert_eq!(to_number(&Variant::from("true"), StringToBool::Strict), None);
        assert_eq!(to_number(&Variant::from("true"), StringToBool::Allow), Some(1));
        assert_eq!(to_number(&Variant::from("false"), StringToBool::Allow), Some(0));
        assert_eq!(to_number(&Variant::from("abc"), StringToBool::Allow), None);
        assert_eq!(to_unsigned_number(&Variant::from("-1")), None);
        assert_eq!(to_real(&Variant::from("2.5")), Some(2.5));
    }

    #[test]
    fn float_extraction_rounds_half_to_even() {
        dynvar_testhelpers::setup();
        assert_eq!(to_number(&Variant::from(2.5), StringToBool::Strict), Some(2));
        assert_eq!(to_number(&Variant::from(3.5), StringToBool::Strict), Some(4));
        assert_eq!(to_number(&Variant::from(-2.5f32), StringToBool::Strict), Some(-2));
    }

    #[test]
    fn document_numbers() {
        dynvar_testhelpers::setup();
        let json = Variant::from(serde_json::json!(2.9));
        assert_eq!(to_number(&json, StringToBool::Strict), Some(2));
        assert_eq!(to_real(&json), Some(2.9));
        assert_eq!(to_number(&Variant::from(serde_json::json!("2")), StringToBool::Strict), None);
        assert_eq!(to_number(&Variant::from(CborValue::Integer(-3)), StringToBool::Strict), Some(-3));
    }

    #[test]
    fn unsigned_keeps_bits() {
        dynvar_testhelpers::setup();
        assert_eq!(to_number(&Variant::from(u64::MAX), StringToBool::Strict), Some(-1));
        assert_eq!(to_unsigned_number(&Variant::from(-1i32)), Some(u64::MAX));
        assert_eq!(to_real(&Variant::from(u64::MAX)), Some(u64::MAX as f64));
    }

    #[test]
    fn shortest_formatting() {
        assert_eq!(format_double(3.14), "3.14");
        assert_eq!(format_double(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_double(100000.0), "100000");
        assert_eq!(format_double(1e6), "1e+06");
        assert_eq!(format_double(1234567.0), "1234567");
        assert_eq!(format_double(0.0001), "0.0001");
        assert_eq!(format_double(0.00001), "1e-05");
        assert_eq!(format_double(-1.5e-7), "-1.5e-07");
        assert_eq!(format_double(1e300), "1e+300");
        assert_eq!(format_double(0.0), "0");
        assert_eq!(format_double(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(16777216.0), "16777216");
    }
}
