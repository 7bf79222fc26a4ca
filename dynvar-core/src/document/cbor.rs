//! The binary document model and its RFC 8949 encoding.
//!
//! Only definite-length items are produced or accepted; that is all the
//! stream format ever writes.

use core::fmt;

use crate::container::{Cursor, IterCapabilities, SequentialContainer, SliceCursor};
use crate::stream::{StreamReader, StreamStatus, StreamWriter, Streamable};

/// A CBOR simple value (major type 7, no payload).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CborSimpleType(pub u8);

impl CborSimpleType {
    /// `false`
    pub const FALSE: CborSimpleType = CborSimpleType(20);
    /// `true`
    pub const TRUE: CborSimpleType = CborSimpleType(21);
    /// `null`
    pub const NULL: CborSimpleType = CborSimpleType(22);
    /// `undefined`
    pub const UNDEFINED: CborSimpleType = CborSimpleType(23);
}

/// Any CBOR data item.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CborValue {
    /// `undefined`; what an unset value holds.
    #[default]
    Undefined,
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// Any integer that fits an `i64`.
    Integer(i64),
    /// Floating point, including integers outside the `i64` range.
    Double(f64),
    /// Byte string.
    ByteArray(Vec<u8>),
    /// Text string.
    String(String),
    /// Array.
    Array(CborArray),
    /// Map.
    Map(CborMap),
    /// A simple value other than the four named ones.
    SimpleType(CborSimpleType),
    /// A tagged item.
    Tagged(u64, Box<CborValue>),
}

impl CborValue {
    /// Tag for standard date/time text.
    pub const TAG_DATE_TIME_STRING: u64 = 0;
    /// Tag for binary UUIDs.
    pub const TAG_UUID: u64 = 37;

    /// Whether this is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, CborValue::Null)
    }

    /// Whether this is an integer or a double.
    pub fn is_number(&self) -> bool {
        matches!(self, CborValue::Integer(_) | CborValue::Double(_))
    }

    /// The simple value this item is encoded as, if it is one.
    pub fn to_simple_type(&self) -> Option<CborSimpleType> {
        match self {
            CborValue::Bool(false) => Some(CborSimpleType::FALSE),
            CborValue::Bool(true) => Some(CborSimpleType::TRUE),
            CborValue::Null => Some(CborSimpleType::NULL),
            CborValue::Undefined => Some(CborSimpleType::UNDEFINED),
            CborValue::SimpleType(s) => Some(*s),
            _ => None,
        }
    }

    /// The item for a simple value, folding the four named ones.
    pub fn from_simple_type(simple: CborSimpleType) -> Self {
        match simple {
            CborSimpleType::FALSE => CborValue::Bool(false),
            CborSimpleType::TRUE => CborValue::Bool(true),
            CborSimpleType::NULL => CborValue::Null,
            CborSimpleType::UNDEFINED => CborValue::Undefined,
            other => CborValue::SimpleType(other),
        }
    }

    /// Integer value; doubles are truncated.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            CborValue::Integer(n) => Some(*n),
            CborValue::Double(d) => Some(*d as i64),
            _ => None,
        }
    }

    /// Floating point value of a number.
    pub fn to_double(&self) -> Option<f64> {
        match self {
            CborValue::Integer(n) => Some(*n as f64),
            CborValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Text of a string item.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CborValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Encodes this item.
    pub fn to_cbor(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode(self, &mut out);
        out
    }

    /// Decodes one item that must span all of `bytes`.
    pub fn from_cbor(bytes: &[u8]) -> Result<CborValue, CborError> {
        let mut decoder = Decoder { bytes, pos: 0 };
        let value = decoder.item(0)?;
        if decoder.pos != bytes.len() {
            return Err(CborError::TrailingData);
        }
        Ok(value)
    }
}

impl From<CborArray> for CborValue {
    fn from(array: CborArray) -> Self {
        CborValue::Array(array)
    }
}

impl From<CborMap> for CborValue {
    fn from(map: CborMap) -> Self {
        CborValue::Map(map)
    }
}

/// A CBOR array.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CborArray(pub Vec<CborValue>);

impl CborArray {
    /// Number of items.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no items.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the items.
    pub fn iter(&self) -> core::slice::Iter<'_, CborValue> {
        self.0.iter()
    }
}

impl FromIterator<CborValue> for CborArray {
    fn from_iter<I: IntoIterator<Item = CborValue>>(iter: I) -> Self {
        CborArray(iter.into_iter().collect())
    }
}

impl SequentialContainer for CborArray {
    const CAPABILITIES: IterCapabilities = IterCapabilities::ALL;

    fn value_type() -> core::any::TypeId {
        core::any::TypeId::of::<CborValue>()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn cursor(&self) -> Box<dyn Cursor<'_> + '_> {
        Box::new(SliceCursor::new(&self.0))
    }
}

/// A CBOR map. Keeps insertion order; keys may be any item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CborMap(pub Vec<(CborValue, CborValue)>);

impl CborMap {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value under a text key.
    pub fn get(&self, key: &str) -> Option<&CborValue> {
        self.0
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Sets `key` to `value`, replacing an existing entry in place.
    pub fn insert(&mut self, key: CborValue, value: CborValue) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Iterates the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&CborValue, &CborValue)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

impl FromIterator<(CborValue, CborValue)> for CborMap {
    fn from_iter<I: IntoIterator<Item = (CborValue, CborValue)>>(iter: I) -> Self {
        let mut map = CborMap::default();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Why CBOR bytes could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CborError {
    /// The input ended inside an item.
    UnexpectedEnd,
    /// Indefinite lengths or reserved additional information.
    Unsupported(u8),
    /// A text string was not UTF-8.
    InvalidUtf8,
    /// Nesting deeper than the decoder allows.
    TooDeep,
    /// Bytes left over after the item.
    TrailingData,
}

impl fmt::Display for CborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CborError::UnexpectedEnd => write!(f, "unexpected end of CBOR input"),
            CborError::Unsupported(byte) => write!(f, "unsupported CBOR initial byte {byte:#04x}"),
            CborError::InvalidUtf8 => write!(f, "CBOR text string is not valid UTF-8"),
            CborError::TooDeep => write!(f, "CBOR nesting too deep"),
            CborError::TrailingData => write!(f, "trailing bytes after CBOR item"),
        }
    }
}

impl core::error::Error for CborError {}

const MAX_DEPTH: usize = 256;

fn write_head(out: &mut Vec<u8>, major: u8, value: u64) {
    let major = major << 5;
    if value < 24 {
        out.push(major | value as u8);
    } else if let Ok(v) = u8::try_from(value) {
        out.push(major | 24);
        out.push(v);
    } else if let Ok(v) = u16::try_from(value) {
        out.push(major | 25);
        out.extend_from_slice(&v.to_be_bytes());
    } else if let Ok(v) = u32::try_from(value) {
        out.push(major | 26);
        out.extend_from_slice(&v.to_be_bytes());
    } else {
        out.push(major | 27);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

fn encode(value: &CborValue, out: &mut Vec<u8>) {
    match value {
        CborValue::Undefined => out.push(0xf7),
        CborValue::Null => out.push(0xf6),
        CborValue::Bool(false) => out.push(0xf4),
        CborValue::Bool(true) => out.push(0xf5),
        CborValue::Integer(n) if *n >= 0 => write_head(out, 0, *n as u64),
        CborValue::Integer(n) => write_head(out, 1, (-1 - *n) as u64),
        CborValue::Double(d) => {
            out.push(0xfb);
            out.extend_from_slice(&d.to_bits().to_be_bytes());
        }
        CborValue::ByteArray(bytes) => {
            write_head(out, 2, bytes.len() as u64);
            out.extend_from_slice(bytes);
        }
        CborValue::String(s) => {
            write_head(out, 3, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        CborValue::Array(array) => {
            write_head(out, 4, array.len() as u64);
            for item in array.iter() {
                encode(item, out);
            }
        }
        CborValue::Map(map) => {
            write_head(out, 5, map.len() as u64);
            for (k, v) in map.iter() {
                encode(k, out);
                encode(v, out);
            }
        }
        CborValue::SimpleType(CborSimpleType(s)) if *s < 24 => out.push(0xe0 | s),
        CborValue::SimpleType(CborSimpleType(s)) => {
            out.push(0xf8);
            out.push(*s);
        }
        CborValue::Tagged(tag, inner) => {
            write_head(out, 6, *tag);
            encode(inner, out);
        }
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CborError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos.saturating_add(n))
            .ok_or(CborError::UnexpectedEnd)?;
        self.pos += n;
        Ok(slice)
    }

    fn argument(&mut self, initial: u8) -> Result<u64, CborError> {
        let info = initial & 0x1f;
        let width = match info {
            0..=23 => return Ok(u64::from(info)),
            24 => 1,
            25 => 2,
            26 => 4,
            27 => 8,
            _ => return Err(CborError::Unsupported(initial)),
        };
        Ok(self
            .take(width)?
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    fn length(&mut self, initial: u8) -> Result<usize, CborError> {
        let len = usize::try_from(self.argument(initial)?).map_err(|_| CborError::UnexpectedEnd)?;
        // every element needs at least one byte
        if len > self.bytes.len() - self.pos {
            return Err(CborError::UnexpectedEnd);
        }
        Ok(len)
    }

    fn item(&mut self, depth: usize) -> Result<CborValue, CborError> {
        if depth > MAX_DEPTH {
            return Err(CborError::TooDeep);
        }
        let initial = self.take(1)?[0];
        match initial >> 5 {
            0 => {
                let n = self.argument(initial)?;
                Ok(i64::try_from(n).map_or(CborValue::Double(n as f64), CborValue::Integer))
            }
            1 => {
                let n = self.argument(initial)?;
                Ok(match i64::try_from(n) {
                    Ok(n) => CborValue::Integer(-1 - n),
                    Err(_) => CborValue::Double(-1.0 - n as f64),
                })
            }
            2 => {
                let len = self.length(initial)?;
                Ok(CborValue::ByteArray(self.take(len)?.to_vec()))
            }
            3 => {
                let len = self.length(initial)?;
                let text = core::str::from_utf8(self.take(len)?).map_err(|_| CborError::InvalidUtf8)?;
                Ok(CborValue::String(text.to_owned()))
            }
            4 => {
                let len = self.length(initial)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.item(depth + 1)?);
                }
                Ok(CborValue::Array(CborArray(items)))
            }
            5 => {
                let len = self.length(initial)?;
                let mut entries = Vec::with_capacity(len);
                for _ in 0..len {
                    let k = self.item(depth + 1)?;
                    let v = self.item(depth + 1)?;
                    entries.push((k, v));
                }
                Ok(CborValue::Map(CborMap(entries)))
            }
            6 => {
                let tag = self.argument(initial)?;
                Ok(CborValue::Tagged(tag, Box::new(self.item(depth + 1)?)))
            }
            _ => self.simple_or_float(initial),
        }
    }

    fn simple_or_float(&mut self, initial: u8) -> Result<CborValue, CborError> {
        match initial & 0x1f {
            s @ 0..=23 => Ok(CborValue::from_simple_type(CborSimpleType(s))),
            24 => Ok(CborValue::from_simple_type(CborSimpleType(self.take(1)?[0]))),
            25 => {
                let bits = self.argument(initial)? as u16;
                Ok(CborValue::Double(half_to_f64(bits)))
            }
            26 => {
                let bits = self.argument(initial)? as u32;
                Ok(CborValue::Double(f64::from(f32::from_bits(bits))))
            }
            27 => Ok(CborValue::Double(f64::from_bits(self.argument(initial)?))),
            _ => Err(CborError::Unsupported(initial)),
        }
    }
}

fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = i32::from((bits >> 10) & 0x1f);
    let mantissa = f64::from(bits & 0x3ff);
    let magnitude = match exponent {
        0 => mantissa * 2f64.powi(-24),
        31 if mantissa == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (1.0 + mantissa / 1024.0) * 2f64.powi(exponent - 15),
    };
    sign * magnitude
}

impl Streamable for CborSimpleType {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_u8(self.0);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        CborSimpleType(input.read_u8())
    }
}

impl Streamable for CborValue {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_bytes(&self.to_cbor());
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let bytes = input.read_bytes();
        if !input.is_ok() {
            return CborValue::Undefined;
        }
        CborValue::from_cbor(&bytes).unwrap_or_else(|err| {
            tracing::warn!("corrupt CBOR payload: {err}");
            input.set_status(StreamStatus::ReadCorruptData);
            CborValue::Undefined
        })
    }
}

impl Streamable for CborArray {
    fn write_to(&self, out: &mut StreamWriter) {
        CborValue::Array(self.clone()).write_to(out);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        match CborValue::read_from(input) {
            CborValue::Array(array) => array,
            CborValue::Undefined if !input.is_ok() => CborArray::default(),
            _ => {
                input.set_status(StreamStatus::ReadCorruptData);
                CborArray::default()
            }
        }
    }
}

impl Streamable for CborMap {
    fn write_to(&self, out: &mut StreamWriter) {
        CborValue::Map(self.clone()).write_to(out);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        match CborValue::read_from(input) {
            CborValue::Map(map) => map,
            CborValue::Undefined if !input.is_ok() => CborMap::default(),
            _ => {
                input.set_status(StreamStatus::ReadCorruptData);
                CborMap::default()
            }
        }
    }
}
