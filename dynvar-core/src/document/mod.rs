//! The document model: JSON values (text oriented) and CBOR values (binary
//! oriented), and the mapping between the two.

mod cbor;

pub use cbor::{CborArray, CborError, CborMap, CborSimpleType, CborValue};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::stream::{StreamReader, StreamStatus, StreamWriter, Streamable};

/// Any JSON value.
pub type JsonValue = serde_json::Value;

/// A JSON object. Keys are kept sorted.
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// A JSON array.
pub type JsonArray = Vec<JsonValue>;

/// A JSON document: nothing, or a top-level object or array.
#[derive(Clone, Debug, Default)]
pub enum JsonDocument {
    /// The empty document.
    #[default]
    Null,
    /// A document holding an object.
    Object(JsonObject),
    /// A document holding an array.
    Array(JsonArray),
}

impl JsonDocument {
    /// Whether the document is empty.
    pub fn is_null(&self) -> bool {
        matches!(self, JsonDocument::Null)
    }

    /// Compact JSON text; empty for the empty document.
    pub fn to_json(&self) -> Vec<u8> {
        let text = match self {
            JsonDocument::Null => return Vec::new(),
            JsonDocument::Object(object) => serde_json::to_vec(object),
            JsonDocument::Array(array) => serde_json::to_vec(array),
        };
        // serializing a Value tree cannot fail
        text.unwrap_or_default()
    }

    /// Parses JSON text whose top level is an object or array.
    pub fn from_json(text: &[u8]) -> Result<Self, serde_json::Error> {
        if text.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonDocument::Null);
        }
        Ok(match serde_json::from_slice::<JsonValue>(text)? {
            JsonValue::Object(object) => JsonDocument::Object(object),
            JsonValue::Array(array) => JsonDocument::Array(array),
            _ => JsonDocument::Null,
        })
    }

    /// The document's top level as a value; the empty document is an empty
    /// object.
    pub fn to_value(&self) -> JsonValue {
        match self {
            JsonDocument::Null => JsonValue::Object(JsonObject::new()),
            JsonDocument::Object(object) => JsonValue::Object(object.clone()),
            JsonDocument::Array(array) => JsonValue::Array(array.clone()),
        }
    }
}

impl PartialEq for JsonDocument {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsonDocument::Null, JsonDocument::Null) => true,
            (JsonDocument::Object(a), JsonDocument::Object(b)) => objects_eq(a, b),
            (JsonDocument::Array(a), JsonDocument::Array(b)) => arrays_eq(a, b),
            _ => false,
        }
    }
}

/// JSON equality where numbers compare by their `f64` value.
pub fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        (JsonValue::Array(x), JsonValue::Array(y)) => arrays_eq(x, y),
        (JsonValue::Object(x), JsonValue::Object(y)) => objects_eq(x, y),
        _ => a == b,
    }
}

/// [`json_eq`] over arrays.
pub fn arrays_eq(a: &[JsonValue], b: &[JsonValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_eq(x, y))
}

/// [`json_eq`] over objects.
pub fn objects_eq(a: &JsonObject, b: &JsonObject) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(k, v)| b.get(k).is_some_and(|w| json_eq(v, w)))
}

/// A JSON number, or null when `d` is not finite.
pub fn json_number(d: f64) -> JsonValue {
    serde_json::Number::from_f64(d).map_or(JsonValue::Null, JsonValue::Number)
}

// ============================================================================
// JSON <-> CBOR
// ============================================================================

/// Maps a CBOR item onto JSON.
///
/// Byte strings become unpadded base64url text, tags are dropped in favour
/// of their content, and simple values other than the named four become
/// `"simple(N)"`.
pub fn cbor_to_json(value: &CborValue) -> JsonValue {
    match value {
        CborValue::Undefined | CborValue::Null => JsonValue::Null,
        CborValue::Bool(b) => JsonValue::Bool(*b),
        CborValue::Integer(n) => JsonValue::from(*n),
        CborValue::Double(d) => json_number(*d),
        CborValue::ByteArray(bytes) => JsonValue::String(URL_SAFE_NO_PAD.encode(bytes)),
        CborValue::String(s) => JsonValue::String(s.clone()),
        CborValue::Array(array) => JsonValue::Array(cbor_array_to_json(array)),
        CborValue::Map(map) => JsonValue::Object(cbor_map_to_json(map)),
        CborValue::SimpleType(s) => JsonValue::String(format!("simple({})", s.0)),
        CborValue::Tagged(_, inner) => cbor_to_json(inner),
    }
}

/// Maps a CBOR array onto a JSON array.
pub fn cbor_array_to_json(array: &CborArray) -> JsonArray {
    array.iter().map(cbor_to_json).collect()
}

/// Maps a CBOR map onto a JSON object; keys that are not text are rendered
/// as JSON.
pub fn cbor_map_to_json(map: &CborMap) -> JsonObject {
    map.iter()
        .map(|(k, v)| {
            let key = match cbor_to_json(k) {
                JsonValue::String(s) => s,
                other => other.to_string(),
            };
            (key, cbor_to_json(v))
        })
        .collect()
}

/// Maps a JSON value onto CBOR. Integral numbers in `i64` range become
/// integers.
pub fn json_to_cbor(value: &JsonValue) -> CborValue {
    match value {
        JsonValue::Null => CborValue::Null,
        JsonValue::Bool(b) => CborValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => CborValue::Integer(i),
            None => {
                let d = n.as_f64().unwrap_or(f64::NAN);
                if d.fract() == 0.0 && d >= i64::MIN as f64 && d < i64::MAX as f64 {
                    CborValue::Integer(d as i64)
                } else {
                    CborValue::Double(d)
                }
            }
        },
        JsonValue::String(s) => CborValue::String(s.clone()),
        JsonValue::Array(array) => CborValue::Array(json_array_to_cbor(array)),
        JsonValue::Object(object) => CborValue::Map(json_object_to_cbor(object)),
    }
}

/// Maps a JSON array onto a CBOR array.
pub fn json_array_to_cbor(array: &[JsonValue]) -> CborArray {
    array.iter().map(json_to_cbor).collect()
}

/// Maps a JSON object onto a CBOR map with text keys.
pub fn json_object_to_cbor(object: &JsonObject) -> CborMap {
    object
        .iter()
        .map(|(k, v)| (CborValue::String(k.clone()), json_to_cbor(v)))
        .collect()
}

// ============================================================================
// Streaming
// ============================================================================

const JSON_NULL: u8 = 0x0;
const JSON_BOOL: u8 = 0x1;
const JSON_DOUBLE: u8 = 0x2;
const JSON_STRING: u8 = 0x3;
const JSON_ARRAY: u8 = 0x4;
const JSON_OBJECT: u8 = 0x5;
const JSON_UNDEFINED: u8 = 0x80;

impl Streamable for JsonValue {
    fn write_to(&self, out: &mut StreamWriter) {
        match self {
            JsonValue::Null => out.write_u8(JSON_NULL),
            JsonValue::Bool(b) => {
                out.write_u8(JSON_BOOL);
                out.write_bool(*b);
            }
            JsonValue::Number(n) => {
                out.write_u8(JSON_DOUBLE);
                out.write_f64(n.as_f64().unwrap_or(f64::NAN));
            }
            JsonValue::String(s) => {
                out.write_u8(JSON_STRING);
                out.write_str(s);
            }
            JsonValue::Array(array) => {
                out.write_u8(JSON_ARRAY);
                JsonDocument::Array(array.clone()).write_to(out);
            }
            JsonValue::Object(object) => {
                out.write_u8(JSON_OBJECT);
                JsonDocument::Object(object.clone()).write_to(out);
            }
        }
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        match input.read_u8() {
            JSON_NULL | JSON_UNDEFINED => JsonValue::Null,
            JSON_BOOL => JsonValue::Bool(input.read_bool()),
            JSON_DOUBLE => json_number(input.read_f64()),
            JSON_STRING => JsonValue::String(input.read_str()),
            JSON_ARRAY => JsonValue::Array(read_json_array(input)),
            JSON_OBJECT => JsonValue::Object(JsonObject::read_from(input)),
            other => {
                tracing::warn!("unknown JSON value type {other:#x} in stream");
                input.set_status(StreamStatus::ReadCorruptData);
                JsonValue::Null
            }
        }
    }
}

impl Streamable for JsonDocument {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_bytes(&self.to_json());
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let text = input.read_bytes();
        JsonDocument::from_json(&text).unwrap_or_else(|err| {
            tracing::warn!("corrupt JSON payload: {err}");
            input.set_status(StreamStatus::ReadCorruptData);
            JsonDocument::Null
        })
    }
}

impl Streamable for JsonObject {
    fn write_to(&self, out: &mut StreamWriter) {
        JsonDocument::Object(self.clone()).write_to(out);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        match JsonDocument::read_from(input) {
            JsonDocument::Object(object) => object,
            JsonDocument::Null => JsonObject::new(),
            JsonDocument::Array(_) => {
                input.set_status(StreamStatus::ReadCorruptData);
                JsonObject::new()
            }
        }
    }
}

// `Vec<JsonValue>` already streams as a counted list through the generic
// `Vec` impl; the registered JSON array type uses document text instead.

/// Writes a JSON array as a document.
pub(crate) fn write_json_array(array: &JsonArray, out: &mut StreamWriter) {
    JsonDocument::Array(array.clone()).write_to(out);
}

/// Reads a JSON array written by [`write_json_array`].
pub(crate) fn read_json_array(input: &mut StreamReader<'_>) -> JsonArray {
    match JsonDocument::read_from(input) {
        JsonDocument::Array(array) => array,
        JsonDocument::Null => JsonArray::new(),
        JsonDocument::Object(_) => {
            input.set_status(StreamStatus::ReadCorruptData);
            JsonArray::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_by_value() {
        assert!(json_eq(&json!(5), &json!(5.0)));
        assert!(json_eq(&json!({"a": [1, 2.0]}), &json!({"a": [1.0, 2]})));
        assert!(!json_eq(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn cbor_bytes_become_base64url() {
        let value = CborValue::ByteArray(vec![0xfb, 0xff]);
        assert_eq!(cbor_to_json(&value), json!("-_8"));
    }

    #[test]
    fn cbor_keys_are_stringified() {
        let map = CborMap(vec![
            (CborValue::Integer(1), CborValue::Bool(true)),
            (CborValue::String("k".into()), CborValue::Null),
        ]);
        assert_eq!(
            JsonValue::Object(cbor_map_to_json(&map)),
            json!({"1": true, "k": null})
        );
    }

    #[test]
    fn integral_json_numbers_become_cbor_integers() {
        assert_eq!(json_to_cbor(&json!(3.0)), CborValue::Integer(3));
        assert_eq!(json_to_cbor(&json!(3.5)), CborValue::Double(3.5));
        assert_eq!(json_to_cbor(&json!(-7)), CborValue::Integer(-7));
    }

    #[test]
    fn document_text_round_trip() {
        let doc = JsonDocument::Object(json!({"b": [1, "x"], "a": null}).as_object().cloned().unwrap());
        assert_eq!(doc.to_json(), br#"{"a":null,"b":[1,"x"]}"#);
        assert_eq!(JsonDocument::from_json(&doc.to_json()).unwrap(), doc);
        assert!(JsonDocument::from_json(b"").unwrap().is_null());
        assert!(JsonDocument::from_json(b"{").is_err());
    }
}
