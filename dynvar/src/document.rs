//! Conversions between variants and the two document models.
//!
//! Both directions work element by element: lists, maps and hashes nest,
//! and an element with no document form falls back to its text.

use chrono::NaiveDateTime;
use dynvar_core::builtins::{format_date_time, parse_date_time};
use dynvar_core::document::{
    cbor_array_to_json, cbor_map_to_json, cbor_to_json, json_array_to_cbor, json_number,
    json_object_to_cbor, json_to_cbor,
};
use dynvar_core::{
    CborArray, CborMap, CborSimpleType, CborValue, JsonArray, JsonDocument, JsonObject,
    JsonValue, MetaTypeId, Nullptr,
};
use uuid::Uuid;

use crate::numeric::{
    StringToBool, is_signed_kind, is_unsigned_kind, to_number, to_real, to_unsigned_number,
};
use crate::{Variant, VariantHash, VariantList, VariantMap};

use MetaTypeId as T;

fn text_of(value: &Variant) -> Option<String> {
    value.try_value::<String>().filter(|text| !text.is_empty())
}

// ============================================================================
// JSON
// ============================================================================

/// The JSON form of `value`, if its type has one.
pub(crate) fn variant_to_json(value: &Variant) -> Option<JsonValue> {
    let id = value.type_id();
    let json = match id {
        T::NULLPTR => JsonValue::Null,
        T::BOOL => JsonValue::Bool(*value.get::<bool>()?),
        _ if is_signed_kind(id) => JsonValue::from(to_number(value, StringToBool::Strict)?),
        _ if is_unsigned_kind(id) => JsonValue::from(to_unsigned_number(value)?),
        T::DOUBLE | T::FLOAT => json_number(to_real(value)?),
        T::STRING => JsonValue::String(value.get::<String>()?.clone()),
        T::STRING_LIST => JsonValue::Array(
            value
                .get::<Vec<String>>()?
                .iter()
                .cloned()
                .map(JsonValue::String)
                .collect(),
        ),
        T::VARIANT_LIST => JsonValue::Array(list_to_json(value.get::<VariantList>()?)),
        T::VARIANT_MAP => JsonValue::Object(entries_to_json(value.get::<VariantMap>()?)),
        T::VARIANT_HASH => JsonValue::Object(entries_to_json(value.get::<VariantHash>()?)),
        T::JSON_VALUE => value.get::<JsonValue>()?.clone(),
        T::JSON_OBJECT => JsonValue::Object(value.get::<JsonObject>()?.clone()),
        T::JSON_ARRAY => JsonValue::Array(value.get::<JsonArray>()?.clone()),
        T::JSON_DOCUMENT => value.get::<JsonDocument>()?.to_value(),
        T::CBOR_VALUE => cbor_to_json(value.get::<CborValue>()?),
        T::CBOR_ARRAY => JsonValue::Array(cbor_array_to_json(value.get::<CborArray>()?)),
        T::CBOR_MAP => JsonValue::Object(cbor_map_to_json(value.get::<CborMap>()?)),
        _ => return None,
    };
    Some(json)
}

/// The JSON form of a nested element. Never fails: elements without one
/// become their text, or null.
fn element_to_json(value: &Variant) -> JsonValue {
    variant_to_json(value)
        .or_else(|| text_of(value).map(JsonValue::String))
        .unwrap_or(JsonValue::Null)
}

fn list_to_json(list: &[Variant]) -> JsonArray {
    list.iter().map(element_to_json).collect()
}

fn entries_to_json<'a>(entries: impl IntoIterator<Item = (&'a String, &'a Variant)>) -> JsonObject {
    entries
        .into_iter()
        .map(|(key, value)| (key.clone(), element_to_json(value)))
        .collect()
}

/// The natural variant for a JSON value: null becomes [`Nullptr`], numbers
/// the narrowest of `i64`, `u64` or `f64`, arrays a [`VariantList`] and
/// objects a [`VariantMap`].
pub fn json_to_variant(value: &JsonValue) -> Variant {
    match value {
        JsonValue::Null => Variant::from(Nullptr),
        JsonValue::Bool(b) => Variant::from(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Variant::from(i)
            } else if let Some(u) = n.as_u64() {
                Variant::from(u)
            } else {
                Variant::from(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Variant::from(s.clone()),
        JsonValue::Array(array) => Variant::from(json_array_to_list(array)),
        JsonValue::Object(object) => Variant::from(json_object_to_map(object)),
    }
}

pub(crate) fn json_array_to_list(array: &[JsonValue]) -> VariantList {
    array.iter().map(json_to_variant).collect()
}

pub(crate) fn json_object_to_map(object: &JsonObject) -> VariantMap {
    object
        .iter()
        .map(|(key, value)| (key.clone(), json_to_variant(value)))
        .collect()
}

pub(crate) fn to_json_object(value: &Variant) -> Option<JsonObject> {
    match variant_to_json(value)? {
        JsonValue::Object(object) => Some(object),
        _ => None,
    }
}

pub(crate) fn to_json_array(value: &Variant) -> Option<JsonArray> {
    match variant_to_json(value)? {
        JsonValue::Array(array) => Some(array),
        _ => None,
    }
}

pub(crate) fn to_json_document(value: &Variant) -> Option<JsonDocument> {
    match variant_to_json(value)? {
        JsonValue::Object(object) => Some(JsonDocument::Object(object)),
        JsonValue::Array(array) => Some(JsonDocument::Array(array)),
        _ => None,
    }
}

// ============================================================================
// CBOR
// ============================================================================

fn tagged_date_time(date_time: &NaiveDateTime) -> CborValue {
    CborValue::Tagged(
        CborValue::TAG_DATE_TIME_STRING,
        Box::new(CborValue::String(format_date_time(date_time))),
    )
}

/// The CBOR form of `value`, if its type has one.
pub(crate) fn variant_to_cbor(value: &Variant) -> Option<CborValue> {
    let id = value.type_id();
    let cbor = match id {
        T::UNKNOWN => CborValue::Undefined,
        T::NULLPTR => CborValue::Null,
        T::BOOL => CborValue::Bool(*value.get::<bool>()?),
        _ if is_signed_kind(id) => CborValue::Integer(to_number(value, StringToBool::Strict)?),
        _ if is_unsigned_kind(id) => {
            let n = to_unsigned_number(value)?;
            match i64::try_from(n) {
                Ok(n) => CborValue::Integer(n),
                Err(_) => CborValue::Double(n as f64),
            }
        }
        T::DOUBLE | T::FLOAT => CborValue::Double(to_real(value)?),
        T::STRING => CborValue::String(value.get::<String>()?.clone()),
        T::STRING_LIST => CborValue::Array(
            value
                .get::<Vec<String>>()?
                .iter()
                .cloned()
                .map(CborValue::String)
                .collect(),
        ),
        T::BYTE_ARRAY => CborValue::ByteArray(value.get::<Vec<u8>>()?.clone()),
        T::DATE_TIME => tagged_date_time(value.get::<NaiveDateTime>()?),
        T::UUID => CborValue::Tagged(
            CborValue::TAG_UUID,
            Box::new(CborValue::ByteArray(value.get::<Uuid>()?.as_bytes().to_vec())),
        ),
        T::VARIANT_LIST => CborValue::Array(value.get::<VariantList>()?.iter().map(element_to_cbor).collect()),
        T::VARIANT_MAP => CborValue::Map(entries_to_cbor(value.get::<VariantMap>()?)),
        T::VARIANT_HASH => CborValue::Map(entries_to_cbor(value.get::<VariantHash>()?)),
        T::JSON_VALUE => json_to_cbor(value.get::<JsonValue>()?),
        T::JSON_OBJECT => CborValue::Map(json_object_to_cbor(value.get::<JsonObject>()?)),
        T::JSON_ARRAY => CborValue::Array(json_array_to_cbor(value.get::<JsonArray>()?)),
        T::JSON_DOCUMENT => json_to_cbor(&value.get::<JsonDocument>()?.to_value()),
        T::CBOR_VALUE => value.get::<CborValue>()?.clone(),
        T::CBOR_ARRAY => CborValue::Array(value.get::<CborArray>()?.clone()),
        T::CBOR_MAP => CborValue::Map(value.get::<CborMap>()?.clone()),
        T::CBOR_SIMPLE_TYPE => CborValue::from_simple_type(*value.get::<CborSimpleType>()?),
        _ => return None,
    };
    Some(cbor)
}

fn element_to_cbor(value: &Variant) -> CborValue {
    variant_to_cbor(value)
        .or_else(|| text_of(value).map(CborValue::String))
        .unwrap_or(CborValue::Undefined)
}

fn entries_to_cbor<'a>(entries: impl IntoIterator<Item = (&'a String, &'a Variant)>) -> CborMap {
    entries
        .into_iter()
        .map(|(key, value)| (CborValue::String(key.clone()), element_to_cbor(value)))
        .collect()
}

/// The natural variant for a CBOR item.
///
/// Tagged date-times and UUIDs are decoded; other tags stay wrapped in a
/// [`CborValue`]. Undefined gives an invalid variant.
pub fn cbor_to_variant(value: &CborValue) -> Variant {
    match value {
        CborValue::Undefined => Variant::new(),
        CborValue::Null => Variant::from(Nullptr),
        CborValue::Bool(b) => Variant::from(*b),
        CborValue::Integer(n) => Variant::from(*n),
        CborValue::Double(d) => Variant::from(*d),
        CborValue::ByteArray(bytes) => Variant::from(bytes.clone()),
        CborValue::String(s) => Variant::from(s.clone()),
        CborValue::Array(array) => Variant::from(cbor_array_to_list(array)),
        CborValue::Map(map) => Variant::from(cbor_map_to_map(map)),
        CborValue::SimpleType(simple) => Variant::from(*simple),
        CborValue::Tagged(tag, _) => match cbor_tagged(value) {
            Some(decoded) => decoded,
            None => {
                tracing::trace!("keeping CBOR tag {tag} wrapped");
                Variant::from(value.clone())
            }
        },
    }
}

/// Decodes the tagged forms this crate knows.
fn cbor_tagged(value: &CborValue) -> Option<Variant> {
    let CborValue::Tagged(tag, inner) = value else {
        return None;
    };
    match (*tag, &**inner) {
        (CborValue::TAG_DATE_TIME_STRING, CborValue::String(text)) => {
            parse_date_time(text.trim_end_matches('Z')).map(Variant::from)
        }
        (CborValue::TAG_UUID, CborValue::ByteArray(bytes)) => {
            Uuid::from_slice(bytes).ok().map(Variant::from)
        }
        _ => None,
    }
}

pub(crate) fn cbor_array_to_list(array: &CborArray) -> VariantList {
    array.iter().map(cbor_to_variant).collect()
}

fn cbor_key(key: &CborValue) -> String {
    match key.as_str() {
        Some(text) => text.to_owned(),
        None => cbor_to_json(key).to_string(),
    }
}

pub(crate) fn cbor_map_to_map(map: &CborMap) -> VariantMap {
    map.iter()
        .map(|(key, value)| (cbor_key(key), cbor_to_variant(value)))
        .collect()
}

pub(crate) fn to_cbor_array(value: &Variant) -> Option<CborArray> {
    match variant_to_cbor(value)? {
        CborValue::Array(array) => Some(array),
        _ => None,
    }
}

pub(crate) fn to_cbor_map(value: &Variant) -> Option<CborMap> {
    match variant_to_cbor(value)? {
        CborValue::Map(map) => Some(map),
        _ => None,
    }
}

pub(crate) fn to_cbor_simple_type(value: &Variant) -> Option<CborSimpleType> {
    value.get::<CborValue>()?.to_simple_type()
}

/// A date-time from a tagged CBOR item.
pub(crate) fn cbor_date_time(value: &Variant) -> Option<NaiveDateTime> {
    cbor_tagged(value.get::<CborValue>()?)?.into_value()
}

/// A UUID from a tagged CBOR item.
pub(crate) fn cbor_uuid(value: &Variant) -> Option<Uuid> {
    cbor_tagged(value.get::<CborValue>()?)?.into_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn numbers_keep_their_signedness() {
        dynvar_testhelpers::setup();
        assert_eq!(variant_to_json(&Variant::from(-3i16)), Some(json!(-3)));
        assert_eq!(variant_to_json(&Variant::from(u64::MAX)), Some(json!(u64::MAX)));
        assert_eq!(variant_to_json(&Variant::from(0.5f32)), Some(json!(0.5)));
        assert_eq!(variant_to_json(&Variant::from(f64::NAN)), Some(JsonValue::Null));
        assert_eq!(
            variant_to_cbor(&Variant::from(u64::MAX)),
            Some(CborValue::Double(u64::MAX as f64))
        );
    }

    #[test]
    fn nested_lists_become_arrays() {
        dynvar_testhelpers::setup();
        let mut map = VariantMap::new();
        map.insert("n".into(), Variant::from(1));
        map.insert("when".into(), Variant::from(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        map.insert("nothing".into(), Variant::new());
        let list: VariantList = vec![Variant::from("a"), Variant::from(map)];
        assert_eq!(
            variant_to_json(&Variant::from(list)),
            Some(json!(["a", {"n": 1, "when": "2024-01-02", "nothing": null}]))
        );
    }

    #[test]
    fn json_maps_to_natural_variants() {
        dynvar_testhelpers::setup();
        let v = json_to_variant(&json!({"a": [1, 2.5, null, true]}));
        let map = v.get::<VariantMap>().unwrap();
        let list = map["a"].get::<VariantList>().unwrap();
        assert_eq!(list[0].type_id(), T::LONG_LONG);
        assert_eq!(list[1].type_id(), T::DOUBLE);
        assert_eq!(list[2].type_id(), T::NULLPTR);
        assert_eq!(list[3].type_id(), T::BOOL);
    }

    #[test]
    fn cbor_tags_decode() {
        dynvar_testhelpers::setup();
        let when = NaiveDate::from_ymd_opt(2020, 5, 17)
            .and_then(|d| d.and_hms_milli_opt(8, 30, 0, 125))
            .unwrap();
        let cbor = variant_to_cbor(&Variant::from(when)).unwrap();
        assert_eq!(
            cbor,
            CborValue::Tagged(0, Box::new(CborValue::String("2020-05-17T08:30:00.125".into())))
        );
        assert_eq!(cbor_to_variant(&cbor).get::<NaiveDateTime>(), Some(&when));

        let id = Uuid::from_u128(0x1234);
        let cbor = variant_to_cbor(&Variant::from(id)).unwrap();
        assert_eq!(cbor_to_variant(&cbor).get::<Uuid>(), Some(&id));

        let unknown = CborValue::Tagged(99, Box::new(CborValue::Integer(1)));
        assert_eq!(cbor_to_variant(&unknown).type_id(), T::CBOR_VALUE);
        assert!(!cbor_to_variant(&CborValue::Undefined).is_valid());
    }

    #[test]
    fn cbor_maps_render_non_text_keys() {
        dynvar_testhelpers::setup();
        let map: CborMap = [
            (CborValue::String("k".into()), CborValue::Bool(true)),
            (CborValue::Integer(7), CborValue::Null),
        ]
        .into_iter()
        .collect();
        let converted = cbor_map_to_map(&map);
        assert_eq!(converted["k"].get::<bool>(), Some(&true));
        assert_eq!(converted["7"].type_id(), T::NULLPTR);
    }
}
