//! Converting a variant's value to another type.

use core::ffi::{c_char, c_long, c_ulong};

use dynvar_core::{
    CChar, CborValue, JsonValue, Long, MetaTypeId, Nullptr, TypeInfo, ULong,
};

use crate::document::{
    cbor_array_to_list, cbor_date_time, cbor_map_to_map, cbor_uuid, json_array_to_list,
    json_object_to_map, to_cbor_array, to_cbor_map, to_cbor_simple_type, to_json_array,
    to_json_document, to_json_object, variant_to_cbor, variant_to_json,
};
use crate::numeric::{
    StringToBool, format_double, format_float, is_signed_kind, is_unsigned_kind, to_number,
    to_real, to_unsigned_number,
};
use crate::{ConvertError, Variant, VariantHash, VariantList, VariantMap, registry};

use MetaTypeId as T;

impl Variant {
    /// The value converted to type `to`, leaving `self` untouched.
    ///
    /// Registered converters run first; the builtin rules cover the
    /// numeric kinds, text, the list and map types and the document
    /// models. A null source fails unless it is the null pointer itself.
    pub fn try_convert(&self, to: MetaTypeId) -> Result<Variant, ConvertError> {
        let from = self.type_id();
        let unsupported = ConvertError::Unsupported { from, to };
        if from == to {
            // there is no invalid value to convert to
            if to == T::UNKNOWN {
                return Err(unsupported);
            }
            return Ok(self.clone());
        }

        let Some(target) = registry().info(to).filter(|info| info.size > 0) else {
            tracing::trace!("cannot convert {from:?} to unregistered {to:?}");
            return Err(unsupported);
        };
        if !self.can_convert(to) {
            tracing::trace!("no conversion from {from:?} to {to:?}");
            return Err(unsupported);
        }
        // null values, including those left by a failed conversion, stay put
        if self.is_null && from != T::NULLPTR {
            return Err(ConvertError::NullSource { from, to });
        }
        let (Some(source_info), Some(source)) = (self.info, self.payload()) else {
            return Err(ConvertError::NullSource { from, to });
        };

        if source_info.is_object_pointer()
            && target.is_object_pointer()
            && let (Some(ptr), Some(ops)) = (self.object_ptr(), target.vtable.object)
        {
            return Ok(Variant::from_payload(target, (ops.make)(ptr)));
        }

        let mut out = target.construct();
        if registry().convert(from, source, to, &mut *out) {
            tracing::trace!("converted {from:?} to {to:?} with a registered converter");
            return Ok(Variant::from_payload(target, out));
        }

        match builtin(self, target) {
            Some(converted) => Ok(converted),
            None => {
                tracing::trace!("value of {from:?} does not convert to {to:?}");
                Err(ConvertError::InvalidData { from, to })
            }
        }
    }

    /// Converts in place and reports success.
    ///
    /// On failure the variant still changes type: it holds the null default
    /// of `to`, or becomes invalid when `to` is not registered.
    pub fn convert(&mut self, to: MetaTypeId) -> bool {
        match self.try_convert(to) {
            Ok(converted) => {
                *self = converted;
                true
            }
            Err(err) => {
                tracing::trace!("{err}");
                *self = Variant::with_type(to);
                false
            }
        }
    }

    /// The value as a `bool`; `false` when it does not convert.
    pub fn to_bool(&self) -> bool {
        self.value()
    }

    /// The value as an `i32`; `0` when it does not convert.
    pub fn to_int(&self) -> i32 {
        self.value()
    }

    /// The value as a `u32`; `0` when it does not convert.
    pub fn to_uint(&self) -> u32 {
        self.value()
    }

    /// The value as an `i64`; `0` when it does not convert.
    pub fn to_long_long(&self) -> i64 {
        self.value()
    }

    /// The value as a `u64`; `0` when it does not convert.
    pub fn to_ulong_long(&self) -> u64 {
        self.value()
    }

    /// The value as an `f64`; `0.0` when it does not convert.
    pub fn to_double(&self) -> f64 {
        self.value()
    }

    /// The value as an `f32`; `0.0` when it does not convert.
    pub fn to_float(&self) -> f32 {
        self.value()
    }

    /// The value as a list of strings.
    pub fn to_string_list(&self) -> Vec<String> {
        self.value()
    }

    /// The value as a list of variants.
    pub fn to_list(&self) -> VariantList {
        self.value()
    }

    /// The value as an ordered map of variants.
    pub fn to_map(&self) -> VariantMap {
        self.value()
    }

    /// The value as a hash of variants.
    pub fn to_hash(&self) -> VariantHash {
        self.value()
    }

    /// The value as bytes.
    pub fn to_byte_array(&self) -> Vec<u8> {
        self.value()
    }
}

/// The builtin conversion rules, by target type.
fn builtin(value: &Variant, target: &'static TypeInfo) -> Option<Variant> {
    let converted = match target.id {
        T::BOOL => Variant::from(to_bool(value)?),

        T::INT => Variant::from(signed(value)? as i32),
        T::LONG_LONG => Variant::from(signed(value)?),
        T::SHORT => Variant::from(signed(value)? as i16),
        T::SCHAR => Variant::from(signed(value)? as i8),
        T::C_CHAR => Variant::from(CChar(signed(value)? as c_char)),
        T::LONG => Variant::from(Long(signed(value)? as c_long)),

        T::UINT => Variant::from(to_unsigned_number(value)? as u32),
        T::ULONG_LONG => Variant::from(to_unsigned_number(value)?),
        T::USHORT => Variant::from(to_unsigned_number(value)? as u16),
        T::UCHAR => Variant::from(to_unsigned_number(value)? as u8),
        T::ULONG => Variant::from(ULong(to_unsigned_number(value)? as c_ulong)),

        T::DOUBLE => Variant::from(to_real(value)?),
        T::FLOAT => Variant::from(to_real(value)? as f32),

        T::CHAR => Variant::from(to_char(value)?),
        T::STRING => Variant::from(to_text(value)?),
        T::BYTE_ARRAY => Variant::from(to_bytes(value)?),
        T::STRING_LIST => Variant::from(to_string_list(value)?),
        T::NULLPTR => Variant::from(to_nullptr(value)?),

        T::VARIANT_LIST => Variant::from(to_variant_list(value)?),
        T::VARIANT_MAP => Variant::from(to_entries::<VariantMap>(value)?),
        T::VARIANT_HASH => Variant::from(to_entries::<VariantHash>(value)?),

        T::JSON_VALUE => Variant::from(variant_to_json(value)?),
        T::JSON_OBJECT => Variant::from(to_json_object(value)?),
        T::JSON_ARRAY => Variant::from(to_json_array(value)?),
        T::JSON_DOCUMENT => Variant::from(to_json_document(value)?),
        T::CBOR_VALUE => Variant::from(variant_to_cbor(value)?),
        T::CBOR_ARRAY => Variant::from(to_cbor_array(value)?),
        T::CBOR_MAP => Variant::from(to_cbor_map(value)?),
        T::CBOR_SIMPLE_TYPE => Variant::from(to_cbor_simple_type(value)?),
        T::DATE_TIME => Variant::from(cbor_date_time(value)?),
        T::UUID => Variant::from(cbor_uuid(value)?),

        _ => {
            let ops = target.vtable.enumeration?;
            let n = to_number(value, StringToBool::Strict)?;
            Variant::from_payload(target, (ops.from_i64)(n))
        }
    };
    Some(converted)
}

fn signed(value: &Variant) -> Option<i64> {
    to_number(value, StringToBool::Strict)
}

fn is_enum(value: &Variant) -> bool {
    value.info.is_some_and(TypeInfo::is_enumeration)
}

/// Text is false when empty, `"0"` or `"false"` in any case. Numbers are
/// rounded before testing against zero.
fn text_to_bool(text: &str) -> bool {
    !(text.is_empty() || text == "0" || text.eq_ignore_ascii_case("false"))
}

fn to_bool(value: &Variant) -> Option<bool> {
    match value.type_id() {
        T::STRING => Some(text_to_bool(value.get::<String>()?)),
        T::BYTE_ARRAY => Some(text_to_bool(&String::from_utf8_lossy(value.get::<Vec<u8>>()?))),
        T::CHAR => Some(*value.get::<char>()? != '\0'),
        T::JSON_VALUE => value.get::<JsonValue>()?.as_bool(),
        T::CBOR_VALUE => match value.get::<CborValue>()? {
            CborValue::Bool(b) => Some(*b),
            _ => None,
        },
        _ => to_number(value, StringToBool::Strict).map(|n| n != 0),
    }
}

fn to_char(value: &Variant) -> Option<char> {
    let code = if is_unsigned_kind(value.type_id()) {
        to_unsigned_number(value)? as u16
    } else {
        to_number(value, StringToBool::Strict)? as u16
    };
    char::from_u32(u32::from(code))
}

fn bool_text(b: bool) -> String {
    if b { "true" } else { "false" }.to_owned()
}

fn json_text(json: &JsonValue) -> Option<String> {
    let text = match json {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => bool_text(*b),
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(d)) => format_double(d),
            (None, None, None) => return None,
        },
        JsonValue::Array(_) | JsonValue::Object(_) => return None,
    };
    Some(text)
}

fn cbor_text(cbor: &CborValue) -> Option<String> {
    let text = match cbor {
        CborValue::Null | CborValue::Undefined => String::new(),
        CborValue::Bool(b) => bool_text(*b),
        CborValue::Integer(n) => n.to_string(),
        CborValue::Double(d) => format_double(*d),
        CborValue::String(s) => s.clone(),
        CborValue::ByteArray(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        _ => return None,
    };
    Some(text)
}

/// Text of scalars. Character kinds give one Latin-1 character rather than
/// a number.
fn to_text(value: &Variant) -> Option<String> {
    let id = value.type_id();
    let text = match id {
        T::CHAR => value.get::<char>()?.to_string(),
        T::C_CHAR | T::SCHAR | T::UCHAR => char::from(to_unsigned_number(value)? as u8).to_string(),
        T::BOOL => bool_text(*value.get::<bool>()?),
        T::DOUBLE => format_double(*value.get::<f64>()?),
        T::FLOAT => format_float(*value.get::<f32>()?),
        T::NULLPTR => String::new(),
        T::JSON_VALUE => json_text(value.get::<JsonValue>()?)?,
        T::CBOR_VALUE => cbor_text(value.get::<CborValue>()?)?,
        _ if is_signed_kind(id) => signed(value)?.to_string(),
        _ if is_unsigned_kind(id) => to_unsigned_number(value)?.to_string(),
        _ if is_enum(value) => signed(value)?.to_string(),
        _ => return None,
    };
    Some(text)
}

fn to_bytes(value: &Variant) -> Option<Vec<u8>> {
    match value.get::<CborValue>() {
        Some(CborValue::ByteArray(bytes)) => Some(bytes.clone()),
        Some(_) => None,
        None => to_text(value).map(String::into_bytes),
    }
}

/// Every element must convert to text.
fn to_string_list(value: &Variant) -> Option<Vec<String>> {
    match value.type_id() {
        T::VARIANT_LIST => value
            .get::<VariantList>()?
            .iter()
            .map(|element| element.try_convert(T::STRING).ok()?.into_value::<String>())
            .collect(),
        T::JSON_VALUE => value
            .get::<JsonValue>()?
            .as_array()?
            .iter()
            .map(|element| element.as_str().map(str::to_owned))
            .collect(),
        _ => None,
    }
}

fn to_nullptr(value: &Variant) -> Option<Nullptr> {
    let is_null = match value.type_id() {
        T::JSON_VALUE => value.get::<JsonValue>()?.is_null(),
        T::CBOR_VALUE => value.get::<CborValue>()?.is_null(),
        _ => value.object_ptr().is_some_and(|ptr| ptr.is_null()),
    };
    is_null.then_some(Nullptr)
}

fn to_variant_list(value: &Variant) -> Option<VariantList> {
    match value.type_id() {
        T::JSON_VALUE => Some(json_array_to_list(value.get::<JsonValue>()?.as_array()?)),
        T::JSON_ARRAY => Some(json_array_to_list(value.get::<Vec<JsonValue>>()?)),
        T::CBOR_VALUE => match value.get::<CborValue>()? {
            CborValue::Array(array) => Some(cbor_array_to_list(array)),
            _ => None,
        },
        T::CBOR_ARRAY => Some(cbor_array_to_list(value.get()?)),
        _ => Some(value.sequential()?.iter().collect()),
    }
}

fn to_entries<M>(value: &Variant) -> Option<M>
where
    M: FromIterator<(String, Variant)>,
{
    let entries: M = match value.type_id() {
        T::VARIANT_MAP => value.get::<VariantMap>()?.clone().into_iter().collect(),
        T::VARIANT_HASH => value.get::<VariantHash>()?.clone().into_iter().collect(),
        T::JSON_VALUE => json_object_to_map(value.get::<JsonValue>()?.as_object()?)
            .into_iter()
            .collect(),
        T::CBOR_VALUE => match value.get::<CborValue>()? {
            CborValue::Map(map) => cbor_map_to_map(map).into_iter().collect(),
            _ => return None,
        },
        T::CBOR_MAP => cbor_map_to_map(value.get()?).into_iter().collect(),
        T::JSON_OBJECT => json_object_to_map(value.get()?).into_iter().collect(),
        _ => value
            .associative()?
            .iter()
            .map(|(key, mapped)| (key.value::<String>(), mapped))
            .collect(),
    };
    Some(entries)
}
