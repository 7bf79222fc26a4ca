//! Whether a value of one type can be converted to another, without
//! converting it.

use dynvar_core::{MetaTypeId, TypeFlags, TypeInfo};

use crate::{Variant, registry};

use MetaTypeId as T;

const fn bits(ids: &[MetaTypeId]) -> u32 {
    let mut bits = 0;
    let mut i = 0;
    while i < ids.len() {
        bits |= 1 << ids[i].0;
        i += 1;
    }
    bits
}

/// Rows of the capability matrix cover target ids up to this one.
const MATRIX_LAST: MetaTypeId = T::UUID;

/// For each target id up to [`MATRIX_LAST`], the source ids it converts from.
static MATRIX: [u32; MATRIX_LAST.0 as usize + 1] = {
    let mut m = [0; MATRIX_LAST.0 as usize + 1];
    m[T::BOOL.0 as usize] = bits(&[
        T::DOUBLE, T::INT, T::UINT, T::LONG_LONG, T::ULONG_LONG, T::BYTE_ARRAY, T::STRING, T::CHAR,
    ]);
    m[T::INT.0 as usize] = bits(&[
        T::UINT, T::STRING, T::DOUBLE, T::BOOL, T::LONG_LONG, T::ULONG_LONG, T::CHAR,
        T::BYTE_ARRAY, T::INT,
    ]);
    m[T::UINT.0 as usize] = bits(&[
        T::INT, T::STRING, T::DOUBLE, T::BOOL, T::LONG_LONG, T::ULONG_LONG, T::CHAR, T::BYTE_ARRAY,
    ]);
    m[T::LONG_LONG.0 as usize] = bits(&[
        T::INT, T::STRING, T::DOUBLE, T::BOOL, T::UINT, T::ULONG_LONG, T::CHAR, T::BYTE_ARRAY,
    ]);
    m[T::ULONG_LONG.0 as usize] = bits(&[
        T::INT, T::STRING, T::DOUBLE, T::BOOL, T::UINT, T::LONG_LONG, T::CHAR, T::BYTE_ARRAY,
    ]);
    m[T::DOUBLE.0 as usize] = bits(&[
        T::INT, T::STRING, T::ULONG_LONG, T::BOOL, T::UINT, T::LONG_LONG, T::BYTE_ARRAY,
    ]);
    m[T::CHAR.0 as usize] = bits(&[T::INT, T::UINT, T::LONG_LONG, T::ULONG_LONG]);
    m[T::VARIANT_LIST.0 as usize] = bits(&[T::STRING_LIST]);
    m[T::STRING.0 as usize] = bits(&[
        T::STRING_LIST, T::BYTE_ARRAY, T::INT, T::UINT, T::BOOL, T::DOUBLE, T::DATE, T::TIME,
        T::DATE_TIME, T::LONG_LONG, T::ULONG_LONG, T::CHAR, T::URL, T::UUID,
    ]);
    m[T::STRING_LIST.0 as usize] = bits(&[T::VARIANT_LIST, T::STRING]);
    m[T::BYTE_ARRAY.0 as usize] = bits(&[
        T::STRING, T::INT, T::UINT, T::BOOL, T::DOUBLE, T::LONG_LONG, T::ULONG_LONG, T::UUID,
    ]);
    m[T::DATE.0 as usize] = bits(&[T::STRING, T::DATE_TIME]);
    m[T::TIME.0 as usize] = bits(&[T::STRING, T::DATE_TIME]);
    m[T::DATE_TIME.0 as usize] = bits(&[T::STRING, T::DATE]);
    m[T::URL.0 as usize] = bits(&[T::STRING]);
    m[T::RECT.0 as usize] = bits(&[T::RECT_F]);
    m[T::RECT_F.0 as usize] = bits(&[T::RECT]);
    m[T::SIZE.0 as usize] = bits(&[T::SIZE_F]);
    m[T::SIZE_F.0 as usize] = bits(&[T::SIZE]);
    m[T::LINE.0 as usize] = bits(&[T::LINE_F]);
    m[T::LINE_F.0 as usize] = bits(&[T::LINE]);
    m[T::POINT.0 as usize] = bits(&[T::POINT_F]);
    m[T::POINT_F.0 as usize] = bits(&[T::POINT]);
    m[T::UUID.0 as usize] = bits(&[T::STRING, T::BYTE_ARRAY]);
    m
};

fn matrix_allows(from: MetaTypeId, to: MetaTypeId) -> bool {
    from.0 < u32::BITS
        && MATRIX
            .get(to.0 as usize)
            .is_some_and(|row| row & (1 << from.0) != 0)
}

fn is_enum(id: MetaTypeId) -> bool {
    registry().flags(id).contains(TypeFlags::IS_ENUMERATION)
}

fn info(id: MetaTypeId) -> Option<&'static TypeInfo> {
    registry().info(id)
}

/// Kinds that interconvert with a JSON value.
fn json_value_peer(id: MetaTypeId) -> bool {
    matches!(
        id,
        T::NULLPTR
            | T::STRING
            | T::BOOL
            | T::INT
            | T::UINT
            | T::DOUBLE
            | T::FLOAT
            | T::ULONG
            | T::LONG
            | T::LONG_LONG
            | T::ULONG_LONG
            | T::USHORT
            | T::UCHAR
            | T::C_CHAR
            | T::SCHAR
            | T::SHORT
            | T::VARIANT_LIST
            | T::VARIANT_MAP
            | T::VARIANT_HASH
            | T::CBOR_VALUE
            | T::CBOR_ARRAY
            | T::CBOR_MAP
            | T::STRING_LIST
            | T::JSON_OBJECT
            | T::JSON_ARRAY
            | T::JSON_DOCUMENT
    )
}

/// Kinds that interconvert with a CBOR value.
fn cbor_value_peer(id: MetaTypeId) -> bool {
    matches!(
        id,
        T::UNKNOWN
            | T::NULLPTR
            | T::BOOL
            | T::INT
            | T::UINT
            | T::DOUBLE
            | T::FLOAT
            | T::ULONG
            | T::LONG
            | T::LONG_LONG
            | T::ULONG_LONG
            | T::USHORT
            | T::UCHAR
            | T::C_CHAR
            | T::SCHAR
            | T::SHORT
            | T::STRING
            | T::BYTE_ARRAY
            | T::DATE_TIME
            | T::URL
            | T::REGULAR_EXPRESSION
            | T::UUID
            | T::VARIANT_LIST
            | T::VARIANT_MAP
            | T::VARIANT_HASH
            | T::JSON_VALUE
            | T::JSON_ARRAY
            | T::JSON_OBJECT
            | T::JSON_DOCUMENT
            | T::CBOR_ARRAY
            | T::CBOR_MAP
            | T::CBOR_SIMPLE_TYPE
    )
}

/// Pointer-to-object conversion: the runtime class of `value` must derive
/// from the target's class. A null or absent pointer passes.
fn object_convertible(from: MetaTypeId, to: MetaTypeId, value: Option<&Variant>) -> bool {
    let (Some(from_info), Some(to_info)) = (info(from), info(to)) else {
        return false;
    };
    if !from_info.is_object_pointer() || !to_info.is_object_pointer() {
        return false;
    }
    let Some(ptr) = value.and_then(Variant::object_ptr) else {
        return true;
    };
    match (ptr.meta_object(), to_info.meta_object) {
        (Some(runtime), Some(target)) => runtime.inherits(target),
        (None, _) => true,
        (Some(_), None) => false,
    }
}

/// Container kinds that become JSON/CBOR arrays, objects and documents.
fn document_container(from: MetaTypeId, to: MetaTypeId) -> bool {
    let list = matches!(from, T::VARIANT_LIST | T::STRING_LIST);
    let map = matches!(from, T::VARIANT_MAP | T::VARIANT_HASH);
    match to {
        T::JSON_ARRAY | T::CBOR_ARRAY => list,
        T::JSON_OBJECT | T::CBOR_MAP => map,
        T::JSON_DOCUMENT => list || map,
        _ => false,
    }
}

/// Collapses integer and float kinds that share a matrix row.
fn canonical(id: MetaTypeId) -> MetaTypeId {
    match id {
        T::SCHAR | T::C_CHAR | T::UCHAR => T::UINT,
        T::SHORT | T::USHORT => T::INT,
        T::FLOAT => T::DOUBLE,
        other => other,
    }
}

/// Conversions involving ids past the matrix.
fn legacy_allows(from: MetaTypeId, to: MetaTypeId, value: Option<&Variant>) -> bool {
    let small_integer = |id: MetaTypeId| {
        matches!(
            id,
            T::ULONG | T::LONG | T::USHORT | T::UCHAR | T::C_CHAR | T::SCHAR | T::SHORT
        ) || is_enum(id)
    };
    match to {
        T::INT if from == T::KEY_SEQUENCE => true,
        T::INT | T::UINT | T::LONG_LONG | T::ULONG_LONG => small_integer(from),
        T::IMAGE => matches!(from, T::PIXMAP | T::BITMAP),
        T::PIXMAP => matches!(from, T::IMAGE | T::BITMAP | T::BRUSH),
        T::BITMAP => matches!(from, T::PIXMAP | T::IMAGE),
        T::BYTE_ARRAY => matches!(from, T::COLOR | T::NULLPTR) || is_enum(from),
        T::STRING => matches!(from, T::KEY_SEQUENCE | T::FONT | T::COLOR | T::NULLPTR) || is_enum(from),
        T::KEY_SEQUENCE => matches!(from, T::STRING | T::INT),
        T::FONT => from == T::STRING,
        T::COLOR => matches!(from, T::STRING | T::BYTE_ARRAY | T::BRUSH),
        T::BRUSH => matches!(from, T::COLOR | T::PIXMAP),
        T::LONG | T::C_CHAR | T::SCHAR | T::UCHAR | T::ULONG | T::SHORT | T::USHORT => {
            from == T::INT || matrix_allows(from, T::INT) || is_enum(from)
        }
        T::OBJECT_STAR => object_convertible(from, to, value),
        _ => false,
    }
}

/// Decides convertibility. `value`, when given, refines the answer for
/// checks that depend on data: the class of an object pointer and the
/// length of a string list.
pub(crate) fn check(from: MetaTypeId, to: MetaTypeId, value: Option<&Variant>) -> bool {
    if from == to {
        return true;
    }

    // only a pointer that is already null
    if to == T::NULLPTR
        && info(from).is_some_and(|i| i.flags.contains(TypeFlags::IS_POINTER))
    {
        return value.is_none_or(Variant::is_null);
    }

    if matches!(
        (from, to),
        (T::MODEL_INDEX, T::PERSISTENT_MODEL_INDEX) | (T::PERSISTENT_MODEL_INDEX, T::MODEL_INDEX)
    ) {
        return true;
    }

    if to == T::VARIANT_LIST
        && (matches!(from, T::STRING_LIST | T::BYTE_ARRAY_LIST)
            || info(from).is_some_and(|i| i.sequential.is_some()))
    {
        return true;
    }

    if matches!(to, T::VARIANT_MAP | T::VARIANT_HASH)
        && (matches!(from, T::VARIANT_MAP | T::VARIANT_HASH)
            || info(from).is_some_and(|i| i.associative.is_some()))
    {
        return true;
    }

    if (from >= T::LAST_CORE_TYPE || to >= T::LAST_CORE_TYPE)
        && registry().has_converter(from, to)
    {
        return true;
    }

    let from = canonical(from);
    let mut to = canonical(to);
    if from == to {
        return true;
    }

    if to.is_user_type() {
        if is_enum(to) {
            to = T::INT;
        } else {
            return object_convertible(from, to, value);
        }
    }

    if document_container(from, to) {
        return true;
    }

    if from == T::JSON_VALUE || to == T::JSON_VALUE {
        return json_value_peer(if from == T::JSON_VALUE { to } else { from });
    }
    if from == T::JSON_ARRAY {
        return matches!(to, T::VARIANT_LIST | T::CBOR_VALUE | T::CBOR_ARRAY);
    }
    if from == T::JSON_OBJECT {
        return matches!(to, T::VARIANT_MAP | T::VARIANT_HASH | T::CBOR_VALUE | T::CBOR_MAP);
    }

    if from == T::CBOR_VALUE || to == T::CBOR_VALUE {
        return cbor_value_peer(if from == T::CBOR_VALUE { to } else { from });
    }
    if from == T::CBOR_ARRAY {
        return matches!(to, T::VARIANT_LIST | T::CBOR_VALUE | T::JSON_ARRAY);
    }
    if from == T::CBOR_MAP {
        return matches!(to, T::VARIANT_MAP | T::VARIANT_HASH | T::CBOR_VALUE | T::JSON_OBJECT);
    }

    if from > MATRIX_LAST || to > MATRIX_LAST {
        return legacy_allows(from, to, value);
    }

    if to == T::STRING && from == T::STRING_LIST {
        return value
            .and_then(|v| v.get::<Vec<String>>())
            .is_none_or(|list| list.len() == 1);
    }

    matrix_allows(from, to)
}

/// Whether values of type `from` can in principle be converted to `to`.
///
/// Conversions whose outcome depends on the data, such as a string list to
/// a string (one element only) or text to a number, answer `true`.
pub fn can_convert_types(from: MetaTypeId, to: MetaTypeId) -> bool {
    registry();
    check(from, to, None)
}

impl Variant {
    /// Whether this value can be converted to `to`.
    ///
    /// `true` does not guarantee success: text that does not parse still
    /// fails in [`Variant::convert`].
    pub fn can_convert(&self, to: MetaTypeId) -> bool {
        check(self.type_id(), to, Some(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynvar_core::{MetaObject, OBJECT_META, Object, ObjectPtr};

    struct Thing;

    impl Object for Thing {
        fn meta_object(&self) -> &'static MetaObject {
            &OBJECT_META
        }
    }

    #[test]
    fn matrix_rows() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::DOUBLE, T::STRING));
        assert!(can_convert_types(T::STRING, T::INT));
        assert!(!can_convert_types(T::BOOL, T::CHAR));
        assert!(can_convert_types(T::CHAR, T::BOOL));
        assert!(can_convert_types(T::DATE, T::DATE_TIME));
        assert!(!can_convert_types(T::DATE, T::TIME));
        assert!(can_convert_types(T::RECT_F, T::RECT));
        assert!(!can_convert_types(T::RECT, T::POINT));
        assert!(!can_convert_types(T::VARIANT_MAP, T::STRING));
    }

    #[test]
    fn narrow_kinds_share_rows() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::FLOAT, T::STRING));
        assert!(can_convert_types(T::SHORT, T::STRING));
        assert!(can_convert_types(T::UCHAR, T::BOOL));
        assert!(can_convert_types(T::STRING, T::FLOAT));
        assert!(can_convert_types(T::FLOAT, T::DOUBLE));
        assert!(can_convert_types(T::SHORT, T::USHORT));
    }

    #[test]
    fn long_only_reaches_integers() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::LONG, T::INT));
        assert!(can_convert_types(T::LONG, T::ULONG_LONG));
        assert!(can_convert_types(T::INT, T::LONG));
        assert!(can_convert_types(T::STRING, T::LONG));
        assert!(!can_convert_types(T::LONG, T::STRING));
    }

    #[test]
    fn document_types() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::JSON_VALUE, T::INT));
        assert!(can_convert_types(T::VARIANT_MAP, T::JSON_VALUE));
        assert!(!can_convert_types(T::JSON_VALUE, T::DATE));
        assert!(can_convert_types(T::JSON_ARRAY, T::CBOR_ARRAY));
        assert!(!can_convert_types(T::JSON_ARRAY, T::VARIANT_MAP));
        assert!(can_convert_types(T::CBOR_VALUE, T::UUID));
        assert!(can_convert_types(T::CBOR_MAP, T::JSON_OBJECT));
        assert!(!can_convert_types(T::CBOR_VALUE, T::DATE));
    }

    #[test]
    fn legacy_gui_conversions() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::STRING, T::FONT));
        assert!(can_convert_types(T::COLOR, T::STRING));
        assert!(can_convert_types(T::KEY_SEQUENCE, T::INT));
        assert!(!can_convert_types(T::KEY_SEQUENCE, T::UINT));
        assert!(can_convert_types(T::NULLPTR, T::STRING));
        assert!(!can_convert_types(T::FONT, T::COLOR));
    }

    #[test]
    fn model_indexes_and_containers() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::MODEL_INDEX, T::PERSISTENT_MODEL_INDEX));
        assert!(can_convert_types(T::BYTE_ARRAY_LIST, T::VARIANT_LIST));
        assert!(can_convert_types(T::JSON_OBJECT, T::VARIANT_HASH));
        assert!(can_convert_types(T::CBOR_ARRAY, T::VARIANT_LIST));
    }

    #[test]
    fn containers_become_document_arrays_and_objects() {
        dynvar_testhelpers::setup();
        for (from, to) in [
            (T::VARIANT_LIST, T::JSON_ARRAY),
            (T::STRING_LIST, T::JSON_ARRAY),
            (T::VARIANT_LIST, T::CBOR_ARRAY),
            (T::VARIANT_MAP, T::JSON_OBJECT),
            (T::VARIANT_HASH, T::JSON_OBJECT),
            (T::VARIANT_MAP, T::CBOR_MAP),
            (T::VARIANT_MAP, T::JSON_DOCUMENT),
            (T::VARIANT_LIST, T::JSON_DOCUMENT),
        ] {
            assert!(can_convert_types(from, to), "{from:?} -> {to:?}");
        }
        assert!(!can_convert_types(T::VARIANT_LIST, T::JSON_OBJECT));
        assert!(!can_convert_types(T::VARIANT_MAP, T::CBOR_ARRAY));
    }

    #[test]
    fn only_null_pointers_become_nullptr() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::OBJECT_STAR, T::NULLPTR));
        assert!(Variant::from(ObjectPtr::null()).can_convert(T::NULLPTR));
        assert!(!Variant::from(ObjectPtr::new(Thing)).can_convert(T::NULLPTR));
        assert!(!can_convert_types(T::INT, T::NULLPTR));
    }

    #[test]
    fn string_list_to_string_needs_one_element() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::STRING_LIST, T::STRING));
        let one = Variant::from(vec!["a".to_string()]);
        let two = Variant::from(vec!["a".to_string(), "b".to_string()]);
        assert!(one.can_convert(T::STRING));
        assert!(!two.can_convert(T::STRING));
    }

    #[test]
    fn same_type_always_converts() {
        dynvar_testhelpers::setup();
        assert!(can_convert_types(T::UNKNOWN, T::UNKNOWN));
        assert!(can_convert_types(T::BIT_ARRAY, T::BIT_ARRAY));
        assert!(!can_convert_types(T::UNKNOWN, T::INT));
    }
}
