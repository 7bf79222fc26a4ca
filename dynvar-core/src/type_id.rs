//! Stable type identifiers and per-type flags.

use core::fmt;

/// Identifies a storable type.
///
/// Ids below [`MetaTypeId::USER`] are fixed and shared with the binary
/// stream format; ids at or above it are handed out by
/// [`TypeRegistry::register`](crate::TypeRegistry::register) and travel on
/// the wire by name.
///
/// Several fixed ids have no Rust representation in this crate (bit arrays,
/// locales, the GUI types). They still take part in the conversion rules and
/// in stream id remapping, but no value of them can be created.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct MetaTypeId(pub u32);

macro_rules! type_ids {
    ($($(#[$doc:meta])* $name:ident = $value:literal;)*) => {
        impl MetaTypeId {
            $(
                $(#[$doc])*
                pub const $name: MetaTypeId = MetaTypeId($value);
            )*

            /// The constant name of a fixed id, if it has one.
            pub const fn const_name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

type_ids! {
    /// No type. A variant of this type is invalid.
    UNKNOWN = 0;
    /// `bool`
    BOOL = 1;
    /// `i32`
    INT = 2;
    /// `u32`
    UINT = 3;
    /// `i64`
    LONG_LONG = 4;
    /// `u64`
    ULONG_LONG = 5;
    /// `f64`
    DOUBLE = 6;
    /// `char`, streamed as one UTF-16 unit
    CHAR = 7;
    /// Ordered string-keyed map of variants
    VARIANT_MAP = 8;
    /// List of variants
    VARIANT_LIST = 9;
    /// `String`
    STRING = 10;
    /// `Vec<String>`
    STRING_LIST = 11;
    /// `Vec<u8>`
    BYTE_ARRAY = 12;
    /// Reserved
    BIT_ARRAY = 13;
    /// Calendar date
    DATE = 14;
    /// Wall-clock time
    TIME = 15;
    /// Date and time
    DATE_TIME = 16;
    /// Reserved
    URL = 17;
    /// Reserved
    LOCALE = 18;
    /// Integer rectangle
    RECT = 19;
    /// Floating point rectangle
    RECT_F = 20;
    /// Integer size
    SIZE = 21;
    /// Floating point size
    SIZE_F = 22;
    /// Integer line
    LINE = 23;
    /// Floating point line
    LINE_F = 24;
    /// Integer point
    POINT = 25;
    /// Floating point point
    POINT_F = 26;
    /// Legacy regular expression; resolved by name
    LEGACY_REGEXP = 27;
    /// Hashed string-keyed map of variants
    VARIANT_HASH = 28;
    /// Reserved
    EASING_CURVE = 29;
    /// `uuid::Uuid`
    UUID = 30;
    /// Reserved
    VOID_STAR = 31;
    /// C `long`
    LONG = 32;
    /// `i16`
    SHORT = 33;
    /// C `char`
    C_CHAR = 34;
    /// C `unsigned long`
    ULONG = 35;
    /// `u16`
    USHORT = 36;
    /// `u8`
    UCHAR = 37;
    /// `f32`
    FLOAT = 38;
    /// Pointer to an [`Object`](crate::Object)
    OBJECT_STAR = 39;
    /// `i8`
    SCHAR = 40;
    /// A variant nested in a variant
    VARIANT = 41;
    /// Model index
    MODEL_INDEX = 42;
    /// `()`; has no storage
    VOID = 43;
    /// Reserved
    REGULAR_EXPRESSION = 44;
    /// Any JSON value
    JSON_VALUE = 45;
    /// JSON object
    JSON_OBJECT = 46;
    /// JSON array
    JSON_ARRAY = 47;
    /// JSON document
    JSON_DOCUMENT = 48;
    /// `Vec<Vec<u8>>`
    BYTE_ARRAY_LIST = 49;
    /// Persistent model index
    PERSISTENT_MODEL_INDEX = 50;
    /// The null pointer singleton
    NULLPTR = 51;
    /// CBOR simple value
    CBOR_SIMPLE_TYPE = 52;
    /// Any CBOR value
    CBOR_VALUE = 53;
    /// CBOR array
    CBOR_ARRAY = 54;
    /// CBOR map
    CBOR_MAP = 55;
    /// Reserved
    FONT = 64;
    /// Reserved
    PIXMAP = 65;
    /// Reserved
    BRUSH = 66;
    /// Reserved
    COLOR = 67;
    /// Reserved
    PALETTE = 68;
    /// Reserved
    ICON = 69;
    /// Reserved
    IMAGE = 70;
    /// Reserved
    POLYGON = 71;
    /// Reserved
    REGION = 72;
    /// Reserved
    BITMAP = 73;
    /// Reserved
    CURSOR = 74;
    /// Reserved
    KEY_SEQUENCE = 75;
    /// Reserved
    PEN = 76;
    /// Reserved
    TEXT_LENGTH = 77;
    /// Reserved
    TEXT_FORMAT = 78;
    /// Reserved
    MATRIX = 79;
    /// Reserved
    TRANSFORM = 80;
    /// Reserved
    MATRIX_4X4 = 81;
    /// Reserved
    VECTOR_2D = 82;
    /// Reserved
    VECTOR_3D = 83;
    /// Reserved
    VECTOR_4D = 84;
    /// Reserved
    QUATERNION = 85;
    /// Reserved
    POLYGON_F = 86;
    /// Reserved
    SIZE_POLICY = 121;
    /// First id handed out to registered types.
    USER = 1024;
}

impl MetaTypeId {
    /// The highest id of the core (non-GUI) block.
    pub const LAST_CORE_TYPE: MetaTypeId = MetaTypeId::CBOR_MAP;

    /// The highest id of the GUI block.
    pub const LAST_GUI_TYPE: MetaTypeId = MetaTypeId::POLYGON_F;

    /// Whether this is a registered (by-name) type rather than a fixed one.
    #[inline]
    pub const fn is_user_type(self) -> bool {
        self.0 >= Self::USER.0
    }

    /// Whether this is the no-type sentinel.
    #[inline]
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for MetaTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.const_name() {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "MetaTypeId({})", self.0),
        }
    }
}

impl fmt::Display for MetaTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u32> for MetaTypeId {
    fn from(value: u32) -> Self {
        MetaTypeId(value)
    }
}

crate::bitflags! {
    /// What the registry knows about a type beyond its operations.
    pub struct TypeFlags: u32 {
        /// The value is a pointer and may be null.
        const IS_POINTER = 1 << 0;
        /// The type is an enumeration with an integral representation.
        const IS_ENUMERATION = 1 << 1;
        /// The value points to an [`Object`](crate::Object).
        const POINTER_TO_OBJECT = 1 << 2;
        /// The value points to a gadget: reflected, but not an object.
        const POINTER_TO_GADGET = 1 << 3;
        /// Values can be relocated with a plain memory copy.
        const MOVABLE = 1 << 4;
        /// The value is itself a shared pointer.
        const SHARED_POINTER = 1 << 5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_names_fixed_ids() {
        assert_eq!(format!("{:?}", MetaTypeId::DOUBLE), "DOUBLE(6)");
        assert_eq!(format!("{:?}", MetaTypeId(1500)), "MetaTypeId(1500)");
    }

    #[test]
    fn user_threshold() {
        assert!(!MetaTypeId::SIZE_POLICY.is_user_type());
        assert!(MetaTypeId::USER.is_user_type());
        assert!(MetaTypeId(2000).is_user_type());
    }

    #[test]
    fn flags_compose() {
        let flags = TypeFlags::IS_POINTER | TypeFlags::POINTER_TO_OBJECT;
        assert!(flags.contains(TypeFlags::IS_POINTER));
        assert!(!flags.contains(TypeFlags::IS_ENUMERATION));
        assert_eq!(format!("{flags:?}"), "IS_POINTER | POINTER_TO_OBJECT");
        assert_eq!(format!("{:?}", TypeFlags::empty()), "(empty)");
    }
}
