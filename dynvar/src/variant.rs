//! The storage cell: a type tag, a null flag and the payload.

use core::any::{Any, TypeId, type_name};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use dynvar_core::{
    CChar, CborArray, CborMap, CborSimpleType, CborValue, JsonArray, JsonDocument, JsonObject,
    JsonValue, Line, LineF, Long, MetaTypeId, ModelIndex, Nullptr, ObjectPtr, Payload,
    PersistentModelIndex, Point, PointF, Rect, RectF, Size, SizeF, TypeInfo, ULong,
};
use uuid::Uuid;

use crate::{VariantHash, VariantList, VariantMap, registry};

macro_rules! inline_scalars {
    ($($variant:ident($t:ty)),* $(,)?) => {
        /// Scalars kept in the cell itself.
        #[derive(Clone, Copy)]
        enum Inline {
            $($variant($t),)*
        }

        impl Inline {
            fn from_payload(payload: &Payload) -> Option<Self> {
                $(
                    if let Some(value) = payload.downcast_ref::<$t>() {
                        return Some(Inline::$variant(*value));
                    }
                )*
                None
            }

            fn payload(&self) -> &Payload {
                match self {
                    $(Inline::$variant(value) => value as &Payload,)*
                }
            }

            fn payload_mut(&mut self) -> &mut Payload {
                match self {
                    $(Inline::$variant(value) => value as &mut Payload,)*
                }
            }
        }
    };
}

inline_scalars! {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    Long(Long),
    ULong(ULong),
    CChar(CChar),
    Nullptr(Nullptr),
    CborSimple(CborSimpleType),
}

#[derive(Clone)]
enum Storage {
    Empty,
    Inline(Inline),
    /// Shared between clones until one of them writes.
    Shared(Arc<Payload>),
}

impl Storage {
    fn new(payload: Box<Payload>) -> Self {
        match Inline::from_payload(&*payload) {
            Some(inline) => Storage::Inline(inline),
            None => Storage::Shared(Arc::from(payload)),
        }
    }

    fn payload(&self) -> Option<&Payload> {
        match self {
            Storage::Empty => None,
            Storage::Inline(inline) => Some(inline.payload()),
            Storage::Shared(block) => Some(&**block),
        }
    }
}

/// A value of any registered type.
///
/// A variant is either invalid (no type at all) or holds one value of a
/// type known to the [`TypeRegistry`](dynvar_core::TypeRegistry). Besides
/// its value it carries a null flag, set when the value was never
/// initialized or when a conversion into it failed.
///
/// Cloning is cheap: large payloads are shared and only copied when one of
/// the clones is written through [`Variant::get_mut`] or
/// [`Variant::payload_mut`].
#[derive(Clone)]
pub struct Variant {
    pub(crate) info: Option<&'static TypeInfo>,
    pub(crate) is_null: bool,
    storage: Storage,
}

static_assertions::assert_impl_all!(Variant: Send, Sync, Clone);

impl Default for Variant {
    fn default() -> Self {
        Self::new()
    }
}

impl Variant {
    /// The invalid variant.
    pub const fn new() -> Self {
        Variant {
            info: None,
            is_null: true,
            storage: Storage::Empty,
        }
    }

    /// A null variant holding the default value of `id`.
    ///
    /// Unregistered ids and types without storage give an invalid variant.
    pub fn with_type(id: MetaTypeId) -> Self {
        Self::from_raw(id, None)
    }

    /// A variant of type `id` holding a copy of `source`, or the type's
    /// default value (and the null flag) when there is no source.
    ///
    /// `source` must have the Rust type registered for `id`.
    pub fn from_raw(id: MetaTypeId, source: Option<&Payload>) -> Self {
        match registry().info(id) {
            Some(info) => Self::from_info(info, source),
            None => {
                if !id.is_unknown() {
                    tracing::trace!("type {id:?} is not registered");
                }
                Variant::new()
            }
        }
    }

    pub(crate) fn from_info(info: &'static TypeInfo, source: Option<&Payload>) -> Self {
        if info.size == 0 {
            return Variant::new();
        }
        let source = source.filter(|source| {
            let matches = (**source).type_id() == info.rust_type;
            debug_assert!(matches, "payload is not a {}", info.name);
            matches
        });
        let payload = match source {
            Some(source) => info.copy(source),
            None => info.construct(),
        };
        Variant {
            info: Some(info),
            is_null: source.is_none() || info.id == MetaTypeId::NULLPTR,
            storage: Storage::new(payload),
        }
    }

    /// Wraps a freshly produced payload of `info`'s type.
    pub(crate) fn from_payload(info: &'static TypeInfo, payload: Box<Payload>) -> Self {
        if info.size == 0 {
            return Variant::new();
        }
        Variant {
            info: Some(info),
            is_null: info.id == MetaTypeId::NULLPTR,
            storage: Storage::new(payload),
        }
    }

    /// A variant holding `value`. Its Rust type must be registered.
    pub fn from_value<T: Any + Send + Sync>(value: T) -> Self {
        match registry().info_by_rust_type(TypeId::of::<T>()) {
            Some(info) => Self::from_payload(info, Box::new(value)),
            None => {
                debug_assert!(false, "{} is not a registered type", type_name::<T>());
                tracing::warn!("storing unregistered type {}", type_name::<T>());
                Variant::new()
            }
        }
    }

    /// The type id; [`MetaTypeId::UNKNOWN`] when invalid.
    pub fn type_id(&self) -> MetaTypeId {
        self.info.map_or(MetaTypeId::UNKNOWN, |info| info.id)
    }

    /// The registry entry of the held type.
    pub fn type_info(&self) -> Option<&'static TypeInfo> {
        self.info
    }

    /// The registered name of the held type.
    pub fn type_name(&self) -> Option<&'static str> {
        self.info.map(|info| info.name)
    }

    /// Whether the variant holds a type.
    pub fn is_valid(&self) -> bool {
        self.info.is_some()
    }

    /// Whether the value is null: never initialized, left over from a
    /// failed conversion, or a null pointer.
    pub fn is_null(&self) -> bool {
        if self.is_null {
            return true;
        }
        match (self.info, self.payload()) {
            (Some(info), Some(payload)) => info.is_null_pointer(payload),
            _ => false,
        }
    }

    /// Whether the payload is owned by this variant alone.
    pub fn is_detached(&self) -> bool {
        match &self.storage {
            Storage::Shared(block) => Arc::strong_count(block) == 1,
            _ => true,
        }
    }

    /// Whether the payload sits in a shared heap block.
    pub fn is_shared(&self) -> bool {
        matches!(self.storage, Storage::Shared(_))
    }

    /// The type-erased value.
    pub fn payload(&self) -> Option<&Payload> {
        self.storage.payload()
    }

    /// The value, if it is a `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.payload()?.downcast_ref()
    }

    /// Mutable access to the value, if it is a `T`.
    ///
    /// Detaches the payload first and clears the null flag.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        if self.info?.rust_type != TypeId::of::<T>() {
            return None;
        }
        self.payload_mut()?.downcast_mut()
    }

    /// Mutable access to the type-erased value.
    ///
    /// Detaches the payload first and clears the null flag.
    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        self.info?;
        self.is_null = false;
        self.storage_mut()
    }

    pub(crate) fn storage_mut(&mut self) -> Option<&mut Payload> {
        self.detach();
        match &mut self.storage {
            Storage::Empty => None,
            Storage::Inline(inline) => Some(inline.payload_mut()),
            Storage::Shared(block) => Arc::get_mut(block),
        }
    }

    /// Gives this variant its own copy of a shared payload.
    pub fn detach(&mut self) {
        let (Some(info), Storage::Shared(block)) = (self.info, &mut self.storage) else {
            return;
        };
        if Arc::get_mut(block).is_none() {
            *block = Arc::from(info.copy(&**block));
        }
    }

    /// Whether both variants point at the same heap block.
    pub(crate) fn shares_storage_with(&self, other: &Variant) -> bool {
        match (&self.storage, &other.storage) {
            (Storage::Shared(a), Storage::Shared(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Makes the variant invalid.
    pub fn clear(&mut self) {
        *self = Variant::new();
    }

    /// Replaces the held value, and possibly its type.
    pub fn set_value<T: Any + Send + Sync>(&mut self, value: T) {
        *self = Variant::from_value(value);
    }

    /// The value as a `T`, converting when the types differ; `T`'s default
    /// when that fails.
    pub fn value<T: Any + Send + Sync + Clone + Default>(&self) -> T {
        self.try_value().unwrap_or_default()
    }

    /// The value as a `T`, converting when the types differ.
    pub fn try_value<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        if let Some(value) = self.get::<T>() {
            return Some(value.clone());
        }
        let target = registry().id_of::<T>()?;
        self.try_convert(target).ok()?.into_value()
    }

    /// Moves the value out, if it is a `T`.
    pub fn into_value<T: Any + Send + Sync + Clone>(self) -> Option<T> {
        match self.storage {
            Storage::Empty => None,
            Storage::Inline(inline) => inline.payload().downcast_ref::<T>().cloned(),
            Storage::Shared(block) => {
                let block = block.downcast::<T>().ok()?;
                Some(Arc::try_unwrap(block).unwrap_or_else(|shared| (*shared).clone()))
            }
        }
    }

    /// The untyped object pointer, for object pointer types.
    pub(crate) fn object_ptr(&self) -> Option<ObjectPtr> {
        let ops = self.info?.vtable.object?;
        Some((ops.get)(self.payload()?))
    }
}

macro_rules! from_values {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Variant {
                fn from(value: $t) -> Self {
                    Variant::from_value(value)
                }
            }
        )*
    };
}

from_values! {
    bool, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, char,
    Long, ULong, CChar,
    String, Vec<String>, Vec<u8>, Vec<Vec<u8>>,
    NaiveDate, NaiveTime, NaiveDateTime, Uuid,
    Point, PointF, Size, SizeF, Rect, RectF, Line, LineF,
    ModelIndex, PersistentModelIndex, Nullptr, ObjectPtr,
    JsonValue, JsonObject, JsonArray, JsonDocument,
    CborSimpleType, CborValue, CborArray, CborMap,
    VariantList, VariantMap, VariantHash,
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::from_value(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_invalid_and_null() {
        dynvar_testhelpers::setup();
        let v = Variant::new();
        assert!(!v.is_valid());
        assert!(v.is_null());
        assert_eq!(v.type_id(), MetaTypeId::UNKNOWN);
        assert!(v.payload().is_none());
    }

    #[test]
    fn typed_construction_without_source_is_null() {
        dynvar_testhelpers::setup();
        for id in [MetaTypeId::INT, MetaTypeId::STRING, MetaTypeId::RECT, MetaTypeId::JSON_VALUE] {
            let v = Variant::with_type(id);
            assert!(v.is_valid(), "{id:?}");
            assert!(v.is_null(), "{id:?}");
        }
        assert_eq!(Variant::with_type(MetaTypeId::INT).get::<i32>(), Some(&0));
        assert_eq!(Variant::with_type(MetaTypeId::RECT).get::<Rect>(), Some(&Rect::default()));
    }

    #[test]
    fn void_and_reserved_ids_are_invalid() {
        dynvar_testhelpers::setup();
        assert!(!Variant::with_type(MetaTypeId::VOID).is_valid());
        assert!(!Variant::with_type(MetaTypeId::FONT).is_valid());
    }

    #[test]
    fn nullptr_is_always_null() {
        dynvar_testhelpers::setup();
        let v = Variant::from(Nullptr);
        assert!(v.is_valid());
        assert!(v.is_null());
    }

    #[test]
    fn scalars_are_inline_and_strings_are_shared() {
        dynvar_testhelpers::setup();
        assert!(!Variant::from(42).is_shared());
        assert!(!Variant::from('x').is_shared());
        assert!(Variant::from("text").is_shared());
    }

    #[test]
    fn clones_share_until_written() {
        dynvar_testhelpers::setup();
        let original = Variant::from("hello");
        let mut copy = original.clone();
        assert!(!original.is_detached());
        assert!(copy.shares_storage_with(&original));

        copy.get_mut::<String>().unwrap().push_str(", world");
        assert!(copy.is_detached());
        assert!(original.is_detached());
        assert_eq!(original.get::<String>().map(String::as_str), Some("hello"));
        assert_eq!(copy.get::<String>().map(String::as_str), Some("hello, world"));
    }

    #[test]
    fn mutable_access_clears_null() {
        dynvar_testhelpers::setup();
        let mut v = Variant::with_type(MetaTypeId::INT);
        assert!(v.is_null());
        *v.get_mut::<i32>().unwrap() = 7;
        assert!(!v.is_null());
        assert_eq!(v.get::<i32>(), Some(&7));
        assert!(v.get_mut::<u32>().is_none());
    }

    #[test]
    fn into_value_moves_or_clones() {
        dynvar_testhelpers::setup();
        let v = Variant::from(vec!["a".to_string()]);
        let shared = v.clone();
        assert_eq!(v.into_value::<Vec<String>>(), Some(vec!["a".to_string()]));
        assert_eq!(shared.into_value::<Vec<String>>(), Some(vec!["a".to_string()]));
        assert_eq!(Variant::from(1u8).into_value::<u8>(), Some(1));
        assert_eq!(Variant::from(1u8).into_value::<i8>(), None);
    }

    #[test]
    fn clear_resets_to_invalid() {
        dynvar_testhelpers::setup();
        let mut v = Variant::from(3.5);
        v.clear();
        assert!(!v.is_valid());
        v.set_value(2u16);
        assert_eq!(v.type_id(), MetaTypeId::USHORT);
    }
}
