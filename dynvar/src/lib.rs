#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![doc = include_str!("../README.md")]

pub use dynvar_core;
pub use dynvar_core::{
    CChar, CborArray, CborMap, CborSimpleType, CborValue, EnumRepr, IterCapabilities, JsonArray,
    JsonDocument, JsonObject, JsonValue, Line, LineF, Long, MetaObject, MetaTypeId, ModelIndex,
    Nullptr, OBJECT_META, Object, ObjectPointer, ObjectPtr, PersistentModelIndex, Point, PointF,
    Rect, RectF, Size, SizeF, StreamOptions, StreamReader, StreamStatus, StreamVersion,
    StreamWriter, Streamable, TypeBuilder, TypeFlags, TypeInfo, TypeRegistry, ULong,
};

mod variant;
pub use variant::*;

mod types;
pub use types::*;

mod error;
pub use error::*;

mod numeric;
pub use numeric::*;

mod capability;
pub use capability::*;

mod convert;

mod document;
pub use document::{cbor_to_variant, json_to_variant};

mod equality;

mod codec;

mod iterable;
pub use iterable::*;

mod debug;
