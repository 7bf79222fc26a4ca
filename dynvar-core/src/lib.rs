#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![doc = include_str!("../README.md")]

use core::any::Any;

mod bitflags;

mod type_id;
pub use type_id::*;

mod error;
pub use error::*;

pub mod stream;
pub use stream::{
    ByteOrder, FloatPrecision, StreamOptions, StreamReader, StreamStatus, StreamVersion,
    StreamWriter, Streamable,
};

mod object;
pub use object::*;

pub mod container;
pub use container::{
    AssociativeContainer, AssociativeDef, Cursor, IterCapabilities, SequentialContainer,
    SequentialDef,
};

pub mod document;
pub use document::{
    CborArray, CborMap, CborSimpleType, CborValue, JsonArray, JsonDocument, JsonObject, JsonValue,
};

mod registry;
pub use registry::*;

pub mod builtins;
pub use builtins::{
    CChar, Line, LineF, Long, ModelIndex, Nullptr, PersistentModelIndex, Point, PointF, Rect,
    RectF, Size, SizeF, ULong,
};

/// A type-erased value as stored by the registry.
pub type Payload = dyn Any + Send + Sync;

/// Downcasts a payload whose type the caller already checked against the
/// registry.
///
/// # Panics
///
/// When `payload` is not a `T`.
#[track_caller]
pub(crate) fn cast<T: Any>(payload: &Payload) -> &T {
    match payload.downcast_ref::<T>() {
        Some(value) => value,
        None => panic!(
            "payload is not a {}; the type registry is inconsistent",
            core::any::type_name::<T>()
        ),
    }
}
