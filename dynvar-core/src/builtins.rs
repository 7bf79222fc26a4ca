//! The builtin value types and their registration.

use core::ffi::{c_char, c_long, c_ulong};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::document::{
    self, CborArray, CborMap, CborSimpleType, CborValue, JsonArray, JsonDocument, JsonObject,
    JsonValue,
};
use crate::object::{OBJECT_META, ObjectPtr};
use crate::stream::{StreamReader, StreamWriter, Streamable, epoch};
use crate::{MetaTypeId, Payload, TypeBuilder, TypeFlags, TypeRegistry};

/// The null pointer singleton.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Nullptr;

/// A C `long`. Its width follows the platform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Long(pub c_long);

/// A C `unsigned long`. Its width follows the platform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ULong(pub c_ulong);

/// A C `char`, distinct from both `i8` and `u8`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CChar(pub c_char);

/// A point with integer coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

/// A point with floating point coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointF {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// An integer size.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

/// A floating point size.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SizeF {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// An integer rectangle stored by its inclusive corners.
///
/// The default rectangle is null: its right and bottom edges sit one left
/// of and one above its origin, giving zero width and height.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge, inclusive.
    pub x2: i32,
    /// Bottom edge, inclusive.
    pub y2: i32,
}

impl Default for Rect {
    fn default() -> Self {
        Rect {
            x1: 0,
            y1: 0,
            x2: -1,
            y2: -1,
        }
    }
}

impl Rect {
    /// A rectangle at `(x, y)` of the given size.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect {
            x1: x,
            y1: y,
            x2: x + width - 1,
            y2: y + height - 1,
        }
    }

    /// Width.
    pub fn width(&self) -> i32 {
        self.x2 - self.x1 + 1
    }

    /// Height.
    pub fn height(&self) -> i32 {
        self.y2 - self.y1 + 1
    }
}

/// A floating point rectangle stored by origin and size.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RectF {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// A segment between two integer points.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Line {
    /// Start.
    pub p1: Point,
    /// End.
    pub p2: Point,
}

/// A segment between two floating point points.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LineF {
    /// Start.
    pub p1: PointF,
    /// End.
    pub p2: PointF,
}

/// Position of an item in a tabular or tree model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelIndex {
    /// Row, `-1` when invalid.
    pub row: i32,
    /// Column, `-1` when invalid.
    pub column: i32,
    /// Opaque model data.
    pub internal_id: u64,
}

impl Default for ModelIndex {
    fn default() -> Self {
        ModelIndex {
            row: -1,
            column: -1,
            internal_id: 0,
        }
    }
}

impl ModelIndex {
    /// Whether the index points at an item.
    pub fn is_valid(&self) -> bool {
        self.row >= 0 && self.column >= 0
    }
}

/// A [`ModelIndex`] that survives model changes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PersistentModelIndex(pub ModelIndex);

fn round(v: f64) -> i32 {
    v.round() as i32
}

impl From<PointF> for Point {
    fn from(p: PointF) -> Self {
        Point {
            x: round(p.x),
            y: round(p.y),
        }
    }
}

impl From<Point> for PointF {
    fn from(p: Point) -> Self {
        PointF {
            x: f64::from(p.x),
            y: f64::from(p.y),
        }
    }
}

impl From<SizeF> for Size {
    fn from(s: SizeF) -> Self {
        Size {
            width: round(s.width),
            height: round(s.height),
        }
    }
}

impl From<Size> for SizeF {
    fn from(s: Size) -> Self {
        SizeF {
            width: f64::from(s.width),
            height: f64::from(s.height),
        }
    }
}

impl From<RectF> for Rect {
    fn from(r: RectF) -> Self {
        Rect {
            x1: round(r.x),
            y1: round(r.y),
            x2: round(r.x + r.width) - 1,
            y2: round(r.y + r.height) - 1,
        }
    }
}

impl From<Rect> for RectF {
    fn from(r: Rect) -> Self {
        RectF {
            x: f64::from(r.x1),
            y: f64::from(r.y1),
            width: f64::from(r.width()),
            height: f64::from(r.height()),
        }
    }
}

impl From<LineF> for Line {
    fn from(l: LineF) -> Self {
        Line {
            p1: l.p1.into(),
            p2: l.p2.into(),
        }
    }
}

impl From<Line> for LineF {
    fn from(l: Line) -> Self {
        LineF {
            p1: l.p1.into(),
            p2: l.p2.into(),
        }
    }
}

// ============================================================================
// Stream encodings
// ============================================================================

impl Streamable for Nullptr {
    fn write_to(&self, _out: &mut StreamWriter) {}

    fn read_from(_input: &mut StreamReader<'_>) -> Self {
        Nullptr
    }
}

impl Streamable for Long {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_i64(i64::from(self.0));
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        Long(input.read_i64() as c_long)
    }
}

impl Streamable for ULong {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_u64(u64::from(self.0));
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        ULong(input.read_u64() as c_ulong)
    }
}

impl Streamable for CChar {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_i8(self.0 as i8);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        CChar(input.read_i8() as c_char)
    }
}

macro_rules! streamable_struct {
    ($($t:ty { $($field:ident),* })*) => {
        $(
            impl Streamable for $t {
                fn write_to(&self, out: &mut StreamWriter) {
                    $(self.$field.write_to(out);)*
                }

                fn read_from(input: &mut StreamReader<'_>) -> Self {
                    $(let $field = Streamable::read_from(input);)*
                    Self { $($field),* }
                }
            }
        )*
    };
}

streamable_struct! {
    Point { x, y }
    PointF { x, y }
    Size { width, height }
    SizeF { width, height }
    Rect { x1, y1, x2, y2 }
    RectF { x, y, width, height }
    Line { p1, p2 }
    LineF { p1, p2 }
}

// ============================================================================
// Registration
// ============================================================================

fn json_value_eq(a: &Payload, b: &Payload) -> bool {
    match (a.downcast_ref::<JsonValue>(), b.downcast_ref::<JsonValue>()) {
        (Some(a), Some(b)) => document::json_eq(a, b),
        _ => false,
    }
}

fn json_object_eq(a: &Payload, b: &Payload) -> bool {
    match (a.downcast_ref::<JsonObject>(), b.downcast_ref::<JsonObject>()) {
        (Some(a), Some(b)) => document::objects_eq(a, b),
        _ => false,
    }
}

fn json_array_eq(a: &Payload, b: &Payload) -> bool {
    match (a.downcast_ref::<JsonArray>(), b.downcast_ref::<JsonArray>()) {
        (Some(a), Some(b)) => document::arrays_eq(a, b),
        _ => false,
    }
}

fn save_json_array(payload: &Payload, out: &mut StreamWriter) {
    document::write_json_array(crate::cast::<JsonArray>(payload), out);
}

fn load_json_array(payload: &mut Payload, input: &mut StreamReader<'_>) {
    let array = document::read_json_array(input);
    if let Some(slot) = payload.downcast_mut::<JsonArray>() {
        *slot = array;
    }
}

fn default_date() -> Box<Payload> {
    Box::new(epoch().date())
}

fn default_time() -> Box<Payload> {
    Box::new(epoch().time())
}

fn default_date_time() -> Box<Payload> {
    Box::new(epoch())
}

fn builtin<T: Clone + core::any::Any + Send + Sync>(
    registry: &TypeRegistry,
    id: MetaTypeId,
    builder: TypeBuilder<T>,
) {
    if let Err(err) = registry.register_with_id(id, builder) {
        tracing::error!("cannot register builtin {id:?}: {err}");
    }
}

/// Plain value types: equality, debug and streaming.
macro_rules! value_types {
    ($registry:ident; $($id:ident => $t:ty, $name:literal;)*) => {
        $(
            builtin(
                $registry,
                MetaTypeId::$id,
                TypeBuilder::<$t>::new($name)
                    .eq()
                    .debug()
                    .streamable()
                    .flags(TypeFlags::MOVABLE),
            );
        )*
    };
}

pub(crate) fn register_builtins(registry: &TypeRegistry) {
    builtin(registry, MetaTypeId::VOID, TypeBuilder::<()>::new("void").eq().size(0));

    value_types! { registry;
        BOOL => bool, "bool";
        INT => i32, "i32";
        UINT => u32, "u32";
        LONG_LONG => i64, "i64";
        ULONG_LONG => u64, "u64";
        DOUBLE => f64, "f64";
        FLOAT => f32, "f32";
        SHORT => i16, "i16";
        USHORT => u16, "u16";
        SCHAR => i8, "i8";
        UCHAR => u8, "u8";
        C_CHAR => CChar, "c_char";
        LONG => Long, "c_long";
        ULONG => ULong, "c_ulong";
        CHAR => char, "char";
        STRING => String, "String";
        BYTE_ARRAY => Vec<u8>, "ByteArray";
        UUID => Uuid, "Uuid";
        POINT => Point, "Point";
        POINT_F => PointF, "PointF";
        SIZE => Size, "Size";
        SIZE_F => SizeF, "SizeF";
        RECT => Rect, "Rect";
        RECT_F => RectF, "RectF";
        LINE => Line, "Line";
        LINE_F => LineF, "LineF";
        NULLPTR => Nullptr, "nullptr";
        CBOR_SIMPLE_TYPE => CborSimpleType, "CborSimpleType";
        CBOR_VALUE => CborValue, "CborValue";
        CBOR_MAP => CborMap, "CborMap";
        JSON_DOCUMENT => JsonDocument, "JsonDocument";
    }

    builtin(
        registry,
        MetaTypeId::STRING_LIST,
        TypeBuilder::<Vec<String>>::new("StringList")
            .eq()
            .debug()
            .streamable()
            .sequential(),
    );
    builtin(
        registry,
        MetaTypeId::BYTE_ARRAY_LIST,
        TypeBuilder::<Vec<Vec<u8>>>::new("ByteArrayList")
            .eq()
            .debug()
            .streamable()
            .sequential(),
    );
    builtin(
        registry,
        MetaTypeId::CBOR_ARRAY,
        TypeBuilder::<CborArray>::new("CborArray")
            .eq()
            .debug()
            .streamable()
            .sequential(),
    );

    builtin(
        registry,
        MetaTypeId::DATE,
        TypeBuilder::<NaiveDate>::with_default("Date", default_date)
            .eq()
            .debug()
            .streamable(),
    );
    builtin(
        registry,
        MetaTypeId::TIME,
        TypeBuilder::<NaiveTime>::with_default("Time", default_time)
            .eq()
            .debug()
            .streamable(),
    );
    builtin(
        registry,
        MetaTypeId::DATE_TIME,
        TypeBuilder::<NaiveDateTime>::with_default("DateTime", default_date_time)
            .eq()
            .debug()
            .streamable(),
    );

    // model indexes have no stream encoding
    builtin(
        registry,
        MetaTypeId::MODEL_INDEX,
        TypeBuilder::<ModelIndex>::new("ModelIndex").eq().debug(),
    );
    builtin(
        registry,
        MetaTypeId::PERSISTENT_MODEL_INDEX,
        TypeBuilder::<PersistentModelIndex>::new("PersistentModelIndex")
            .eq()
            .debug(),
    );

    builtin(
        registry,
        MetaTypeId::OBJECT_STAR,
        TypeBuilder::<ObjectPtr>::new("ObjectPtr")
            .eq()
            .debug()
            .object_pointer(&OBJECT_META),
    );

    builtin(
        registry,
        MetaTypeId::JSON_VALUE,
        TypeBuilder::<JsonValue>::new("JsonValue")
            .eq_with(json_value_eq)
            .debug()
            .streamable(),
    );
    builtin(
        registry,
        MetaTypeId::JSON_OBJECT,
        TypeBuilder::<JsonObject>::new("JsonObject")
            .eq_with(json_object_eq)
            .debug()
            .streamable()
            .associative(),
    );
    builtin(
        registry,
        MetaTypeId::JSON_ARRAY,
        TypeBuilder::<JsonArray>::new("JsonArray")
            .eq_with(json_array_eq)
            .debug()
            .stream_with(save_json_array, load_json_array)
            .sequential(),
    );

    register_converters(registry);
}

fn converter<F, T>(registry: &TypeRegistry, convert: impl Fn(&F) -> Option<T> + Send + Sync + 'static)
where
    F: core::any::Any,
    T: core::any::Any,
{
    if let Err(err) = registry.register_converter(convert) {
        tracing::error!("cannot register builtin converter: {err}");
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.3f";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Parses an ISO 8601 time, with or without seconds and fractions.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
}

/// Parses an ISO 8601 date-time; a bare date means its midnight.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ]
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    .or_else(|| {
        NaiveDate::parse_from_str(text, DATE_FORMAT)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

/// Formats a date as `yyyy-MM-dd`.
pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Formats a time as `HH:mm:ss.zzz`.
pub fn format_time(time: &NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Formats a date-time as `yyyy-MM-ddTHH:mm:ss.zzz`.
pub fn format_date_time(date_time: &NaiveDateTime) -> String {
    date_time.format(DATE_TIME_FORMAT).to_string()
}

fn register_converters(registry: &TypeRegistry) {
    converter(registry, |d: &NaiveDate| Some(format_date(d)));
    converter(registry, |s: &String| {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
    });
    converter(registry, |d: &NaiveDate| d.and_hms_opt(0, 0, 0));
    converter(registry, |t: &NaiveTime| Some(format_time(t)));
    converter(registry, |s: &String| parse_time(s));
    converter(registry, |dt: &NaiveDateTime| Some(format_date_time(dt)));
    converter(registry, |s: &String| parse_date_time(s));
    converter(registry, |dt: &NaiveDateTime| Some(dt.date()));
    converter(registry, |dt: &NaiveDateTime| Some(dt.time()));

    converter(registry, |u: &Uuid| Some(u.braced().to_string()));
    converter(registry, |s: &String| Uuid::parse_str(s.trim()).ok());
    converter(registry, |u: &Uuid| Some(u.braced().to_string().into_bytes()));
    converter(registry, |b: &Vec<u8>| {
        core::str::from_utf8(b)
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    });

    converter(registry, |p: &Point| Some(PointF::from(*p)));
    converter(registry, |p: &PointF| Some(Point::from(*p)));
    converter(registry, |s: &Size| Some(SizeF::from(*s)));
    converter(registry, |s: &SizeF| Some(Size::from(*s)));
    converter(registry, |r: &Rect| Some(RectF::from(*r)));
    converter(registry, |r: &RectF| Some(Rect::from(*r)));
    converter(registry, |l: &Line| Some(LineF::from(*l)));
    converter(registry, |l: &LineF| Some(Line::from(*l)));

    converter(registry, |i: &ModelIndex| Some(PersistentModelIndex(*i)));
    converter(registry, |i: &PersistentModelIndex| Some(i.0));

    converter(registry, |s: &String| Some(s.clone().into_bytes()));
    converter(registry, |b: &Vec<u8>| {
        Some(String::from_utf8_lossy(b).into_owned())
    });
    converter(registry, |s: &String| Some(vec![s.clone()]));
    converter(registry, |list: &Vec<String>| match list.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    });

    converter(registry, |v: &JsonValue| v.as_object().cloned());
    converter(registry, |v: &JsonValue| v.as_array().cloned());
    converter(registry, |o: &JsonObject| Some(document::json_object_to_cbor(o)));
    converter(registry, |a: &JsonArray| Some(document::json_array_to_cbor(a)));
    converter(registry, |m: &CborMap| Some(document::cbor_map_to_json(m)));
    converter(registry, |a: &CborArray| Some(document::cbor_array_to_json(a)));
    converter(registry, |v: &CborValue| match v {
        CborValue::Array(array) => Some(array.clone()),
        _ => None,
    });
    converter(registry, |v: &CborValue| match v {
        CborValue::Map(map) => Some(map.clone()),
        _ => None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_round_trips_through_rect_f() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(rect.width(), 30);
        let f = RectF::from(rect);
        assert_eq!(f, RectF { x: 10.0, y: 20.0, width: 30.0, height: 40.0 });
        assert_eq!(Rect::from(f), rect);
    }

    #[test]
    fn default_rect_is_empty() {
        let rect = Rect::default();
        assert_eq!((rect.width(), rect.height()), (0, 0));
    }

    #[test]
    fn floating_geometry_rounds_half_away_from_zero() {
        assert_eq!(Point::from(PointF { x: 2.5, y: -2.5 }), Point { x: 3, y: -3 });
    }

    #[test]
    fn time_parsing_accepts_partial_forms() {
        assert_eq!(parse_time("12:30"), NaiveTime::from_hms_opt(12, 30, 0));
        assert_eq!(parse_time("12:30:15.250"), NaiveTime::from_hms_milli_opt(12, 30, 15, 250));
        assert_eq!(
            parse_date_time("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
    }
}
