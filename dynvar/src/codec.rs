//! Writing variants to and reading them from a [`StreamWriter`] /
//! [`StreamReader`].
//!
//! A variant goes on the wire as its type id, a null flag (from
//! [`StreamVersion::V4_2`] on), the type name for types that are resolved
//! by name, and finally the payload as the type's own stream operation
//! writes it. Older protocol versions numbered the types differently; the
//! `IdMapping` for the stream's version translates in both directions.

use dynvar_core::{
    MetaTypeId, StreamReader, StreamStatus, StreamVersion, StreamWriter, Streamable, TypeInfo,
};

use crate::{Variant, registry};

/// Name under which the legacy regular expression type is looked up.
const LEGACY_REGEXP_NAME: &str = "RegExp";

/// How a type goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WireId {
    id: u32,
    /// Written after the null flag; the reader resolves the type from it.
    name: Option<&'static str>,
}

impl WireId {
    const INVALID: WireId = WireId::plain(0);

    const fn plain(id: u32) -> Self {
        WireId { id, name: None }
    }

    const fn named(id: u32, name: &'static str) -> Self {
        WireId {
            id,
            name: Some(name),
        }
    }
}

/// What a wire id stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    Id(MetaTypeId),
    /// The type name follows in the stream.
    Named,
    /// A retired id, looked up by a fixed name.
    ByName(&'static str),
    /// Past the pre-4.0 table; nothing else was written.
    OutOfTable,
}

/// Translation between type ids and the ids of one protocol generation.
trait IdMapping: Sync {
    fn to_wire(&self, info: Option<&'static TypeInfo>) -> WireId;
    fn from_wire(&self, wire: u32) -> Resolved;
}

// === Before 4.0 ===

/// The fixed table of the oldest streams, indexed by wire id. Zero marks
/// slots no current type answers to.
const PRE_V4_TABLE: [MetaTypeId; 36] = [
    MetaTypeId::UNKNOWN,
    MetaTypeId::VARIANT_MAP,
    MetaTypeId::VARIANT_LIST,
    MetaTypeId::STRING,
    MetaTypeId::STRING_LIST,
    MetaTypeId::FONT,
    MetaTypeId::PIXMAP,
    MetaTypeId::BRUSH,
    MetaTypeId::RECT,
    MetaTypeId::SIZE,
    MetaTypeId::COLOR,
    MetaTypeId::PALETTE,
    MetaTypeId::UNKNOWN,
    MetaTypeId::ICON,
    MetaTypeId::POINT,
    MetaTypeId::IMAGE,
    MetaTypeId::INT,
    MetaTypeId::UINT,
    MetaTypeId::BOOL,
    MetaTypeId::DOUBLE,
    MetaTypeId::UNKNOWN,
    MetaTypeId::POLYGON,
    MetaTypeId::REGION,
    MetaTypeId::BITMAP,
    MetaTypeId::CURSOR,
    MetaTypeId::SIZE_POLICY,
    MetaTypeId::DATE,
    MetaTypeId::TIME,
    MetaTypeId::DATE_TIME,
    MetaTypeId::BYTE_ARRAY,
    MetaTypeId::BIT_ARRAY,
    MetaTypeId::KEY_SEQUENCE,
    MetaTypeId::PEN,
    MetaTypeId::LONG_LONG,
    MetaTypeId::ULONG_LONG,
    MetaTypeId::EASING_CURVE,
];

struct PreV4;

impl IdMapping for PreV4 {
    fn to_wire(&self, info: Option<&'static TypeInfo>) -> WireId {
        let Some(info) = info else {
            return WireId::INVALID;
        };
        match PRE_V4_TABLE.iter().position(|&id| id == info.id) {
            Some(index) if index > 0 => WireId::plain(index as u32),
            _ => {
                tracing::trace!("{} has no id before 4.0, saving as invalid", info.name);
                WireId::INVALID
            }
        }
    }

    fn from_wire(&self, wire: u32) -> Resolved {
        match PRE_V4_TABLE.get(wire as usize) {
            Some(&id) => Resolved::Id(id),
            None => Resolved::OutOfTable,
        }
    }
}

// === 4.x ===

const V4_USER_TYPE: u32 = 127;
/// Core ids from here up were 97 higher in 4.x.
const V4_SHIFTED_CORE: u32 = 128 - 97;
const V4_SHIFT: u32 = 97;
const V4_SIZE_POLICY: u32 = 75;

struct V4;

impl IdMapping for V4 {
    fn to_wire(&self, info: Option<&'static TypeInfo>) -> WireId {
        let Some(info) = info else {
            return WireId::INVALID;
        };
        let id = info.id;
        let raw = id.0;
        if id.is_user_type() {
            if info.name == LEGACY_REGEXP_NAME {
                return WireId::plain(MetaTypeId::LEGACY_REGEXP.0);
            }
            WireId::named(V4_USER_TYPE, info.name)
        } else if (V4_SHIFTED_CORE..=MetaTypeId::LAST_CORE_TYPE.0).contains(&raw) {
            WireId::plain(raw + V4_SHIFT)
        } else if id == MetaTypeId::SIZE_POLICY {
            WireId::plain(V4_SIZE_POLICY)
        } else if (MetaTypeId::KEY_SEQUENCE.0..=MetaTypeId::QUATERNION.0).contains(&raw) {
            WireId::plain(raw + 1)
        } else if id == MetaTypeId::POLYGON_F || id == MetaTypeId::UUID {
            // 4.x knew these only as user types
            WireId::named(V4_USER_TYPE, info.name)
        } else {
            WireId::plain(raw)
        }
    }

    fn from_wire(&self, wire: u32) -> Resolved {
        match wire {
            V4_USER_TYPE => Resolved::Named,
            w if w == MetaTypeId::LEGACY_REGEXP.0 => Resolved::ByName(LEGACY_REGEXP_NAME),
            w if w >= 128 && w != MetaTypeId::USER.0 => Resolved::Id(MetaTypeId(w - V4_SHIFT)),
            V4_SIZE_POLICY => Resolved::Id(MetaTypeId::SIZE_POLICY),
            w if w > V4_SIZE_POLICY && w <= MetaTypeId::QUATERNION.0 + 1 => {
                Resolved::Id(MetaTypeId(w - 1))
            }
            w => Resolved::Id(MetaTypeId(w)),
        }
    }
}

// === 5.0 and later ===

struct Current;

impl IdMapping for Current {
    fn to_wire(&self, info: Option<&'static TypeInfo>) -> WireId {
        match info {
            None => WireId::INVALID,
            Some(info) if info.id.is_user_type() => {
                if info.name == LEGACY_REGEXP_NAME {
                    WireId::plain(MetaTypeId::LEGACY_REGEXP.0)
                } else {
                    WireId::named(MetaTypeId::USER.0, info.name)
                }
            }
            Some(info) => WireId::plain(info.id.0),
        }
    }

    fn from_wire(&self, wire: u32) -> Resolved {
        match MetaTypeId(wire) {
            MetaTypeId::USER => Resolved::Named,
            MetaTypeId::LEGACY_REGEXP => Resolved::ByName(LEGACY_REGEXP_NAME),
            id => Resolved::Id(id),
        }
    }
}

/// Older readers expect a payload even for invalid values.
fn save_invalid(out: &mut StreamWriter) {
    if out.version() < StreamVersion::V5_0 {
        out.write_null_str();
    }
}

fn mapping(version: StreamVersion) -> &'static dyn IdMapping {
    if version < StreamVersion::V4_0 {
        &PreV4
    } else if version < StreamVersion::V5_0 {
        &V4
    } else {
        &Current
    }
}

impl Variant {
    /// Writes the variant to `out` in the layout of `out`'s version.
    ///
    /// Types without a stream operation write their header only; a warning
    /// is logged.
    pub fn save(&self, out: &mut StreamWriter) {
        let version = out.version();
        let wire = mapping(version).to_wire(self.info);
        tracing::trace!(?version, ?wire, "saving {:?}", self.type_id());

        out.write_u32(wire.id);
        if version >= StreamVersion::V4_2 {
            out.write_i8(i8::from(self.is_null));
        }
        if let Some(name) = wire.name {
            out.write_cstr(name.as_bytes());
        }

        let (Some(info), Some(payload)) = (self.info, self.payload()) else {
            return save_invalid(out);
        };
        if wire == WireId::INVALID {
            return save_invalid(out);
        }
        if !info.save(payload, out) {
            tracing::warn!("unable to save type '{}' (type id: {})", info.name, info.id.0);
        }
    }

    /// Reads a variant written by [`Variant::save`] at `input`'s version.
    ///
    /// Unknown type names and payloads that fail to load flag the reader
    /// with [`StreamStatus::ReadCorruptData`]. The result is then invalid,
    /// or the default value of the type when only the payload was bad.
    pub fn load(input: &mut StreamReader<'_>) -> Variant {
        let version = input.version();
        let wire = input.read_u32();
        let resolved = mapping(version).from_wire(wire);
        if resolved == Resolved::OutOfTable {
            tracing::trace!(?version, wire, "no type before 4.0");
            return Variant::new();
        }
        let is_null = if version >= StreamVersion::V4_2 {
            input.read_i8() != 0
        } else {
            false
        };

        let info = match resolved {
            Resolved::Id(id) => registry().info(id),
            Resolved::Named => {
                let name = input.read_cstr();
                let name = String::from_utf8_lossy(&name);
                let info = registry().info_by_name(&name);
                if info.is_none() {
                    input.set_status(StreamStatus::ReadCorruptData);
                    tracing::warn!("unknown user type with name {name}");
                    return Variant::new();
                }
                info
            }
            Resolved::ByName(name) => registry().info_by_name(name),
            Resolved::OutOfTable => None,
        };
        tracing::trace!(?version, wire, ?resolved, "loading {:?}", info.map(|info| info.id));

        let Some(info) = info.filter(|info| info.size > 0) else {
            if version < StreamVersion::V5_0 {
                // whatever was written in place of a payload
                input.read_str();
            }
            if resolved != Resolved::Id(MetaTypeId::UNKNOWN) {
                input.set_status(StreamStatus::ReadCorruptData);
                tracing::warn!("unable to load unregistered type id {wire}");
            }
            return Variant::new();
        };

        let mut value = Variant::from_info(info, None);
        value.is_null = is_null;
        if let Some(payload) = value.storage_mut()
            && !info.load(payload, input)
        {
            input.set_status(StreamStatus::ReadCorruptData);
            tracing::warn!("unable to load type {}", info.id.0);
        }
        value
    }
}

impl Streamable for Variant {
    fn write_to(&self, out: &mut StreamWriter) {
        self.save(out);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        Variant::load(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynvar_core::StreamOptions;

    fn info(id: MetaTypeId) -> Option<&'static TypeInfo> {
        registry().info(id)
    }

    #[test]
    fn pre_v4_uses_the_legacy_table() {
        dynvar_testhelpers::setup();
        assert_eq!(PreV4.to_wire(info(MetaTypeId::INT)), WireId::plain(16));
        assert_eq!(PreV4.to_wire(info(MetaTypeId::VARIANT_MAP)), WireId::plain(1));
        assert_eq!(PreV4.to_wire(info(MetaTypeId::EASING_CURVE)), WireId::INVALID);
        assert_eq!(PreV4.to_wire(info(MetaTypeId::UUID)), WireId::INVALID);
        assert_eq!(PreV4.to_wire(None), WireId::INVALID);

        assert_eq!(PreV4.from_wire(19), Resolved::Id(MetaTypeId::DOUBLE));
        assert_eq!(PreV4.from_wire(12), Resolved::Id(MetaTypeId::UNKNOWN));
        assert_eq!(PreV4.from_wire(36), Resolved::OutOfTable);
    }

    #[test]
    fn v4_shifts_moved_ids() {
        dynvar_testhelpers::setup();
        assert_eq!(V4.to_wire(info(MetaTypeId::INT)), WireId::plain(2));
        assert_eq!(V4.to_wire(info(MetaTypeId::LONG)), WireId::plain(129));
        assert_eq!(V4.to_wire(info(MetaTypeId::CBOR_MAP)), WireId::plain(152));
        assert_eq!(V4.to_wire(info(MetaTypeId::UUID)), WireId::named(127, "Uuid"));

        assert_eq!(V4.from_wire(129), Resolved::Id(MetaTypeId::LONG));
        assert_eq!(V4.from_wire(75), Resolved::Id(MetaTypeId::SIZE_POLICY));
        assert_eq!(V4.from_wire(76), Resolved::Id(MetaTypeId::KEY_SEQUENCE));
        assert_eq!(V4.from_wire(86), Resolved::Id(MetaTypeId::QUATERNION));
        assert_eq!(V4.from_wire(127), Resolved::Named);
        assert_eq!(V4.from_wire(30), Resolved::Id(MetaTypeId::UUID));
    }

    #[test]
    fn v4_ids_invert() {
        dynvar_testhelpers::setup();
        for raw in 1..=MetaTypeId::LAST_CORE_TYPE.0 {
            let Some(info) = info(MetaTypeId(raw)) else {
                continue;
            };
            let wire = V4.to_wire(Some(info));
            if wire.name.is_some() {
                continue;
            }
            assert_eq!(V4.from_wire(wire.id), Resolved::Id(info.id), "{:?}", info.id);
        }
    }

    #[test]
    fn current_names_user_types() {
        dynvar_testhelpers::setup();
        assert_eq!(Current.to_wire(info(MetaTypeId::UUID)), WireId::plain(30));
        assert_eq!(Current.from_wire(1024), Resolved::Named);
        assert_eq!(Current.from_wire(27), Resolved::ByName("RegExp"));
        assert_eq!(Current.from_wire(2), Resolved::Id(MetaTypeId::INT));
    }

    #[test]
    fn mapping_follows_version() {
        dynvar_testhelpers::setup();
        let wire = |version| mapping(version).from_wire(130);
        assert_eq!(wire(StreamVersion::V3_3), Resolved::OutOfTable);
        assert_eq!(wire(StreamVersion::V4_6), Resolved::Id(MetaTypeId::SHORT));
        assert_eq!(wire(StreamVersion::V5_0), Resolved::Id(MetaTypeId(130)));
    }

    #[test]
    fn round_trip_keeps_null_flag() {
        dynvar_testhelpers::setup();
        let mut out = StreamWriter::new();
        Variant::with_type(MetaTypeId::STRING).save(&mut out);
        Variant::from("set").save(&mut out);

        let bytes = out.into_inner();
        let mut input = StreamReader::new(&bytes);
        let null = Variant::load(&mut input);
        let set = Variant::load(&mut input);
        assert!(input.is_ok());
        assert!(null.is_null());
        assert_eq!(null.type_id(), MetaTypeId::STRING);
        assert!(!set.is_null());
        assert_eq!(set.get::<String>().map(String::as_str), Some("set"));
        assert!(input.at_end());
    }

    #[test]
    fn null_flag_is_absent_before_4_2() {
        dynvar_testhelpers::setup();
        let options = StreamOptions::with_version(StreamVersion::V4_0);
        let mut out = StreamWriter::with_options(options);
        Variant::from(7).save(&mut out);
        assert_eq!(out.as_bytes(), &[0, 0, 0, 2, 0, 0, 0, 7]);

        let mut input = StreamReader::with_options(out.as_bytes(), options);
        let value = Variant::load(&mut input);
        assert_eq!(value.get::<i32>(), Some(&7));
        assert!(!value.is_null());
    }
}
