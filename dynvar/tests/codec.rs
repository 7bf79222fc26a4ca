use dynvar::{
    MetaTypeId, StreamOptions, StreamReader, StreamStatus, StreamVersion, StreamWriter,
    Streamable, TypeBuilder, Variant, VariantList, VariantMap, registry,
};
use dynvar_testhelpers::setup;
use uuid::Uuid;

#[derive(Clone, Default, Debug, PartialEq)]
struct Meters(u32);

impl Streamable for Meters {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_u32(self.0);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        Meters(input.read_u32())
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Pattern(String);

impl Streamable for Pattern {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_str(&self.0);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        Pattern(input.read_str())
    }
}

fn register_meters() -> MetaTypeId {
    registry().register(TypeBuilder::<Meters>::new("Meters").eq().debug().streamable())
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn save(value: &Variant, version: StreamVersion) -> Vec<u8> {
    let mut out = StreamWriter::with_options(StreamOptions::with_version(version));
    value.save(&mut out);
    out.into_inner()
}

fn load(bytes: &[u8], version: StreamVersion) -> (Variant, StreamStatus) {
    let mut input = StreamReader::with_options(bytes, StreamOptions::with_version(version));
    let value = Variant::load(&mut input);
    assert!(input.at_end() || !input.is_ok(), "trailing bytes");
    (value, input.status())
}

fn round_trip(value: &Variant, version: StreamVersion) -> Variant {
    let (loaded, status) = load(&save(value, version), version);
    assert_eq!(status, StreamStatus::Ok, "{value:?} at {version:?}");
    loaded
}

#[test]
fn int_layout() {
    setup();
    insta::assert_snapshot!(hex(&save(&Variant::from(42), StreamVersion::CURRENT)), @"00 00 00 02 00 00 00 00 2a");
    insta::assert_snapshot!(hex(&save(&Variant::from(42), StreamVersion::V4_0)), @"00 00 00 02 00 00 00 2a");
    insta::assert_snapshot!(hex(&save(&Variant::from(42), StreamVersion::V3_3)), @"00 00 00 10 00 00 00 2a");
}

#[test]
fn invalid_before_5_0_writes_an_empty_string() {
    setup();
    let bytes = save(&Variant::new(), StreamVersion::V4_6);
    insta::assert_snapshot!(hex(&bytes), @"00 00 00 00 01 ff ff ff ff");

    let (loaded, status) = load(&bytes, StreamVersion::V4_6);
    assert_eq!(status, StreamStatus::Ok);
    assert!(!loaded.is_valid());
    assert!(loaded.is_null());
}

#[test]
fn invalid_from_5_0_is_just_the_header() {
    setup();
    let bytes = save(&Variant::new(), StreamVersion::V5_0);
    insta::assert_snapshot!(hex(&bytes), @"00 00 00 00 01");
    let (loaded, status) = load(&bytes, StreamVersion::V5_0);
    assert_eq!(status, StreamStatus::Ok);
    assert!(!loaded.is_valid());
}

#[test]
fn moved_ids_are_shifted_in_4_x() {
    setup();
    let bytes = save(&Variant::from(5i16), StreamVersion::V4_6);
    insta::assert_snapshot!(hex(&bytes), @"00 00 00 82 00 00 05");

    let (loaded, status) = load(&bytes, StreamVersion::V4_6);
    assert_eq!(status, StreamStatus::Ok);
    assert_eq!(loaded.type_id(), MetaTypeId::SHORT);
    assert_eq!(loaded.get::<i16>(), Some(&5));
}

#[test]
fn builtins_round_trip_at_every_version() {
    setup();
    let values = [
        Variant::from(true),
        Variant::from(-7),
        Variant::from(7u32),
        Variant::from(i64::MIN),
        Variant::from(u64::MAX),
        Variant::from(2.5),
        Variant::from("text"),
        Variant::from(vec!["a".to_string(), "b".to_string()]),
        Variant::from(b"bytes".to_vec()),
    ];
    for version in [
        StreamVersion::V4_0,
        StreamVersion::V4_2,
        StreamVersion::V4_6,
        StreamVersion::V5_0,
        StreamVersion::V5_15,
    ] {
        for value in &values {
            let loaded = round_trip(value, version);
            assert_eq!(loaded.type_id(), value.type_id(), "{value:?} at {version:?}");
            assert_eq!(&loaded, value, "at {version:?}");
        }
    }
}

#[test]
fn types_missing_from_the_oldest_table_save_as_invalid() {
    setup();
    let bytes = save(&Variant::from('x'), StreamVersion::V3_3);
    insta::assert_snapshot!(hex(&bytes), @"00 00 00 00 ff ff ff ff");
    let (loaded, status) = load(&bytes, StreamVersion::V3_3);
    assert_eq!(status, StreamStatus::Ok);
    assert!(!loaded.is_valid());
}

#[test]
fn null_flag_survives() {
    setup();
    let loaded = round_trip(&Variant::with_type(MetaTypeId::DOUBLE), StreamVersion::CURRENT);
    assert_eq!(loaded.type_id(), MetaTypeId::DOUBLE);
    assert!(loaded.is_null());
}

#[test]
fn nested_containers_round_trip() {
    setup();
    let mut map = VariantMap::new();
    map.insert("n".into(), Variant::from(1));
    map.insert(
        "list".into(),
        Variant::from(VariantList::from([Variant::from("x"), Variant::new()])),
    );
    let value = Variant::from(map);
    for version in [StreamVersion::V4_6, StreamVersion::CURRENT] {
        let loaded = round_trip(&value, version);
        assert_eq!(loaded, value);
        let list = loaded.to_map()["list"].to_list();
        assert!(!list[1].is_valid());
    }
}

#[test]
fn user_types_travel_by_name() {
    setup();
    register_meters();
    let value = Variant::from_value(Meters(5));
    let bytes = save(&value, StreamVersion::CURRENT);
    insta::assert_snapshot!(
        hex(&bytes),
        @"00 00 04 00 00 00 00 00 07 4d 65 74 65 72 73 00 00 00 00 05"
    );
    let (loaded, status) = load(&bytes, StreamVersion::CURRENT);
    assert_eq!(status, StreamStatus::Ok);
    assert_eq!(loaded.get::<Meters>(), Some(&Meters(5)));

    let legacy = save(&value, StreamVersion::V4_6);
    assert_eq!(&legacy[..4], &[0, 0, 0, 127]);
    let (loaded, status) = load(&legacy, StreamVersion::V4_6);
    assert_eq!(status, StreamStatus::Ok);
    assert_eq!(loaded.get::<Meters>(), Some(&Meters(5)));
}

#[test]
fn uuid_is_a_named_type_in_4_x() {
    setup();
    let value = Variant::from(Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0));
    let bytes = save(&value, StreamVersion::V4_6);
    assert_eq!(&bytes[..14], b"\0\0\0\x7f\0\0\0\0\x05Uuid\0");
    let (loaded, status) = load(&bytes, StreamVersion::V4_6);
    assert_eq!(status, StreamStatus::Ok);
    assert_eq!(loaded, value);
}

#[test]
fn legacy_regexp_is_written_by_id() {
    setup();
    registry().register(TypeBuilder::<Pattern>::new("RegExp").eq().debug().streamable());
    let value = Variant::from_value(Pattern("a+".into()));
    let bytes = save(&value, StreamVersion::CURRENT);
    insta::assert_snapshot!(hex(&bytes), @"00 00 00 1b 00 00 00 00 04 00 61 00 2b");
    let (loaded, status) = load(&bytes, StreamVersion::CURRENT);
    assert_eq!(status, StreamStatus::Ok);
    assert_eq!(loaded.get::<Pattern>(), Some(&Pattern("a+".into())));
}

#[test]
fn unknown_type_name_is_corrupt() {
    setup();
    let bytes = [0, 0, 4, 0, 0, 0, 0, 0, 5, b'N', b'o', b'p', b'e', 0];
    let mut input = StreamReader::new(&bytes);
    let loaded = Variant::load(&mut input);
    assert_eq!(input.status(), StreamStatus::ReadCorruptData);
    assert!(!loaded.is_valid());
}

#[test]
fn unregistered_id_is_corrupt() {
    setup();
    let bytes = [0, 0, 0, 64, 0];
    let mut input = StreamReader::new(&bytes);
    let loaded = Variant::load(&mut input);
    assert_eq!(input.status(), StreamStatus::ReadCorruptData);
    assert!(!loaded.is_valid());
}

#[test]
fn ids_past_the_oldest_table_read_nothing_more() {
    setup();
    let options = StreamOptions::with_version(StreamVersion::V3_3);
    let mut out = StreamWriter::with_options(options);
    out.write_u32(40);
    Variant::from(7).save(&mut out);
    let bytes = out.into_inner();

    let mut input = StreamReader::with_options(&bytes, options);
    assert!(!Variant::load(&mut input).is_valid());
    assert_eq!(Variant::load(&mut input), Variant::from(7));
    assert_eq!(input.status(), StreamStatus::Ok);
    assert!(input.at_end());
}

#[test]
fn short_payload_keeps_the_default() {
    setup();
    let bytes = [0, 0, 0, 2, 0, 0, 0];
    let mut input = StreamReader::new(&bytes);
    let loaded = Variant::load(&mut input);
    assert!(!input.is_ok());
    assert_eq!(loaded.type_id(), MetaTypeId::INT);
    assert_eq!(loaded.get::<i32>(), Some(&0));
}

#[test]
fn variants_are_streamable() {
    setup();
    let mut out = StreamWriter::new();
    Variant::from(1.5f32).write_to(&mut out);
    let bytes = out.into_inner();
    let mut input = StreamReader::new(&bytes);
    assert_eq!(Variant::read_from(&mut input), Variant::from(1.5f32));
    assert!(input.at_end());
}
