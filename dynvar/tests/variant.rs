use dynvar::{
    ConvertError, EnumRepr, MetaObject, MetaTypeId, OBJECT_META, Object, ObjectPointer, ObjectPtr,
    Rect, TypeBuilder, Variant, can_convert_types, registry,
};
use dynvar_testhelpers::setup;

// === Lifecycle ===

#[test]
fn typed_values_start_null_with_a_default_payload() {
    setup();
    for id in [
        MetaTypeId::BOOL,
        MetaTypeId::INT,
        MetaTypeId::DOUBLE,
        MetaTypeId::STRING,
        MetaTypeId::STRING_LIST,
        MetaTypeId::RECT,
        MetaTypeId::DATE_TIME,
        MetaTypeId::VARIANT_MAP,
        MetaTypeId::CBOR_VALUE,
    ] {
        let value = Variant::with_type(id);
        assert!(value.is_null(), "{id:?}");
        assert_eq!(value.type_id(), id);
        let info = registry().info(id).unwrap();
        let default = info.construct();
        assert_eq!(info.equals(value.payload().unwrap(), &*default), Some(true), "{id:?}");
    }
}

#[test]
fn copies_compare_equal_and_do_not_alias() {
    setup();
    let original = Variant::from(Rect::new(0, 0, 10, 10));
    let mut copy = original.clone();
    assert_eq!(copy, original);

    copy.get_mut::<Rect>().unwrap().x1 = 5;
    assert_ne!(copy, original);
    assert_eq!(original.get::<Rect>().unwrap().x1, 0);

    let text = Variant::from("shared");
    let mut detached = text.clone();
    assert!(!text.is_detached());
    detached.detach();
    assert!(text.is_detached() && detached.is_detached());
    assert_eq!(detached, text);
}

// === Conversion ===

#[test]
fn double_to_string_and_bad_text_to_int() {
    setup();
    assert_eq!(Variant::from(3.14).value::<String>(), "3.14");

    let mut text = Variant::from("abc");
    assert!(text.can_convert(MetaTypeId::INT));
    assert!(!text.convert(MetaTypeId::INT));
    assert_eq!(text.type_id(), MetaTypeId::INT);
    assert!(text.is_null());
    assert_eq!(text.to_int(), 0);
}

#[test]
fn unsupported_conversion_resets_to_the_target_default() {
    setup();
    let mut value = Variant::from(Rect::new(1, 2, 3, 4));
    assert!(!can_convert_types(MetaTypeId::RECT, MetaTypeId::UUID));
    assert!(matches!(
        value.try_convert(MetaTypeId::UUID),
        Err(ConvertError::Unsupported { .. })
    ));
    assert!(!value.convert(MetaTypeId::UUID));
    assert_eq!(value.type_id(), MetaTypeId::UUID);
    assert!(value.is_null());
}

#[test]
fn successful_conversions_were_allowed() {
    setup();
    let sources = [
        Variant::from(true),
        Variant::from(-3),
        Variant::from(2.5f32),
        Variant::from("12"),
        Variant::from('c'),
        Variant::from(vec!["one".to_string()]),
        Variant::from(Rect::new(0, 0, 1, 1)),
    ];
    let targets = [
        MetaTypeId::BOOL,
        MetaTypeId::INT,
        MetaTypeId::ULONG_LONG,
        MetaTypeId::DOUBLE,
        MetaTypeId::STRING,
        MetaTypeId::BYTE_ARRAY,
        MetaTypeId::STRING_LIST,
        MetaTypeId::VARIANT_LIST,
        MetaTypeId::RECT_F,
        MetaTypeId::JSON_VALUE,
        MetaTypeId::CBOR_VALUE,
    ];
    for source in &sources {
        for &target in &targets {
            if source.try_convert(target).is_ok() {
                assert!(source.can_convert(target), "{source:?} -> {target:?}");
            }
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq)]
enum Level {
    #[default]
    Low,
    High,
}

impl EnumRepr for Level {
    fn to_i64(self) -> i64 {
        self as i64
    }

    fn from_i64(value: i64) -> Self {
        if value == 1 { Level::High } else { Level::Low }
    }
}

#[test]
fn enumerations_convert_through_their_integer() {
    setup();
    let id = registry().register(TypeBuilder::<Level>::new("Level").eq().debug().enumeration());
    let high = Variant::from_value(Level::High);
    assert_eq!(high.to_int(), 1);
    assert_eq!(high.value::<String>(), "1");
    assert!(can_convert_types(MetaTypeId::STRING, id));
    assert_eq!(Variant::from("1").value::<Level>(), Level::High);
    assert_eq!(Variant::from(0u8).value::<Level>(), Level::Low);
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Celsius(f64);

#[test]
fn registered_converters_extend_the_rules() {
    setup();
    let id = registry().register(TypeBuilder::<Celsius>::new("Celsius").eq().debug());
    assert!(!can_convert_types(id, MetaTypeId::STRING));
    registry()
        .register_converter(|c: &Celsius| Some(format!("{}°C", c.0)))
        .unwrap();
    assert!(can_convert_types(id, MetaTypeId::STRING));
    assert_eq!(Variant::from_value(Celsius(21.5)).value::<String>(), "21.5°C");
}

static WIDGET_META: MetaObject = MetaObject::new("Widget", &OBJECT_META);
static BUTTON_META: MetaObject = MetaObject::new("Button", &WIDGET_META);

struct Button;

impl Object for Button {
    fn meta_object(&self) -> &'static MetaObject {
        &BUTTON_META
    }
}

struct Timer;

impl Object for Timer {
    fn meta_object(&self) -> &'static MetaObject {
        &OBJECT_META
    }
}

#[derive(Clone, Default, PartialEq)]
struct WidgetPtr(ObjectPtr);

impl ObjectPointer for WidgetPtr {
    fn as_object_ptr(&self) -> &ObjectPtr {
        &self.0
    }

    fn from_object_ptr(ptr: ObjectPtr) -> Self {
        WidgetPtr(ptr)
    }
}

#[test]
fn object_pointers_follow_the_class_chain() {
    setup();
    let widget = registry().register(
        TypeBuilder::<WidgetPtr>::new("WidgetPtr")
            .eq()
            .object_pointer(&WIDGET_META),
    );

    let button = Variant::from(ObjectPtr::new(Button));
    assert!(button.can_convert(widget));
    let converted = button.try_convert(widget).unwrap();
    assert_eq!(converted.type_id(), widget);
    assert!(!converted.is_null());
    assert_eq!(
        converted.get::<WidgetPtr>().map(|p| p.0.clone()),
        button.get::<ObjectPtr>().cloned()
    );

    let timer = Variant::from(ObjectPtr::new(Timer));
    assert!(!timer.can_convert(widget));
    assert!(can_convert_types(MetaTypeId::OBJECT_STAR, widget));

    // back to the base pointer always works
    assert!(converted.can_convert(MetaTypeId::OBJECT_STAR));
}

// === Equality ===

#[test]
fn bool_and_text_compare_in_allow_mode() {
    setup();
    assert_eq!(Variant::from(true), Variant::from("true"));
    assert_eq!(Variant::from("true"), Variant::from(true));
    assert_ne!(Variant::from(false), Variant::from("no"));
}

#[test]
fn float_and_double_promote() {
    setup();
    assert_eq!(Variant::from(1.0f32), Variant::from(1.0f64));
    assert_eq!(Variant::from(1.0f64), Variant::from(1.0f32));
    assert_eq!(Variant::from(1u8), Variant::from(1.0f32));
}
