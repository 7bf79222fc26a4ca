use std::collections::BTreeMap;

use dynvar::{
    IterCapabilities, JsonObject, JsonValue, MetaTypeId, TypeBuilder, Variant, VariantList,
    VariantMap, registry,
};
use dynvar_testhelpers::setup;
use serde_json::json;

#[test]
fn json_arrays_iterate_as_json_values() {
    setup();
    let array = json!([1, "two", null]).as_array().cloned().unwrap();
    let value = Variant::from(array);
    let seq = value.sequential().unwrap();
    assert_eq!(seq.value_type(), MetaTypeId::JSON_VALUE);

    let items: Vec<Variant> = seq.iter().collect();
    assert_eq!(items.len(), 3);
    assert_eq!(items[1].value::<String>(), "two");
    assert_eq!(items[0].to_int(), 1);
}

#[test]
fn iterators_walk_both_ways_when_allowed() {
    setup();
    let value = Variant::from(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    let seq = value.sequential().unwrap();
    assert!(seq.capabilities().contains(IterCapabilities::RANDOM_ACCESS));

    let mut it = seq.end();
    it.advance(-1);
    assert_eq!(it.get(), Variant::from("c"));
    it.advance(-2);
    assert_eq!(it.position(), 0);
    assert_eq!(it.offset(1).get(), Variant::from("b"));
    assert_eq!(it.position(), 0);
}

#[test]
fn shared_positions_drive_each_other() {
    setup();
    let list: VariantList = (1..=4).map(Variant::from).collect();
    let value = Variant::from(list);
    let seq = value.sequential().unwrap();
    let mut reader = seq.begin();
    let watcher = reader.clone();

    assert_eq!(reader.next(), Some(Variant::from(1)));
    assert_eq!(watcher.get(), Variant::from(2));
    let rest: Vec<Variant> = reader.collect();
    assert_eq!(rest, vec![Variant::from(2), Variant::from(3), Variant::from(4)]);
    assert!(watcher == seq.end());
}

#[test]
fn json_objects_iterate_in_key_order() {
    setup();
    let object: JsonObject = json!({"b": 2, "a": 1}).as_object().cloned().unwrap();
    let value = Variant::from(object);
    let assoc = value.associative().unwrap();
    assert_eq!(assoc.len(), 2);
    assert_eq!(assoc.key_type(), MetaTypeId::STRING);
    assert_eq!(assoc.mapped_type(), MetaTypeId::JSON_VALUE);

    let keys: Vec<String> = assoc.iter().map(|(k, _)| k.value()).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(
        assoc.value(&Variant::from("b")).and_then(|v| v.try_value::<JsonValue>()),
        Some(json!(2))
    );
}

#[test]
fn any_sequential_container_converts_to_a_list() {
    setup();
    let value = Variant::from(vec![b"x".to_vec(), b"yz".to_vec()]);
    assert!(value.can_convert(MetaTypeId::VARIANT_LIST));
    let list = value.to_list();
    assert_eq!(list, vec![Variant::from(b"x".to_vec()), Variant::from(b"yz".to_vec())]);
}

type Scores = BTreeMap<String, i32>;

#[test]
fn any_associative_container_converts_to_a_map() {
    setup();
    let id = registry().register(TypeBuilder::<Scores>::new("Scores").eq().debug().associative());
    let scores = Scores::from([("ann".to_string(), 3), ("bob".to_string(), 5)]);
    let value = Variant::from_value(scores);
    assert!(value.can_convert(MetaTypeId::VARIANT_MAP));
    assert!(value.can_convert(MetaTypeId::VARIANT_HASH));
    assert_eq!(value.type_id(), id);

    let map: VariantMap = value.to_map();
    assert_eq!(map.len(), 2);
    assert_eq!(map["bob"], Variant::from(5));
    assert_eq!(value.to_hash()["ann"], Variant::from(3));
}
