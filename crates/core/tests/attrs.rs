use std::collections::HashSet;

use scribe_core::{AttributeSpec, Attrs, ExtensionRegistry, Node};
use serde_json::Value;

#[test]
fn malformed_raw_input_falls_back_to_default() {
    let level = AttributeSpec::integer("level", 1, 1, 6);
    assert_eq!(level.parse_raw("not a number"), serde_json::json!(1));
    assert_eq!(level.parse_raw(""), serde_json::json!(1));
    assert_eq!(level.parse_raw("3"), serde_json::json!(3));
    assert_eq!(level.parse_raw("42"), serde_json::json!(6));
}

#[test]
fn serialize_parse_round_trip_is_stable() {
    let specs = vec![
        AttributeSpec::string("src", ""),
        AttributeSpec::integer("indent", 0, 0, 8),
        AttributeSpec::boolean("checked", false),
    ];
    let raws = ["hello", "3", "true", "false", "0", "8", "", "nonsense"];

    for spec in &specs {
        for raw in raws {
            let once = spec.serialize_value(&spec.parse_raw(raw));
            let twice = spec.serialize_value(&spec.parse_raw(&once));
            assert_eq!(once, twice, "attr {} raw {raw:?}", spec.name);
        }
    }
}

#[test]
fn generated_ids_are_unique_per_creation() {
    let registry = ExtensionRegistry::standard();

    let mut ids = HashSet::new();
    for _ in 0..100 {
        let node = registry.create_node("image", Attrs::default()).unwrap();
        let id = node.id().expect("image must get a generated id").to_string();
        assert!(ids.insert(id), "generated id reused");
    }
}

#[test]
fn adopt_node_keeps_existing_generated_values() {
    let registry = ExtensionRegistry::standard();

    let original = registry.create_node("image", Attrs::default()).unwrap();
    let id = original.id().unwrap().to_string();

    let adopted = registry
        .adopt_node("image", original.attrs().unwrap().clone())
        .unwrap();
    assert_eq!(adopted.id(), Some(id.as_str()));

    // A plain copy goes through create_node and must be re-keyed.
    let copied = registry
        .create_node("image", original.attrs().unwrap().clone())
        .unwrap();
    assert_ne!(copied.id(), Some(id.as_str()));
}

#[test]
fn create_node_fills_defaults() {
    let registry = ExtensionRegistry::standard();

    let node = registry.create_node("heading", Attrs::default()).unwrap();
    let Node::Element(el) = &node else {
        panic!("expected element node");
    };
    assert_eq!(el.attrs.get("level"), Some(&serde_json::json!(1)));

    let node = registry.create_node("list_item", Attrs::default()).unwrap();
    let Node::Element(el) = &node else {
        panic!("expected element node");
    };
    assert_eq!(
        el.attrs.get("list_type"),
        Some(&Value::String("bulleted".to_string()))
    );
    assert_eq!(el.attrs.get("indent"), Some(&serde_json::json!(0)));
}
