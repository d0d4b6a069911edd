use super::*;
use crate::node::{DType, Link};
use serde_json::json;

fn simple_entry() -> Group {
    Group::new("entry12345")
        .with_class("NXentry")
        .with_child(Field::text("title", "Test experiment"))
        .with_child(Field::text("experiment_identifier", "16171271"))
        .with_child(Field::text("start_time", "2024-05-01T10:00:00.000000+0200"))
        .with_child(Field::text("end_time", "2024-05-01T10:05:00.000000+0200"))
        .with_child(
            Group::new("sample")
                .with_class("NXsample")
                .with_child(Field::text("name", "water")),
        )
}

fn root_with(entries: Vec<Group>) -> Group {
    entries
        .into_iter()
        .fold(Group::new(""), |root, entry| root.with_child(entry))
}

#[test]
fn test_flatten_simple_entry() {
    let flattener = TreeFlattener::default();
    let map = flattener.flatten_entry("entry12345", &simple_entry());

    assert_eq!(
        Value::Object(map),
        json!({
            "NX_class": "NXentry",
            "name": "entry12345",
            "title": {"value": "Test experiment"},
            "experiment_identifier": {"value": "16171271"},
            "start_time": {"value": "2024-05-01T10:00:00.000000+0200"},
            "end_time": {"value": "2024-05-01T10:05:00.000000+0200"},
            "sample": {"NX_class": "NXsample", "name": {"value": "water"}}
        })
    );
}

#[test]
fn test_empty_entry_has_only_bookkeeping() {
    let flattener = TreeFlattener::default();
    let map = flattener.flatten_entry("entry", &Group::new("entry").with_class("NXentry"));
    assert_eq!(Value::Object(map), json!({"NX_class": "NXentry", "name": "entry"}));
}

#[test]
fn test_array_representation() {
    let entry = Group::new("entry")
        .with_class("NXentry")
        .with_child(Field::array("x", DType::Float64, vec![3], json!([1.0, 2.0, 3.0])))
        .with_child(Field::array(
            "image",
            DType::UInt16,
            vec![2, 2],
            json!([[1, 2], [3, 4]]),
        ))
        .with_child(Field::array("single", DType::Int32, vec![1], json!([7])));

    let flat = TreeFlattener::default().flatten_entry("entry", &entry);
    assert_eq!(flat["x"], json!({"shape": [3]}));
    assert_eq!(flat["image"], json!({"shape": [2, 2]}));
    assert_eq!(flat["single"], json!({"value": 7}));

    let oned = TreeFlattener::new(FlattenOptions {
        oned: true,
        values: vec!["image".to_string()],
        ..Default::default()
    })
    .flatten_entry("entry", &entry);
    assert_eq!(oned["x"], json!({"value": [1.0, 2.0, 3.0], "shape": [3]}));
    assert_eq!(oned["image"], json!({"value": [[1, 2], [3, 4]], "shape": [2, 2]}));
}

#[test]
fn test_units_become_unit() {
    let entry = Group::new("entry").with_class("NXentry").with_child(
        Field::scalar("energy", DType::Float64, 12.4).with_attribute(Attribute::text("units", "keV")),
    );

    let flat = TreeFlattener::default().flatten_entry("entry", &entry);
    assert_eq!(flat["energy"], json!({"value": 12.4, "unit": "keV"}));

    let shown = TreeFlattener::new(FlattenOptions {
        attributes: Some(vec!["units".to_string(), "NX_class".to_string()]),
        ..Default::default()
    })
    .flatten_entry("entry", &entry);
    assert_eq!(shown["energy"], json!({"value": 12.4, "unit": "keV", "units": "keV"}));
    assert_eq!(shown["NX_class"], json!("NXentry"));
}

#[test]
fn test_attribute_visibility() {
    let entry = Group::new("entry")
        .with_class("NXentry")
        .with_attribute(Attribute::text("note", "calibration"))
        .with_child(
            Field::text("title", "t")
                .with_attribute(Attribute::text("type", "NX_CHAR"))
                .with_attribute(Attribute::text("nexdatas_strategy", "INIT")),
        );

    let flat = TreeFlattener::default().flatten_entry("entry", &entry);
    assert_eq!(flat["note"], json!("calibration"));
    assert_eq!(flat["title"], json!({"value": "t", "type": "NX_CHAR"}));

    let allow = TreeFlattener::new(FlattenOptions {
        attributes: Some(vec!["nexdatas_strategy".to_string()]),
        ..Default::default()
    })
    .flatten_entry("entry", &entry);
    assert!(allow.get("NX_class").is_none());
    assert!(allow.get("note").is_none());
    assert_eq!(allow["title"], json!({"value": "t", "strategy": "INIT"}));
}

#[test]
fn test_nexdatas_source_decomposition() {
    let descriptor = r#"<datasource type="TANGO" name="mot01"><device name="p09/motor/exp.01" member="attribute"/><record name="Position"/></datasource>"#;
    let entry = Group::new("entry").with_class("NXentry").with_child(
        Field::scalar("position", DType::Float64, 1.5)
            .with_attribute(Attribute::text("nexdatas_source", descriptor)),
    );

    let flattener = TreeFlattener::new(FlattenOptions {
        hidden_attributes: Vec::new(),
        ..Default::default()
    });
    let flat = flattener.flatten_entry("entry", &entry);
    assert_eq!(
        flat["position"],
        json!({
            "value": 1.5,
            "source": "p09/motor/exp.01/Position",
            "source_name": "mot01",
            "source_type": "TANGO"
        })
    );
}

#[test]
fn test_attribute_child_collision() {
    let entry = Group::new("entry")
        .with_class("NXentry")
        .with_attribute(Attribute::text("title", "from attribute"))
        .with_child(Field::text("title", "from field"));

    let flat = TreeFlattener::default().flatten_entry("entry", &entry);
    assert_eq!(flat["title"], json!({"value": "from field"}));
    assert_eq!(flat["title_"], json!("from attribute"));
}

#[test]
fn test_field_reserved_key_collision() {
    let entry = Group::new("entry").with_class("NXentry").with_child(
        Field::scalar("counts", DType::Int64, 10).with_attribute(Attribute::new("value", DType::Int64, 3)),
    );

    let flat = TreeFlattener::default().flatten_entry("entry", &entry);
    assert_eq!(flat["counts"], json!({"value": 10, "value_": 3}));
}

#[test]
fn test_group_postfix() {
    let flattener = TreeFlattener::new(FlattenOptions {
        group_postfix: "Group".to_string(),
        ..Default::default()
    });
    let flat = flattener.flatten_entry("entry12345", &simple_entry());
    assert!(flat.get("sample").is_none());
    assert_eq!(flat["sampleGroup"]["name"], json!({"value": "water"}));
    assert_eq!(flat["name"], json!("entry12345"));
}

#[test]
fn test_read_errors_are_skipped() {
    let mut broken = Field::text("broken", "");
    broken.error = Some("unsupported datatype".to_string());
    let mut bad_attr = Attribute::text("note", "");
    bad_attr.error = Some("cannot convert".to_string());

    let entry = Group::new("entry")
        .with_class("NXentry")
        .with_attribute(bad_attr)
        .with_child(broken)
        .with_child(Field::text("title", "ok"));

    let flat = TreeFlattener::default().flatten_entry("entry", &entry);
    assert!(flat.get("broken").is_none());
    assert!(flat.get("note").is_none());
    assert_eq!(flat["title"], json!({"value": "ok"}));
}

#[test]
fn test_links_are_walked() {
    let sample = Group::new("sample")
        .with_class("NXsample")
        .with_child(Field::text("name", "water"));
    let entry = Group::new("entry")
        .with_class("NXentry")
        .with_child(Link {
            name: "sample".to_string(),
            target: "/entry/instrument/sample".to_string(),
            node: Some(Box::new(sample.into())),
        })
        .with_child(Link {
            name: "dangling".to_string(),
            target: "/nowhere".to_string(),
            node: None,
        });

    let flat = TreeFlattener::default().flatten_entry("entry", &entry);
    assert_eq!(flat["sample"]["name"], json!({"value": "water"}));
    assert!(flat.get("dangling").is_none());
}

#[test]
fn test_default_selects_first_nxentry() {
    let root = root_with(vec![
        Group::new("calibration").with_class("NXcollection"),
        Group::new("entry1").with_class("NXentry"),
        Group::new("entry2").with_class("NXentry"),
    ]);
    let selected = TreeFlattener::default().select_entries(&root);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].0, "entry1");
}

#[test]
fn test_entry_filters() {
    let root = root_with(vec![
        Group::new("calibration").with_class("NXcollection"),
        Group::new("entry1").with_class("NXentry"),
        Group::new("entry2").with_class("NXentry"),
    ]);

    let by_class = TreeFlattener::new(FlattenOptions {
        entry_classes: Some(vec!["NXentry".to_string()]),
        ..Default::default()
    });
    let names: Vec<_> = by_class.select_entries(&root).iter().map(|e| e.0).collect();
    assert_eq!(names, vec!["entry1", "entry2"]);

    let by_name = TreeFlattener::new(FlattenOptions {
        entry_names: Some(vec!["calibration".to_string()]),
        ..Default::default()
    });
    let names: Vec<_> = by_name.select_entries(&root).iter().map(|e| e.0).collect();
    assert_eq!(names, vec!["calibration"]);

    let all = TreeFlattener::new(FlattenOptions {
        entry_classes: Some(Vec::new()),
        ..Default::default()
    });
    assert_eq!(all.select_entries(&root).len(), 3);

    let none = TreeFlattener::new(FlattenOptions {
        entry_classes: Some(vec!["NXsubentry".to_string()]),
        ..Default::default()
    });
    assert!(none.flatten(&root).is_empty());
}
