//! Dotted-path addressing over JSON mappings.
//!
//! A path like `scientificMetadata.sample.name` names nested mapping keys.
//! There are no list indices or wildcards.

use serde_json::{Map, Value};

/// Split a dotted path into its key segments
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
}

/// Value at a dotted path
pub fn get<'a>(record: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut keys = segments(path);
    let mut current = record.get(keys.next()?)?;
    for key in keys {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

/// String value at a dotted path
pub fn get_str<'a>(record: &'a Map<String, Value>, path: &str) -> Option<&'a str> {
    get(record, path).and_then(Value::as_str)
}

/// Write a value at a dotted path, creating intermediate mappings
///
/// An intermediate segment holding a non-mapping value is replaced by a
/// new mapping.
pub fn set(record: &mut Map<String, Value>, path: &str, value: Value) -> bool {
    let keys: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = keys.split_last() else {
        return false;
    };

    let mut current = record;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(map) = entry else {
            return false;
        };
        current = map;
    }
    current.insert(last.to_string(), value);
    true
}

/// Remove the value at a dotted path
pub fn remove(record: &mut Map<String, Value>, path: &str) -> Option<Value> {
    let keys: Vec<&str> = segments(path).collect();
    let (last, parents) = keys.split_last()?;
    let mut current = record;
    for key in parents {
        current = current.get_mut(*key)?.as_object_mut()?;
    }
    current.remove(*last)
}
