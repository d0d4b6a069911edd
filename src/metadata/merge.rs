use serde_json::{Map, Value};

/// Recursively merge `overlay` onto `base`
///
/// Keys present on both sides are merged when both values are mappings;
/// otherwise the overlay value wins. Keys keep their first-seen position.
pub fn merge(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in overlay {
        let merged = match (base.get_mut(&key), value) {
            (Some(Value::Object(old)), Value::Object(new)) => {
                Value::Object(merge(std::mem::take(old), new))
            }
            (_, value) => value,
        };
        base.insert(key, merged);
    }
    base
}
