//! # Tree Flattener
//!
//! Walks a NeXus entry depth-first and turns it into the nested JSON mapping
//! stored as `scientificMetadata` in the catalog record.
//!
//! ## Representation
//!
//! | Source node | Output |
//! |-------------|--------|
//! | group `name` | `name + postfix: {"NX_class": ..., <attributes>, <children>}` |
//! | scalar field | `{"value": v}` |
//! | 1-d field | `{"shape": [n]}`, or `{"value": [...], "shape": [n]}` with `oned` |
//! | n-d field | `{"shape": [...]}` unless listed in `values` |
//! | `units` attribute | `"unit"` key on the field mapping |
//!
//! Visible attributes become sibling keys on their owner's mapping. When an
//! attribute shares its local name with a child node (or a reserved field
//! key), it is stored under `name + "_"`.
//!
//! Values that fail to read are skipped with a warning; the walk always
//! completes.

mod datasource;

#[cfg(test)]
mod tests;

pub use datasource::DataSource;

use std::collections::HashSet;

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::node::{Attribute, Field, Group, HierarchicalNode, NX_CLASS};

/// Attributes hidden unless explicitly listed
pub const DEFAULT_HIDDEN_ATTRIBUTES: &[&str] = &["nexdatas_source", "nexdatas_strategy", "units"];

/// Entry class selected when no entry filter is given
pub const DEFAULT_ENTRY_CLASS: &str = "NXentry";

/// Attribute holding the data source descriptor
pub const SOURCE_ATTRIBUTE: &str = "nexdatas_source";

/// Attribute holding the recording strategy
pub const STRATEGY_ATTRIBUTE: &str = "nexdatas_strategy";

/// Keys owned by the field representation itself
const RESERVED_FIELD_KEYS: &[&str] = &["value", "shape", "unit"];

/// Options controlling the flattening walk
#[derive(Debug, Clone)]
pub struct FlattenOptions {
    /// Attributes never shown (unless listed in `attributes`)
    pub hidden_attributes: Vec<String>,
    /// Explicit attribute allow-list; `None` shows every non-hidden attribute
    pub attributes: Option<Vec<String>>,
    /// Postfix appended to group names
    pub group_postfix: String,
    /// Materialize values of one-dimensional fields
    pub oned: bool,
    /// Fields whose multi-dimensional values are materialized anyway
    pub values: Vec<String>,
    /// Entry NX_class filter; an empty list matches every class
    pub entry_classes: Option<Vec<String>>,
    /// Entry name filter; an empty list matches every name
    pub entry_names: Option<Vec<String>>,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            hidden_attributes: DEFAULT_HIDDEN_ATTRIBUTES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            attributes: None,
            group_postfix: String::new(),
            oned: false,
            values: Vec::new(),
            entry_classes: None,
            entry_names: None,
        }
    }
}

impl FlattenOptions {
    /// Check whether an explicit entry filter was requested
    pub fn has_entry_filter(&self) -> bool {
        self.entry_classes.is_some() || self.entry_names.is_some()
    }
}

/// Depth-first flattener of NeXus entries
#[derive(Debug, Clone, Default)]
pub struct TreeFlattener {
    options: FlattenOptions,
}

impl TreeFlattener {
    /// Create a flattener with the given options
    pub fn new(options: FlattenOptions) -> Self {
        Self { options }
    }

    /// Options in use
    pub fn options(&self) -> &FlattenOptions {
        &self.options
    }

    /// Select the entry groups of a file root
    ///
    /// Without an explicit filter only the first `NXentry` is selected;
    /// with a filter every matching top-level group is.
    pub fn select_entries<'a>(&self, root: &'a Group) -> Vec<(&'a str, &'a Group)> {
        let matching = root
            .groups()
            .filter(|(name, group)| self.matches_entry(name, group));
        if self.options.has_entry_filter() {
            matching.collect()
        } else {
            matching.take(1).collect()
        }
    }

    fn matches_entry(&self, name: &str, group: &Group) -> bool {
        let class = group.class();
        let class_ok = match &self.options.entry_classes {
            Some(classes) if !classes.is_empty() => {
                class.map_or(false, |c| classes.iter().any(|k| *k == c))
            }
            Some(_) => true,
            None if self.options.entry_names.is_some() => true,
            None => class.as_deref() == Some(DEFAULT_ENTRY_CLASS),
        };
        let name_ok = match &self.options.entry_names {
            Some(names) if !names.is_empty() => names.iter().any(|n| n == name),
            _ => true,
        };
        class_ok && name_ok
    }

    /// Flatten every selected entry of a file root
    pub fn flatten(&self, root: &Group) -> Vec<Map<String, Value>> {
        self.select_entries(root)
            .into_iter()
            .map(|(name, entry)| self.flatten_entry(name, entry))
            .collect()
    }

    /// Flatten one entry into its `scientificMetadata` mapping
    ///
    /// The entry mapping carries the raw entry name as a `"name"` key.
    pub fn flatten_entry(&self, name: &str, entry: &Group) -> Map<String, Value> {
        let mut map = self.flatten_group(entry);
        if let Some(child) = map.remove("name") {
            map.insert("name_".to_string(), child);
        }
        map.insert("name".to_string(), Value::String(name.to_string()));
        map
    }

    fn flatten_group(&self, group: &Group) -> Map<String, Value> {
        let mut map = Map::new();
        let children: HashSet<&str> = group
            .children
            .iter()
            .filter(|c| !matches!(c, HierarchicalNode::Attribute(_)))
            .map(|c| c.name())
            .collect();

        if let Some(class) = group.class() {
            if self.is_visible(NX_CLASS) {
                map.insert(NX_CLASS.to_string(), Value::String(class));
            }
        }
        for attribute in group.all_attributes() {
            if attribute.name != NX_CLASS {
                self.insert_attribute(&mut map, attribute, |key| children.contains(key));
            }
        }

        for child in &group.children {
            let Some(node) = child.resolve() else {
                debug!(
                    "Skipping dangling link '{}' -> {}",
                    child.name(),
                    child.link_target().unwrap_or_default()
                );
                continue;
            };
            match node {
                HierarchicalNode::Group(sub) => {
                    let key = format!("{}{}", child.name(), self.options.group_postfix);
                    map.insert(key, Value::Object(self.flatten_group(sub)));
                }
                HierarchicalNode::Field(field) => {
                    if let Some(value) = self.flatten_field(child.name(), field) {
                        map.insert(child.name().to_string(), Value::Object(value));
                    }
                }
                HierarchicalNode::Attribute(_) | HierarchicalNode::Link(_) => {}
            }
        }
        map
    }

    fn flatten_field(&self, name: &str, field: &Field) -> Option<Map<String, Value>> {
        let mut map = Map::new();
        let rank = field.rank();
        let materialize = rank == 0
            || (rank == 1 && self.options.oned)
            || self.options.values.iter().any(|v| v == name);

        if materialize {
            match field.read() {
                Ok(value) if rank == 0 => {
                    map.insert("value".to_string(), scalarize(value));
                }
                Ok(value) => {
                    map.insert("value".to_string(), value.clone());
                }
                Err(e) => {
                    warn!("Omitting field: {}", e);
                    return None;
                }
            }
        }
        if rank > 0 {
            map.insert("shape".to_string(), Value::from(field.shape.clone()));
        }

        for attribute in &field.attributes {
            if attribute.name == "units" {
                match attribute.read() {
                    Ok(units) => {
                        map.insert("unit".to_string(), scalarize(units));
                    }
                    Err(e) => warn!("Omitting units of '{}': {}", name, e),
                }
            }
            self.insert_attribute(&mut map, attribute, |key| {
                RESERVED_FIELD_KEYS.contains(&key)
            });
        }
        Some(map)
    }

    fn insert_attribute<F>(&self, map: &mut Map<String, Value>, attribute: &Attribute, taken: F)
    where
        F: Fn(&str) -> bool,
    {
        if !self.is_visible(&attribute.name) {
            return;
        }
        let value = match attribute.read() {
            Ok(value) => scalarize(value),
            Err(e) => {
                warn!("Omitting attribute: {}", e);
                return;
            }
        };

        let mut insert = |key: &str, value: Value| {
            let key = if taken(key) {
                format!("{}_", key)
            } else {
                key.to_string()
            };
            map.insert(key, value);
        };

        match attribute.name.as_str() {
            SOURCE_ATTRIBUTE => {
                let descriptor = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let ds = DataSource::parse(&descriptor);
                for (key, part) in [
                    ("source", ds.source),
                    ("source_name", ds.source_name),
                    ("source_type", ds.source_type),
                ] {
                    if let Some(part) = part {
                        insert(key, Value::String(part));
                    }
                }
            }
            STRATEGY_ATTRIBUTE => insert("strategy", value),
            name => insert(name, value),
        }
    }

    /// Check whether an attribute is shown
    pub fn is_visible(&self, name: &str) -> bool {
        match &self.options.attributes {
            Some(allowed) => allowed.iter().any(|a| a == name),
            None => !self.options.hidden_attributes.iter().any(|h| h == name),
        }
    }
}

/// Unwrap single-element arrays
fn scalarize(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.len() == 1 => scalarize(&items[0]),
        other => other.clone(),
    }
}
