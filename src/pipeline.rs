//! # Metadata Pipeline
//!
//! Glue between the stages:
//!
//! ```text
//! source file -> TreeFlattener -> MetadataMerger -> copy-map -> JSON
//! ```
//!
//! One record is produced per selected entry. The copy-map given by the
//! caller takes precedence over a script embedded in the file.

use std::path::Path;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::controlled_vocabulary::TechniqueVocabulary;
use crate::copymap::{self, path, CopyMapError, EditScript};
use crate::flatten::{FlattenOptions, TreeFlattener};
use crate::metadata::{MergeOptions, MetadataError, MetadataMerger, MetadataRecord};
use crate::node::Group;
use crate::reader::{self, ReaderError};

/// Default location of a copy-map embedded in the source file
pub const DEFAULT_COPY_MAP_FIELD: &str = "scientificMetadata.nxsfileinfo_parameters.copymap.value";

/// Errors that abort the pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Source file could not be read
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// Sidecar metadata could not be loaded
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Copy-map script is invalid
    #[error(transparent)]
    CopyMap(#[from] CopyMapError),

    /// Output serialization failed
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Flattening options
    pub flatten: FlattenOptions,
    /// Merge options
    pub merge: MergeOptions,
    /// Copy-map supplied by the caller
    pub copy_map: Option<EditScript>,
    /// Dotted path of a copy-map embedded in the record
    pub copy_map_field: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            flatten: FlattenOptions::default(),
            merge: MergeOptions::default(),
            copy_map: None,
            copy_map_field: Some(DEFAULT_COPY_MAP_FIELD.to_string()),
        }
    }
}

/// Metadata pipeline over one source file
#[derive(Debug)]
pub struct Pipeline<'a> {
    flattener: TreeFlattener,
    merger: MetadataMerger<'a>,
    copy_map: Option<EditScript>,
    copy_map_field: Option<String>,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline, loading the requested sidecars
    pub fn new(options: PipelineOptions, vocabulary: &'a TechniqueVocabulary) -> Result<Self, PipelineError> {
        Ok(Self {
            flattener: TreeFlattener::new(options.flatten),
            merger: MetadataMerger::new(options.merge, vocabulary)?,
            copy_map: options.copy_map,
            copy_map_field: options.copy_map_field.filter(|field| !field.is_empty()),
        })
    }

    /// Produce the records of a source file
    ///
    /// Without a source file a single record is built from the sidecars.
    pub fn run(&self, source: Option<&Path>) -> Result<Vec<MetadataRecord>, PipelineError> {
        match source {
            Some(path) => {
                info!("Reading {}", path.display());
                let root = reader::open_with_values(path, &self.flattener.options().values)?;
                self.run_tree(&root, Some(path))
            }
            None => {
                let mut record = self.merger.sidecar_record()?;
                self.edit(&mut record);
                Ok(vec![record])
            }
        }
    }

    /// Produce the records of an opened file root
    pub fn run_tree(&self, root: &Group, source: Option<&Path>) -> Result<Vec<MetadataRecord>, PipelineError> {
        let mut entries = self.flattener.flatten(root);
        if entries.is_empty() {
            warn!("No entry matches the entry filter");
            entries.push(Map::new());
        }
        debug!("Flattened {} entries", entries.len());

        entries
            .into_iter()
            .map(|entry| {
                let mut record = self.merger.merge_entry(entry, source)?;
                self.edit(&mut record);
                Ok(record)
            })
            .collect()
    }

    fn edit(&self, record: &mut MetadataRecord) {
        match &self.copy_map {
            Some(script) => {
                script.apply(record);
            }
            None => {
                if let Some(script) = self.embedded_copy_map(record) {
                    script.apply(record);
                }
            }
        }
        self.merger.finalize(record);
    }

    fn embedded_copy_map(&self, record: &MetadataRecord) -> Option<EditScript> {
        let field = self.copy_map_field.as_deref()?;
        let script = match path::get(record, field)? {
            Value::String(text) => copymap::parse_edit_script_str(text),
            other => copymap::parse_edit_script_str(&other.to_string()),
        };
        match script {
            Ok(script) => {
                info!("Using copy-map embedded at {}", field);
                Some(script)
            }
            Err(e) => {
                warn!("Ignoring copy-map embedded at {}: {}", field, e);
                None
            }
        }
    }
}

/// Serialize records with sorted keys and 4-space indentation
///
/// A single record is written as an object, several as an array.
pub fn to_json(records: &[MetadataRecord]) -> Result<String, serde_json::Error> {
    let value = match records {
        [record] => sorted(&Value::Object(record.clone())),
        records => Value::Array(
            records
                .iter()
                .map(|record| sorted(&Value::Object(record.clone())))
                .collect(),
        ),
    };

    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), sorted(&map[key.as_str()])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copymap::CopyMapEntry;
    use crate::node::Field;
    use serde_json::json;

    fn root() -> Group {
        Group::new("").with_child(
            Group::new("entry12345")
                .with_class("NXentry")
                .with_child(Field::text("title", "Test experiment"))
                .with_child(
                    Group::new("instrument")
                        .with_class("NXinstrument")
                        .with_child(Field::text("name", "P09")),
                )
                .with_child(
                    Group::new("nxsfileinfo_parameters")
                        .with_class("NXcollection")
                        .with_child(Field::text(
                            "copymap",
                            "scientificMetadata.instrument_name scientificMetadata.instrument.name.value\n\
                             scientificMetadata.instrument",
                        )),
                ),
        )
    }

    #[test]
    fn test_embedded_copy_map() {
        let vocabulary = TechniqueVocabulary::panet();
        let pipeline = Pipeline::new(PipelineOptions::default(), &vocabulary).unwrap();
        let records = pipeline.run_tree(&root(), None).unwrap();

        assert_eq!(records.len(), 1);
        let sm = &records[0]["scientificMetadata"];
        assert_eq!(sm["instrument_name"], json!("P09"));
        assert!(sm.get("instrument").is_none());
        assert_eq!(records[0]["type"], json!("raw"));
    }

    #[test]
    fn test_external_copy_map_wins() {
        let vocabulary = TechniqueVocabulary::panet();
        let options = PipelineOptions {
            copy_map: Some(EditScript::new(vec![CopyMapEntry::delete(
                "scientificMetadata.title",
            )])),
            ..Default::default()
        };
        let pipeline = Pipeline::new(options, &vocabulary).unwrap();
        let records = pipeline.run_tree(&root(), None).unwrap();

        let sm = &records[0]["scientificMetadata"];
        assert!(sm.get("title").is_none());
        assert!(sm.get("instrument_name").is_none());
        assert_eq!(sm["instrument"]["name"], json!({"value": "P09"}));
    }

    #[test]
    fn test_empty_external_copy_map_disables_embedded() {
        let vocabulary = TechniqueVocabulary::panet();
        let options = PipelineOptions {
            copy_map: Some(EditScript::default()),
            ..Default::default()
        };
        let pipeline = Pipeline::new(options, &vocabulary).unwrap();
        let records = pipeline.run_tree(&root(), None).unwrap();

        let sm = &records[0]["scientificMetadata"];
        assert!(sm.get("instrument_name").is_none());
        assert_eq!(sm["instrument"]["name"], json!({"value": "P09"}));
    }

    #[test]
    fn test_no_matching_entry() {
        let vocabulary = TechniqueVocabulary::panet();
        let mut options = PipelineOptions::default();
        options.flatten.entry_classes = Some(vec!["NXsubentry".to_string()]);
        let pipeline = Pipeline::new(options, &vocabulary).unwrap();
        let records = pipeline.run_tree(&root(), None).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["scientificMetadata"], json!({}));
        assert_eq!(records[0]["techniques"], json!([]));
    }

    #[test]
    fn test_to_json_layout() {
        let record: MetadataRecord = json!({"b": 1, "a": {"d": [1], "c": "x"}})
            .as_object()
            .cloned()
            .unwrap();
        let text = to_json(&[record.clone()]).unwrap();
        assert_eq!(
            text,
            "{\n    \"a\": {\n        \"c\": \"x\",\n        \"d\": [\n            1\n        ]\n    },\n    \"b\": 1\n}"
        );

        let both = to_json(&[record.clone(), record]).unwrap();
        assert!(both.starts_with("[\n    {\n        \"a\""));
    }
}
