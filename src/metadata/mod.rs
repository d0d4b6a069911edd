//! # Catalog Metadata Merging
//!
//! Turns a flattened NeXus entry into a catalog record.
//!
//! ## Precedence
//!
//! Sources are merged with [`merge`] in a fixed order, later ones winning:
//!
//! 1. **Flattened entry**, stored under `scientificMetadata`
//! 2. **Beamtime sidecar**: catalog fields (`owner`, `contactEmail`,
//!    `sourceFolder`, ...) and templates (`creationLocation`,
//!    `instrumentId`, `ownerGroup`, `accessGroups`)
//! 3. **Scientific sidecar**, merged into `scientificMetadata`
//! 4. **Command line** values (`pid`, owner and access groups)
//!
//! The catalog defaults edit script then lifts `endTime`, `description` and
//! `creationTime` out of the scientific part, and identifiers are filled in
//! (see [`identifiers`]).

mod beamtime;
mod error;
pub mod identifiers;
mod merge;
mod sidecar;


pub use beamtime::{catalog_overlay, fill_template};
pub use error::MetadataError;
pub use merge::merge;
pub use sidecar::{read_object, Sidecars};

use std::path::{Path, PathBuf};

use log::debug;
use serde_json::{Map, Value};

use crate::controlled_vocabulary::{TechniqueResolver, TechniqueVocabulary};
use crate::copymap::{path, CopyMapEntry, EditScript};

/// Catalog record: a nested JSON mapping
pub type MetadataRecord = Map<String, Value>;

/// Root key holding the flattened entry
pub const SCIENTIFIC_METADATA: &str = "scientificMetadata";

/// Attribute path naming a beamtime file inside the entry
const BEAMTIME_FILENAME: &str = "scientificMetadata.experiment_identifier.beamtime_filename";

/// `(destination, source)` copies lifting catalog fields out of the entry
const CATALOG_DEFAULTS: &[(&str, &str)] = &[
    ("endTime", "scientificMetadata.end_time.value"),
    ("description", "scientificMetadata.title.value"),
    (
        "scientificMetadata.ScanCommand",
        "scientificMetadata.program_name.scan_command",
    ),
    ("creationTime", "endTime"),
];

/// Fallback values for required catalog fields
const DEFAULT_TYPE: &str = "raw";
const DEFAULT_CREATION_LOCATION: &str = "/DESY/PETRA III";
const DEFAULT_OWNER_GROUP: &str = "ingestor";

/// Options of the metadata merge
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Beamtime sidecar file
    pub beamtime_meta: Option<PathBuf>,
    /// Scientific sidecar file
    pub scientific_meta: Option<PathBuf>,
    /// Comma separated technique tokens
    pub techniques: Option<String>,
    /// Explicit sample id
    pub sample_id: Option<String>,
    /// Take the sample id from the sample name
    pub sample_id_from_name: bool,
    /// Explicit instrument id
    pub instrument_id: Option<String>,
    /// Keep the instrument id as built from the beamtime file
    pub raw_instrument_id: bool,
    /// Explicit dataset pid
    pub pid: Option<String>,
    /// Beamtime id used for the pid
    pub beamtime_id: Option<String>,
    /// Append a fresh UUID to the pid
    pub pid_with_uuid: bool,
    /// Leave the file name out of the pid
    pub pid_without_filename: bool,
    /// Owner group override
    pub owner_group: Option<String>,
    /// Access groups override
    pub access_groups: Option<Vec<String>>,
    /// Path appended to `sourceFolder`
    pub relative_path: Option<String>,
    /// Use the beamtime's proposal id as `proposalId`
    pub proposal_as_proposal: bool,
    /// Add `"unit": ""` to fields without units
    pub add_empty_units: bool,
    /// Keep the entry at the record root and skip catalog derivations
    pub raw_metadata: bool,
}

/// Builds catalog records from flattened entries
#[derive(Debug, Clone)]
pub struct MetadataMerger<'a> {
    options: MergeOptions,
    sidecars: Sidecars,
    resolver: TechniqueResolver<'a>,
}

impl<'a> MetadataMerger<'a> {
    /// Create a merger, loading the requested sidecar files
    pub fn new(
        options: MergeOptions,
        vocabulary: &'a TechniqueVocabulary,
    ) -> Result<Self, MetadataError> {
        let sidecars = Sidecars::load(
            options.beamtime_meta.as_deref(),
            options.scientific_meta.as_deref(),
        )?;
        Ok(Self {
            options,
            sidecars,
            resolver: TechniqueResolver::new(vocabulary),
        })
    }

    /// Create a merger over already loaded sidecars
    pub fn with_sidecars(
        options: MergeOptions,
        sidecars: Sidecars,
        vocabulary: &'a TechniqueVocabulary,
    ) -> Self {
        Self {
            options,
            sidecars,
            resolver: TechniqueResolver::new(vocabulary),
        }
    }

    /// Options in use
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Build the record for one flattened entry of `source`
    pub fn merge_entry(
        &self,
        mut entry: Map<String, Value>,
        source: Option<&Path>,
    ) -> Result<MetadataRecord, MetadataError> {
        if self.options.add_empty_units {
            add_empty_units(&mut entry);
        }
        let record = if self.options.raw_metadata {
            entry
        } else {
            let mut record = Map::new();
            record.insert(SCIENTIFIC_METADATA.to_string(), Value::Object(entry));
            record
        };
        self.complete(record, source)
    }

    /// Build a record from the sidecars alone
    pub fn sidecar_record(&self) -> Result<MetadataRecord, MetadataError> {
        self.complete(Map::new(), None)
    }

    fn complete(
        &self,
        record: MetadataRecord,
        source: Option<&Path>,
    ) -> Result<MetadataRecord, MetadataError> {
        let discovered;
        let mut sidecars = &self.sidecars;
        if sidecars.beamtime.is_none() {
            if let Some(file) = path::get_str(&record, BEAMTIME_FILENAME) {
                let mut found = self.sidecars.clone();
                found.discover_beamtime(Path::new(file))?;
                discovered = found;
                sidecars = &discovered;
            }
        }

        let overlay = catalog_overlay(sidecars, &self.options);
        let mut record = merge(record, overlay);
        catalog_defaults().apply(&mut record);

        identifiers::update_pid(
            &mut record,
            source,
            self.options.beamtime_id.as_deref(),
            self.options.pid_with_uuid,
            self.options.pid_without_filename,
        );
        if !self.options.raw_metadata {
            identifiers::update_techniques(
                &mut record,
                &self.resolver,
                self.options.techniques.as_deref(),
            );
            identifiers::update_sample_id(
                &mut record,
                self.options.sample_id.as_deref(),
                self.options.sample_id_from_name,
            );
            identifiers::update_instrument_id(
                &mut record,
                self.options.instrument_id.as_deref(),
                self.options.raw_instrument_id,
            );
        }
        Ok(record)
    }

    /// Fill required catalog fields still missing after all edits
    pub fn finalize(&self, record: &mut MetadataRecord) {
        if !self.options.raw_metadata {
            fill_defaults(record);
        }
    }
}

/// Edit script lifting catalog fields out of `scientificMetadata`
pub fn catalog_defaults() -> EditScript {
    CATALOG_DEFAULTS
        .iter()
        .map(|(destination, source)| CopyMapEntry::copy(*destination, *source))
        .collect()
}

/// Insert fallback `creationTime`, `type`, `creationLocation`, `ownerGroup`
pub fn fill_defaults(record: &mut MetadataRecord) {
    let defaults = [
        ("creationTime", current_time()),
        ("type", DEFAULT_TYPE.to_string()),
        ("creationLocation", DEFAULT_CREATION_LOCATION.to_string()),
        ("ownerGroup", DEFAULT_OWNER_GROUP.to_string()),
    ];
    for (key, value) in defaults {
        if !record.contains_key(key) {
            debug!("Using default {} = {}", key, value);
            record.insert(key.to_string(), Value::String(value));
        }
    }
}

/// Current local time as RFC 3339 with microseconds
pub fn current_time() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

/// Add `"unit": ""` to every field mapping without units
///
/// Field mappings are those carrying a non-mapping `value` or a `shape`.
pub fn add_empty_units(map: &mut Map<String, Value>) {
    let is_field = matches!(map.get("value"), Some(v) if !v.is_object())
        || matches!(map.get("shape"), Some(Value::Array(_)));
    if is_field && !map.contains_key("unit") && !map.contains_key("units") {
        map.insert("unit".to_string(), Value::String(String::new()));
    }
    for child in map.values_mut() {
        if let Value::Object(child) = child {
            add_empty_units(child);
        }
    }
}

/// Text of a scalar JSON value
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
