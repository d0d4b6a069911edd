//! # Copy-map Edit Scripts
//!
//! A copy-map is an ordered list of dotted-path edits applied to the merged
//! catalog record:
//!
//! - `(dest, src)` copies the value found at `src` to `dest`, creating
//!   intermediate mappings as needed
//! - `(dest, None)` deletes `dest`
//!
//! Entries are applied one after another against the live record, so a copy
//! placed before a delete of the same subtree still sees the original value.
//! Unresolvable sources and absent deletion targets are silently skipped.
//!
//! ```
//! use nxsfileinfo::copymap::parse_edit_script;
//! use serde_json::json;
//!
//! let script = parse_edit_script(
//!     br#"[["scientificMetadata.instrument_name", "scientificMetadata.instrument.name.value"],
//!          ["scientificMetadata.instrument"]]"#,
//! )?;
//!
//! let mut record = json!({"scientificMetadata": {"instrument": {"name": {"value": "P09"}}}})
//!     .as_object()
//!     .cloned()
//!     .unwrap_or_default();
//! script.apply(&mut record);
//! assert_eq!(record["scientificMetadata"], json!({"instrument_name": "P09"}));
//! # Ok::<(), nxsfileinfo::copymap::CopyMapError>(())
//! ```

mod parse;
pub mod path;


pub use parse::{detect, parse_edit_script, parse_edit_script_str, parse_lines, ScriptFormat};

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors raised while loading an edit script
#[derive(Debug, thiserror::Error)]
pub enum CopyMapError {
    /// Script is not valid UTF-8
    #[error("Copy-map is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Script looks like YAML/JSON but does not parse
    #[error("Copy-map syntax error: {0}")]
    Syntax(#[from] serde_yaml::Error),

    /// Script parses but an element has the wrong shape
    #[error("Malformed copy-map: {0}")]
    Malformed(String),

    /// Script file could not be read
    #[error("Failed to read copy-map file: {0}")]
    Io(#[from] std::io::Error),
}

/// One edit of a copy-map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyMapEntry {
    /// Dotted path written (or deleted)
    pub destination: String,
    /// Dotted path read; `None` deletes `destination`
    pub source: Option<String>,
}

impl CopyMapEntry {
    /// Copy `source` to `destination`
    pub fn copy(destination: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            source: Some(source.into()),
        }
    }

    /// Delete `destination`
    pub fn delete(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            source: None,
        }
    }

    /// Check whether this entry deletes its destination
    pub fn is_delete(&self) -> bool {
        self.source.is_none()
    }

    /// Apply this entry to a record
    ///
    /// Returns `true` when the record changed.
    pub fn apply(&self, record: &mut Map<String, Value>) -> bool {
        let Some(source) = &self.source else {
            return path::remove(record, &self.destination).is_some();
        };
        if self.destination.starts_with(&format!("{}.", source)) {
            debug!(
                "Skipping copy of '{}' into its own subtree '{}'",
                source, self.destination
            );
            return false;
        }
        match path::get(record, source).cloned() {
            Some(value) => path::set(record, &self.destination, value),
            None => {
                debug!("Copy-map source '{}' not found", source);
                false
            }
        }
    }
}

/// Ordered list of copy-map entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditScript {
    entries: Vec<CopyMapEntry>,
}

impl EditScript {
    /// Create a script from entries
    pub fn new(entries: Vec<CopyMapEntry>) -> Self {
        Self { entries }
    }

    /// Load a script file in any supported encoding
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CopyMapError> {
        let bytes = std::fs::read(path)?;
        parse_edit_script(&bytes)
    }

    /// Entries in application order
    pub fn entries(&self) -> &[CopyMapEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the script has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry
    pub fn push(&mut self, entry: CopyMapEntry) {
        self.entries.push(entry);
    }

    /// Append all entries of another script
    pub fn extend(&mut self, other: EditScript) {
        self.entries.extend(other.entries);
    }

    /// Apply every entry in order to the live record
    ///
    /// Returns the number of entries that changed the record.
    pub fn apply(&self, record: &mut Map<String, Value>) -> usize {
        let applied = self
            .entries
            .iter()
            .filter(|entry| entry.apply(record))
            .count();
        debug!("Applied {}/{} copy-map entries", applied, self.entries.len());
        applied
    }
}

impl FromIterator<CopyMapEntry> for EditScript {
    fn from_iter<I: IntoIterator<Item = CopyMapEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EditScript {
    type Item = CopyMapEntry;
    type IntoIter = std::vec::IntoIter<CopyMapEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a CopyMapEntry;
    type IntoIter = std::slice::Iter<'a, CopyMapEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
