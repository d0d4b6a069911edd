use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::{Map, Value};

use super::MetadataError;

/// Key optionally wrapping the scientific sidecar content
const SCIENTIFIC_KEY: &str = "scientificMetadata";

/// Sidecar documents merged into a catalog record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sidecars {
    /// Beamtime metadata document
    pub beamtime: Option<Map<String, Value>>,
    /// Scientific metadata document, unwrapped
    pub scientific: Option<Map<String, Value>>,
}

impl Sidecars {
    /// Load explicitly requested sidecars
    ///
    /// A missing or malformed file is an error.
    pub fn load(beamtime: Option<&Path>, scientific: Option<&Path>) -> Result<Self, MetadataError> {
        let beamtime = beamtime.map(read_object).transpose()?;
        let scientific = scientific
            .map(read_object)
            .transpose()?
            .map(unwrap_scientific);
        Ok(Self {
            beamtime,
            scientific,
        })
    }

    /// Load a beamtime sidecar named by the source file itself
    ///
    /// A missing file is only a warning.
    pub fn discover_beamtime(&mut self, path: &Path) -> Result<(), MetadataError> {
        match read_object(path) {
            Ok(meta) => {
                info!("Using beamtime metadata from {}", path.display());
                self.beamtime = Some(meta);
                Ok(())
            }
            Err(MetadataError::MissingSidecar(path)) => {
                warn!("Beamtime file {} not found", path.display());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Check whether neither sidecar is loaded
    pub fn is_empty(&self) -> bool {
        self.beamtime.is_none() && self.scientific.is_none()
    }
}

/// Read a sidecar file holding one JSON object
pub fn read_object(path: &Path) -> Result<Map<String, Value>, MetadataError> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => MetadataError::MissingSidecar(path.to_path_buf()),
        _ => MetadataError::IoError(e),
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| MetadataError::InvalidSidecar {
        path: PathBuf::from(path),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(MetadataError::NotAnObject(path.to_path_buf())),
    }
}

fn unwrap_scientific(mut doc: Map<String, Value>) -> Map<String, Value> {
    match doc.remove(SCIENTIFIC_KEY) {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            doc.insert(SCIENTIFIC_KEY.to_string(), other);
            doc
        }
        None => doc,
    }
}
