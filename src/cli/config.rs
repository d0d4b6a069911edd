//! TOML configuration file support.
//!
//! Settings used on every run can live in a config file instead of flags:
//!
//! ```toml
//! # nxsfileinfo.toml
//! [metadata]
//! hidden_attributes = ["nexdatas_source", "nexdatas_strategy", "units"]
//! entry_classes = ["NXentry"]
//! oned = true
//! copy_map_file = "/etc/nxsfileinfo/copymap.yaml"
//! chmod = "0o662"
//! owner_group = "p09staff"
//! ```
//!
//! Command line flags take precedence over the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure for nxsfileinfo.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Metadata command settings.
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Configuration for the metadata command.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataConfig {
    /// Attributes to show.
    pub attributes: Option<Vec<String>>,

    /// Attributes to hide.
    pub hidden_attributes: Option<Vec<String>>,

    /// Postfix appended to group names.
    pub group_postfix: Option<String>,

    /// NX_class names of the entries to read.
    pub entry_classes: Option<Vec<String>>,

    /// Names of the entries to read.
    pub entry_names: Option<Vec<String>>,

    /// Store values of one-dimensional fields.
    pub oned: Option<bool>,

    /// Add an empty unit to fields without units.
    pub add_empty_units: Option<bool>,

    /// Fields whose values are stored regardless of rank.
    pub values: Option<Vec<String>>,

    /// Copy-map script file.
    pub copy_map_file: Option<PathBuf>,

    /// Dotted path of an embedded copy-map.
    pub copy_map_field: Option<String>,

    /// File mode of the output file.
    pub chmod: Option<String>,

    /// Owner group.
    pub owner_group: Option<String>,

    /// Access groups.
    pub access_groups: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}
