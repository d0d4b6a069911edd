//! # Source File Reader
//!
//! Opens a hierarchical data file and returns its root [`Group`].
//!
//! Two sources are supported:
//!
//! - **JSON node dump** (`.json`): the serialized [`HierarchicalNode`] tree,
//!   as produced by any tool that walks a NeXus file (see [`crate::node`]
//!   for the layout).
//! - **HDF5/NeXus** (`.nxs`, `.h5`, `.nx`, `.ndf`, `.hdf5`): read directly
//!   when the crate is built with the `hdf5` feature.
//!
//! ```rust,no_run
//! let root = nxsfileinfo::reader::open("scan_00012.json")?;
//! for (name, group) in root.groups() {
//!     println!("{} ({:?})", name, group.class());
//! }
//! # Ok::<(), nxsfileinfo::reader::ReaderError>(())
//! ```

#[cfg(feature = "hdf5")]
mod nexus;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::node::{Group, HierarchicalNode};

/// Errors that can occur while opening a source file
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// I/O error opening the file
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The JSON node dump is malformed
    #[error("Invalid node dump: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The node dump root is not a group
    #[error("Node dump root must be a group, found {0}")]
    RootNotGroup(String),

    /// No reader is available for the file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Error from the HDF5 library
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5Error(#[from] ::hdf5::Error),
}

/// Source file formats understood by [`open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Serialized node tree
    NodeDump,
    /// HDF5/NeXus container
    Nexus,
}

impl SourceFormat {
    /// Detect the format from the file extension
    ///
    /// Unknown extensions are tried as node dumps.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "nxs" | "h5" | "nx" | "ndf" | "hdf5" => SourceFormat::Nexus,
            _ => SourceFormat::NodeDump,
        }
    }
}

/// Open a source file and return its root group
pub fn open<P: AsRef<Path>>(path: P) -> Result<Group, ReaderError> {
    open_with_values(path, &[])
}

/// Open a source file, also reading the multi-dimensional fields in `values`
///
/// Readers that load values from disk skip fields of rank two or more
/// unless they are named here; only their shape is recorded.
pub fn open_with_values<P: AsRef<Path>>(path: P, values: &[String]) -> Result<Group, ReaderError> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path);
    debug!("Opening {} as {:?}", path.display(), format);
    match format {
        SourceFormat::NodeDump => open_node_dump(path),
        SourceFormat::Nexus => open_nexus(path, values),
    }
}

/// Check whether a field's value has to be read from disk
#[cfg_attr(not(feature = "hdf5"), allow(dead_code))]
pub(crate) fn needs_value(name: &str, shape: &[usize], values: &[String]) -> bool {
    shape.len() < 2 || values.iter().any(|v| v == name)
}

/// Strip the NUL or space padding of a fixed-length string
#[cfg_attr(not(feature = "hdf5"), allow(dead_code))]
pub(crate) fn trim_fixed(text: &str) -> &str {
    text.trim_end_matches(['\0', ' '])
}

/// Load a JSON node dump
pub fn open_node_dump(path: &Path) -> Result<Group, ReaderError> {
    let file = File::open(path)?;
    let node: HierarchicalNode = serde_json::from_reader(BufReader::new(file))?;
    root_group(node)
}

/// Parse a JSON node dump from a string
pub fn node_dump_from_str(json: &str) -> Result<Group, ReaderError> {
    let node: HierarchicalNode = serde_json::from_str(json)?;
    root_group(node)
}

fn root_group(node: HierarchicalNode) -> Result<Group, ReaderError> {
    match node {
        HierarchicalNode::Group(group) => Ok(group),
        other => Err(ReaderError::RootNotGroup(format!("{:?}", other.kind()))),
    }
}

#[cfg(feature = "hdf5")]
fn open_nexus(path: &Path, values: &[String]) -> Result<Group, ReaderError> {
    nexus::read_file(path, values)
}

#[cfg(not(feature = "hdf5"))]
fn open_nexus(path: &Path, _values: &[String]) -> Result<Group, ReaderError> {
    Err(ReaderError::UnsupportedFormat(format!(
        "{} (rebuild with the `hdf5` feature to read NeXus files)",
        path.display()
    )))
}
