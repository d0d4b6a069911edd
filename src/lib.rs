//! # nxsfileinfo - NeXus Catalog Metadata
//!
//! `nxsfileinfo` turns the entries of a NeXus/HDF5 file into catalog-ready
//! JSON records for a scientific data catalog.
//!
//! ## Key Features
//!
//! - **Tree Flattening**: walks an entry depth-first and mirrors it as nested
//!   JSON, with fields as `{"value", "shape", "unit"}` mappings and attribute
//!   visibility control.
//!
//! - **Sidecar Merging**: overlays beamtime and scientific sidecar files and
//!   command line values in a fixed, explicit order.
//!
//! - **Technique Resolution**: maps short codes (`saxs`, `PaNET01098`) and
//!   free-form names onto PaNET ontology terms.
//!
//! - **Copy-Map Editing**: a small edit script of copy and delete
//!   operations on dotted paths, accepted as JSON, YAML or plain text.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nxsfileinfo::prelude::*;
//! use std::path::Path;
//!
//! let vocabulary = TechniqueVocabulary::panet();
//! let options = PipelineOptions {
//!     merge: MergeOptions {
//!         beamtime_meta: Some("beamtime-metadata-16171271.json".into()),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! let pipeline = Pipeline::new(options, &vocabulary)?;
//! let records = pipeline.run(Some(Path::new("scan_00012.json")))?;
//! println!("{}", to_json(&records)?);
//! # Ok::<(), nxsfileinfo::pipeline::PipelineError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`node`]: hierarchical node model (groups, fields, attributes, links)
//! - [`reader`]: opens a source file into a [`node::Group`]
//! - [`flatten`]: tree flattening and entry selection
//! - [`controlled_vocabulary`]: PaNET technique table and resolver
//! - [`metadata`]: sidecar merging and identifier derivation
//! - [`copymap`]: edit script parsing and dotted-path editing
//! - [`pipeline`]: the stages wired together
//!
//! ## Record Layout
//!
//! | Key | Source |
//! |-----|--------|
//! | scientificMetadata | flattened entry + scientific sidecar |
//! | pid, datasetName | `-p`, or `{beamtimeId}/{scan}` |
//! | techniques | `-q`, experiment description, or `definition` |
//! | sampleId | `-j`, or the sample description |
//! | instrumentId, creationLocation | beamtime templates |
//! | ownerGroup, accessGroups | beamtime templates or `-w` / `-c` |
//! | endTime, creationTime, description | entry, beamtime sidecar |

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![allow(clippy::too_many_arguments)]

pub mod controlled_vocabulary;
pub mod copymap;
pub mod flatten;
pub mod metadata;
pub mod node;
pub mod pipeline;
pub mod reader;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::controlled_vocabulary::{
        Technique, TechniqueResolver, TechniqueTerm, TechniqueVocabulary,
    };
    pub use crate::copymap::{parse_edit_script, CopyMapEntry, CopyMapError, EditScript};
    pub use crate::flatten::{FlattenOptions, TreeFlattener};
    pub use crate::metadata::{
        merge, MergeOptions, MetadataError, MetadataMerger, MetadataRecord, Sidecars,
    };
    pub use crate::node::{Attribute, DType, Field, Group, HierarchicalNode, Link};
    pub use crate::pipeline::{to_json, Pipeline, PipelineError, PipelineOptions};
    pub use crate::reader::{open, ReaderError};
}
