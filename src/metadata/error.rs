use std::path::PathBuf;

/// Errors that can occur while building a catalog record
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// I/O error reading a sidecar file
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Sidecar file that was explicitly requested does not exist
    #[error("Sidecar file not found: {}", .0.display())]
    MissingSidecar(PathBuf),

    /// Sidecar file is not valid JSON
    #[error("Invalid JSON in {}: {source}", .path.display())]
    InvalidSidecar {
        /// Sidecar path
        path: PathBuf,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },

    /// Sidecar file holds JSON that is not an object
    #[error("Sidecar {} is not a JSON object", .0.display())]
    NotAnObject(PathBuf),
}
