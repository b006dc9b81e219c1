// ABOUTME: Error types for record collection persistence.
// ABOUTME: Provides StoreError with Io, Parse and Serialize variants.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while loading or saving a record collection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the collection file failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is neither the current collection format nor the legacy array.
    #[error("unrecognised collection format: {0}")]
    Parse(String),

    /// The collection could not be encoded as JSON.
    #[error("failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
