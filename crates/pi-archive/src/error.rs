//! Error types for artifact extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while extracting an artifact.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Reading the artifact or writing an extracted file failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container could not be decoded (not a zip, truncated, unsupported)
    #[error("ZIP error in {}: {source}", archive.display())]
    Zip {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry's compressed data could not be decoded
    #[error("corrupt entry '{entry}' in {}: {source}", archive.display())]
    CorruptEntry {
        archive: PathBuf,
        entry: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl From<ArchiveError> for pi_common::Error {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io { path, source } => pi_common::Error::Io { path, source },
            ArchiveError::Zip { archive, source } => pi_common::Error::Extraction {
                archive,
                message: source.to_string(),
            },
            ArchiveError::CorruptEntry {
                archive,
                entry,
                source,
            } => pi_common::Error::Extraction {
                archive,
                message: format!("entry '{entry}': {source}"),
            },
        }
    }
}
