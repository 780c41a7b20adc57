//! Error types for the plugin installer.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for installer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the plugin installer.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Directory setup errors (20-29)
    #[error("failed to set up plugin directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Download errors (30-39)
    #[error("http response not OK. code: {status}, status: {status_text}, url: {url}")]
    Download {
        status: u16,
        status_text: String,
        url: String,
    },

    #[error("failed to download {url}: {message}")]
    Transport { url: String, message: String },

    #[error("invalid artifact reference: {0}")]
    InvalidArtifact(String),

    // Extraction errors (40-49)
    #[error("failed to extract archive {}: {message}", archive.display())]
    Extraction { archive: PathBuf, message: String },

    // I/O errors (60-69)
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Caller-visible failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Directory,
    Download,
    Extraction,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Directory => write!(f, "directory"),
            ErrorKind::Download => write!(f, "download"),
            ErrorKind::Extraction => write!(f, "extraction"),
            ErrorKind::Io => write!(f, "io"),
        }
    }
}

impl Error {
    /// Build an [`Error::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an [`Error::Directory`] for `path`.
    pub fn directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Directory {
            path: path.into(),
            source,
        }
    }

    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output and exit codes.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::Directory { .. } => 20,
            Error::Download { .. } => 30,
            Error::Transport { .. } => 31,
            Error::InvalidArtifact(_) => 32,
            Error::Extraction { .. } => 40,
            Error::Io { .. } => 60,
        }
    }

    /// Returns the failure category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Directory { .. } => ErrorKind::Directory,
            Error::Download { .. } | Error::Transport { .. } | Error::InvalidArtifact(_) => {
                ErrorKind::Download
            }
            Error::Extraction { .. } => ErrorKind::Extraction,
            Error::Io { .. } => ErrorKind::Io,
        }
    }
}
