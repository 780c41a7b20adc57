//! Plugin artifact extraction.
//!
//! Artifacts are zip containers. Extraction writes every entry into a
//! scratch directory through a [`pi_common::FileSystem`], keeping the
//! archive's directory nesting and each file's stored permission bits.

pub mod error;
pub mod extract;

pub use error::{ArchiveError, Result};
pub use extract::{extract_zip, ExtractedEntry};
