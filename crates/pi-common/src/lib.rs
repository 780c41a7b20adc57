//! Plugin installer common types, IDs, errors, and filesystem access.
//!
//! This crate provides foundational types shared across the installer crates:
//! - The unified error type with stable codes and categories
//! - Install identifiers used for scratch directories and reports
//! - The [`FileSystem`] capability with disk and in-memory implementations
//! - Report schema versioning

pub mod error;
pub mod fs;
pub mod id;
pub mod schema;

pub use error::{Error, ErrorKind, Result};
pub use fs::{FileKind, FileMeta, FileSystem, MemoryFs, OsFs};
pub use id::InstallId;
pub use schema::SCHEMA_VERSION;
