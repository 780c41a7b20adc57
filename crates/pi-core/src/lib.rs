//! Plugin installer core.
//!
//! Turns an artifact reference (URL or local zip) into installed plugin
//! binaries under `<root>/bin`:
//! - [`bootstrap`] prepares the plugin root
//! - [`fetch`] downloads remote artifacts into scratch space
//! - [`install`] extracts, filters, and places plugin binaries
//! - [`pipeline`] runs the stages for one request and builds the report

pub mod bootstrap;
pub mod exit_codes;
pub mod fetch;
pub mod install;
pub mod logging;
pub mod matcher;
pub mod output;
pub mod pipeline;

pub use bootstrap::{setup_plugin_dir, PluginRoot};
pub use exit_codes::ExitCode;
pub use fetch::{ArtifactFetcher, ArtifactReference};
pub use install::{install_by_artifact, InstallSummary, InstalledPlugin, SkipReason, SkippedEntry};
pub use matcher::looks_like_plugin;
pub use pipeline::{InstallReport, InstallRequest, PluginInstaller};
