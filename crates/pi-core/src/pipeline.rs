//! End-to-end install pipeline.
//!
//! One run: bootstrap the plugin root, fetch the artifact into a
//! per-install scratch directory under `work/`, extract and install into
//! `bin/`, then drop the scratch directory.
//!
//! Scratch layout: `work/<install-id>/download/<artifact>` and
//! `work/<install-id>/extracted/...`, so no artifact name can collide with
//! the extraction root.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use pi_common::{Error, FileSystem, InstallId, Result, SCHEMA_VERSION};
use pi_config::InstallConfig;
use serde::Serialize;
use tracing::{info, warn};

use crate::bootstrap::setup_plugin_dir;
use crate::fetch::{ArtifactFetcher, ArtifactReference};
use crate::install::{install_by_artifact, InstalledPlugin, SkippedEntry};

/// Scratch subdirectory that receives downloaded artifacts.
pub const DOWNLOAD_DIR: &str = "download";

/// Scratch subdirectory that receives the extracted tree.
pub const EXTRACT_DIR: &str = "extracted";

/// Inputs for one install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub artifact: ArtifactReference,
    pub prefix: PathBuf,
    pub overwrite: bool,
    pub keep_work: bool,
}

impl InstallRequest {
    pub fn from_config(artifact: ArtifactReference, config: &InstallConfig) -> Self {
        Self {
            artifact,
            prefix: config.prefix.clone(),
            overwrite: config.overwrite,
            keep_work: config.keep_work,
        }
    }
}

/// Outcome of a successful install run.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub schema_version: String,
    pub install_id: InstallId,
    pub artifact: ArtifactReference,
    pub plugin_root: PathBuf,
    pub bin_dir: PathBuf,
    /// Scratch directory, present only when it was kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    pub overwrite: bool,
    pub installed: Vec<InstalledPlugin>,
    pub skipped: Vec<SkippedEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs install requests against a filesystem.
pub struct PluginInstaller<F> {
    fs: F,
    fetcher: ArtifactFetcher,
}

impl<F: FileSystem> PluginInstaller<F> {
    pub fn new(fs: F, fetcher: ArtifactFetcher) -> Self {
        Self { fs, fetcher }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Run the full pipeline for `request`.
    pub fn install(&self, request: &InstallRequest) -> Result<InstallReport> {
        let started_at = Utc::now();
        let install_id = InstallId::new();
        info!(
            install_id = %install_id,
            artifact = %request.artifact,
            prefix = %request.prefix.display(),
            "starting install"
        );

        let root = setup_plugin_dir(&self.fs, &request.prefix)?;
        let scratch = root.work_dir().join(install_id.as_str());
        let download_dir = scratch.join(DOWNLOAD_DIR);
        self.fs
            .create_dir_all(&download_dir)
            .map_err(|e| Error::io(&download_dir, e))?;

        let outcome = self
            .fetcher
            .fetch(&self.fs, &request.artifact, &download_dir)
            .and_then(|archive| {
                install_by_artifact(
                    &self.fs,
                    &archive,
                    &root.bin_dir(),
                    &scratch.join(EXTRACT_DIR),
                    request.overwrite,
                )
            });

        let work_dir = if request.keep_work {
            info!(path = %scratch.display(), "keeping scratch directory");
            Some(scratch)
        } else {
            if let Err(e) = self.fs.remove_dir_all(&scratch) {
                warn!(path = %scratch.display(), error = %e, "failed to remove scratch directory");
            }
            None
        };

        let summary = outcome?;
        info!(
            install_id = %install_id,
            installed = summary.installed.len(),
            skipped = summary.skipped.len(),
            "install finished"
        );

        Ok(InstallReport {
            schema_version: SCHEMA_VERSION.to_string(),
            install_id,
            artifact: request.artifact.clone(),
            plugin_root: root.base().to_path_buf(),
            bin_dir: root.bin_dir(),
            work_dir,
            overwrite: request.overwrite,
            installed: summary.installed,
            skipped: summary.skipped,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
