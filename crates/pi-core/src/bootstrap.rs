//! Plugin root bootstrap.
//!
//! A plugin root owns two children:
//! - `bin/` for installed plugin binaries
//! - `work/` for per-install scratch space
//!
//! [`setup_plugin_dir`] creates whatever is missing and checks that both
//! children are usable before any install work starts.

use std::io;
use std::path::{Path, PathBuf};

use pi_common::{Error, FileSystem, Result};
use tracing::debug;

pub const BIN_DIR: &str = "bin";
pub const WORK_DIR: &str = "work";

/// A bootstrapped plugin root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRoot {
    base: PathBuf,
}

impl PluginRoot {
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.base.join(BIN_DIR)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.base.join(WORK_DIR)
    }
}

/// Ensure `base`, `base/bin` and `base/work` exist.
///
/// Missing directories are created with mode `0755`. Existing content is
/// never touched. Fails with [`Error::Directory`] if a directory cannot be
/// created, if a non-directory occupies one of the paths, or if `bin` or
/// `work` is not owner-writable.
pub fn setup_plugin_dir<F>(fs: &F, base: &Path) -> Result<PluginRoot>
where
    F: FileSystem + ?Sized,
{
    let root = PluginRoot {
        base: base.to_path_buf(),
    };

    fs.create_dir_all(base)
        .map_err(|e| Error::directory(base, e))?;
    for dir in [root.bin_dir(), root.work_dir()] {
        fs.create_dir_all(&dir)
            .map_err(|e| Error::directory(&dir, e))?;
        ensure_usable(fs, &dir)?;
    }

    debug!(base = %base.display(), "plugin root ready");
    Ok(root)
}

fn ensure_usable<F>(fs: &F, dir: &Path) -> Result<()>
where
    F: FileSystem + ?Sized,
{
    let meta = fs.metadata(dir).map_err(|e| Error::directory(dir, e))?;
    if !meta.is_dir() {
        return Err(Error::directory(
            dir,
            io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a directory"),
        ));
    }
    if !meta.is_owner_writable() {
        return Err(Error::directory(
            dir,
            io::Error::new(io::ErrorKind::PermissionDenied, "directory is not writable"),
        ));
    }
    Ok(())
}
