//! Archive installer: extract, filter, and place plugin binaries.
//!
//! The extracted tree is walked in component-wise lexicographic path order.
//! A file is installed only when its base name looks like a plugin and its
//! stored permission bits mark it executable. Installed files always get
//! mode `0755`, whatever the archive said.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use pi_archive::extract_zip;
use pi_common::{Error, FileSystem, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::matcher::looks_like_plugin;

/// Mode applied to every installed plugin.
pub const INSTALLED_MODE: u32 = 0o755;

/// A plugin placed in `bin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPlugin {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Hex SHA-256 of the installed content.
    pub sha256: String,
    /// An earlier install of the same name was overwritten.
    pub replaced: bool,
}

/// Why an extracted file was not installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotAPlugin,
    NotExecutable,
    AlreadyInstalled,
    /// An earlier entry with the same base name was already taken.
    ShadowedInArchive,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NotAPlugin => "not a plugin",
            SkipReason::NotExecutable => "not executable",
            SkipReason::AlreadyInstalled => "already installed",
            SkipReason::ShadowedInArchive => "shadowed in archive",
        }
    }
}

/// An extracted file that was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub name: String,
    /// Path relative to the extraction directory.
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of one [`install_by_artifact`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    pub installed: Vec<InstalledPlugin>,
    pub skipped: Vec<SkippedEntry>,
}

impl InstallSummary {
    pub fn installed_names(&self) -> Vec<&str> {
        self.installed.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Extract `archive` into `work` and install eligible plugins into `bin`.
///
/// With `overwrite` off an existing `bin/<name>` is left alone; with it on
/// the content is replaced and the mode re-applied. No eligible files is
/// not an error.
pub fn install_by_artifact<F>(
    fs: &F,
    archive: &Path,
    bin: &Path,
    work: &Path,
    overwrite: bool,
) -> Result<InstallSummary>
where
    F: FileSystem + ?Sized,
{
    let extracted = extract_zip(fs, archive, work).map_err(Error::from)?;
    debug!(
        archive = %archive.display(),
        entries = extracted.len(),
        "archive extracted"
    );

    let files = fs.walk_files(work).map_err(|e| Error::io(work, e))?;
    let mut summary = InstallSummary::default();
    let mut taken: HashSet<String> = HashSet::new();

    for path in files {
        let relative = path.strip_prefix(work).unwrap_or(&path).to_path_buf();
        let Some(raw_name) = path.file_name() else {
            continue;
        };
        let name = raw_name.to_string_lossy().into_owned();

        // Non-UTF-8 names can never be plugin names.
        let reason = if raw_name.to_str().is_none() || !looks_like_plugin(&name) {
            Some(SkipReason::NotAPlugin)
        } else if !fs
            .metadata(&path)
            .map_err(|e| Error::io(&path, e))?
            .is_executable()
        {
            Some(SkipReason::NotExecutable)
        } else if !taken.insert(name.clone()) {
            Some(SkipReason::ShadowedInArchive)
        } else {
            None
        };
        if let Some(reason) = reason {
            debug!(entry = %relative.display(), reason = reason.as_str(), "skipping entry");
            summary.skipped.push(SkippedEntry {
                name,
                path: relative,
                reason,
            });
            continue;
        }

        let dest = bin.join(&name);
        let replaced = fs.exists(&dest);
        if replaced && !overwrite {
            info!(plugin = %name, path = %dest.display(), "already installed, skipping");
            summary.skipped.push(SkippedEntry {
                name,
                path: relative,
                reason: SkipReason::AlreadyInstalled,
            });
            continue;
        }

        summary.installed.push(place(fs, &path, &dest, name, replaced)?);
    }

    Ok(summary)
}

fn place<F>(fs: &F, src: &Path, dest: &Path, name: String, replaced: bool) -> Result<InstalledPlugin>
where
    F: FileSystem + ?Sized,
{
    let contents = fs.read(src).map_err(|e| Error::io(src, e))?;
    fs.write(dest, &contents)
        .and_then(|()| fs.set_mode(dest, INSTALLED_MODE))
        .map_err(|e| Error::io(dest, e))?;

    let sha256 = hex::encode(Sha256::digest(&contents));
    info!(
        plugin = %name,
        path = %dest.display(),
        size = contents.len(),
        replaced,
        "installed plugin"
    );
    Ok(InstalledPlugin {
        name,
        path: dest.to_path_buf(),
        size: contents.len() as u64,
        sha256,
        replaced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pi_common::{ErrorKind, MemoryFs};
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, mode) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default().unix_permissions(*mode))
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn layout(fs: &MemoryFs, entries: &[(&str, &[u8], u32)]) -> PathBuf {
        fs.create_dir_all(Path::new("/root/bin")).unwrap();
        fs.create_dir_all(Path::new("/root/work")).unwrap();
        let archive = PathBuf::from("/artifacts/plugin.zip");
        fs.put_file(&archive, &build_zip(entries), 0o644).unwrap();
        archive
    }

    fn install(fs: &MemoryFs, archive: &Path, overwrite: bool) -> Result<InstallSummary> {
        install_by_artifact(
            fs,
            archive,
            Path::new("/root/bin"),
            Path::new("/root/work/x"),
            overwrite,
        )
    }

    #[test]
    fn test_single_entry_installs_with_fixed_mode() {
        let fs = MemoryFs::new();
        let archive = layout(&fs, &[("mackerel-plugin-sample", b"#!/bin/sh\necho ok\n", 0o700)]);

        let summary = install(&fs, &archive, false).unwrap();
        assert_eq!(summary.installed_names(), vec!["mackerel-plugin-sample"]);

        let dest = Path::new("/root/bin/mackerel-plugin-sample");
        assert_eq!(fs.read(dest).unwrap(), b"#!/bin/sh\necho ok\n");
        assert_eq!(fs.metadata(dest).unwrap().mode, INSTALLED_MODE);

        let plugin = &summary.installed[0];
        assert!(!plugin.replaced);
        assert_eq!(plugin.size, 18);
        assert_eq!(plugin.sha256.len(), 64);
    }

    #[test]
    fn test_overwrite_policy() {
        let fs = MemoryFs::new();
        let archive = layout(&fs, &[("mackerel-plugin-sample", b"new", 0o755)]);
        fs.put_file("/root/bin/mackerel-plugin-sample", b"old", 0o755)
            .unwrap();

        let summary = install(&fs, &archive, false).unwrap();
        assert!(summary.installed.is_empty());
        assert_eq!(summary.skipped[0].reason, SkipReason::AlreadyInstalled);
        assert_eq!(
            fs.read(Path::new("/root/bin/mackerel-plugin-sample")).unwrap(),
            b"old"
        );

        let summary = install(&fs, &archive, true).unwrap();
        assert!(summary.installed[0].replaced);
        assert_eq!(
            fs.read(Path::new("/root/bin/mackerel-plugin-sample")).unwrap(),
            b"new"
        );
    }

    #[test]
    fn test_multi_entry_filters() {
        let fs = MemoryFs::new();
        let archive = layout(
            &fs,
            &[
                ("check-sample", b"c", 0o755),
                ("mackerel-plugin-sample-multi-1", b"m1", 0o755),
                ("plugins/mackerel-plugin-sample-multi-2", b"m2", 0o755),
                ("mackerel-plugin-non-executable", b"n", 0o644),
                ("not-mackerel-plugin-sample", b"x", 0o755),
            ],
        );

        let summary = install(&fs, &archive, false).unwrap();
        let mut names = summary.installed_names();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "check-sample",
                "mackerel-plugin-sample-multi-1",
                "mackerel-plugin-sample-multi-2",
            ]
        );
        assert!(fs.exists(Path::new("/root/bin/mackerel-plugin-sample-multi-2")));
        assert!(!fs.exists(Path::new("/root/bin/mackerel-plugin-non-executable")));
        assert!(!fs.exists(Path::new("/root/bin/not-mackerel-plugin-sample")));

        let reason_of = |name: &str| {
            summary
                .skipped
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.reason)
        };
        assert_eq!(
            reason_of("mackerel-plugin-non-executable"),
            Some(SkipReason::NotExecutable)
        );
        assert_eq!(
            reason_of("not-mackerel-plugin-sample"),
            Some(SkipReason::NotAPlugin)
        );
    }

    #[test]
    fn test_duplicate_names_first_in_path_order_wins() {
        let fs = MemoryFs::new();
        let archive = layout(
            &fs,
            &[
                ("z/mackerel-plugin-dup", b"from-z", 0o755),
                ("a/mackerel-plugin-dup", b"from-a", 0o755),
            ],
        );

        let summary = install(&fs, &archive, true).unwrap();
        assert_eq!(summary.installed.len(), 1);
        assert_eq!(
            fs.read(Path::new("/root/bin/mackerel-plugin-dup")).unwrap(),
            b"from-a"
        );
        assert_eq!(summary.skipped[0].reason, SkipReason::ShadowedInArchive);
        assert_eq!(summary.skipped[0].path, PathBuf::from("z/mackerel-plugin-dup"));
    }

    #[test]
    fn test_no_eligible_files_is_ok() {
        let fs = MemoryFs::new();
        let archive = layout(&fs, &[("README.md", b"docs", 0o644)]);
        let summary = install(&fs, &archive, false).unwrap();
        assert!(summary.installed.is_empty());
        assert_eq!(summary.skipped.len(), 1);
    }

    #[test]
    fn test_corrupt_archive_is_extraction_error() {
        let fs = MemoryFs::new();
        fs.put_file("/artifacts/bad.zip", b"PK\x03\x04garbage", 0o644)
            .unwrap();
        let err = install(&fs, Path::new("/artifacts/bad.zip"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn test_read_only_bin_is_io_error() {
        let fs = MemoryFs::new();
        let archive = layout(&fs, &[("check-sample", b"c", 0o755)]);
        fs.set_mode(Path::new("/root/bin"), 0o555).unwrap();

        let err = install(&fs, &archive, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_recorded_as_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let fs = MemoryFs::new();
        let archive = layout(&fs, &[("check-sample", b"c", 0o755)]);
        let odd = Path::new("/root/work/x").join(OsStr::from_bytes(b"mackerel-plugin-\xff"));
        fs.put_file(&odd, b"odd", 0o755).unwrap();

        let summary = install(&fs, &archive, false).unwrap();
        assert_eq!(summary.installed_names(), vec!["check-sample"]);
        let skipped = &summary.skipped[0];
        assert_eq!(skipped.reason, SkipReason::NotAPlugin);
        assert_eq!(skipped.name, "mackerel-plugin-\u{FFFD}");
    }

    #[test]
    fn test_execute_only_entry_installs() {
        let fs = MemoryFs::new();
        let archive = layout(&fs, &[("mackerel-plugin-exec-only", b"x", 0o111)]);

        let summary = install(&fs, &archive, false).unwrap();
        assert_eq!(summary.installed_names(), vec!["mackerel-plugin-exec-only"]);
        assert_eq!(
            fs.metadata(Path::new("/root/bin/mackerel-plugin-exec-only"))
                .unwrap()
                .mode,
            INSTALLED_MODE
        );
    }
}
