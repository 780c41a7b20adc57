//! Zip extraction into a scratch directory.

use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use pi_common::fs::{FileSystem, DEFAULT_FILE_MODE};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::{ArchiveError, Result};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;
const PERM_MASK: u32 = 0o7777;
/// Extracted files stay readable so they can be installed.
const OWNER_READ: u32 = 0o400;
const COPY_BUF_SIZE: usize = 32 * 1024;

/// A file written by [`extract_zip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// Location inside the extraction directory.
    pub path: PathBuf,
    /// Path as stored in the archive.
    pub relative: PathBuf,
    pub size: u64,
    /// Stored permission bits, or `0o644` when the archive carries none.
    pub mode: u32,
}

impl ExtractedEntry {
    /// Base file name of the entry.
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

/// Extract the zip at `archive` into `dest`.
///
/// Directories are created with the default mode; files get the permission
/// bits stored in the archive plus owner read. Entries are streamed, never
/// buffered whole. Entries that would land outside `dest` and
/// symlink entries are skipped with a warning.
pub fn extract_zip<F>(fs: &F, archive: &Path, dest: &Path) -> Result<Vec<ExtractedEntry>>
where
    F: FileSystem + ?Sized,
{
    let bytes = fs.read(archive).map_err(|source| ArchiveError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(|source| ArchiveError::Zip {
        archive: archive.to_path_buf(),
        source,
    })?;

    fs.create_dir_all(dest).map_err(|source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let mut file = zip.by_index(index).map_err(|source| ArchiveError::Zip {
            archive: archive.to_path_buf(),
            source,
        })?;

        let Some(relative) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!(
                archive = %archive.display(),
                entry = file.name(),
                "skipping entry outside the extraction root"
            );
            continue;
        };

        let stored_mode = file.unix_mode();
        if stored_mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            warn!(
                archive = %archive.display(),
                entry = %relative.display(),
                "skipping symlink entry"
            );
            continue;
        }

        let out = dest.join(&relative);
        if file.is_dir() {
            fs.create_dir_all(&out)
                .map_err(|source| ArchiveError::Io { path: out, source })?;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs.create_dir_all(parent).map_err(|source| ArchiveError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mode = stored_mode
            .map(|mode| mode & PERM_MASK)
            .unwrap_or(DEFAULT_FILE_MODE);
        let size = copy_entry(fs, &mut file, &out).map_err(|err| match err {
            CopyError::Read(source) => ArchiveError::CorruptEntry {
                archive: archive.to_path_buf(),
                entry: relative.display().to_string(),
                source,
            },
            CopyError::Write(source) => ArchiveError::Io {
                path: out.clone(),
                source,
            },
        })?;
        fs.set_mode(&out, mode | OWNER_READ)
            .map_err(|source| ArchiveError::Io {
                path: out.clone(),
                source,
            })?;

        debug!(
            entry = %relative.display(),
            size,
            mode = %format!("{mode:o}"),
            "extracted entry"
        );
        entries.push(ExtractedEntry {
            path: out,
            relative,
            size,
            mode,
        });
    }

    Ok(entries)
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

/// Stream one entry into `out`. The size declared in the archive is never
/// trusted for buffering.
fn copy_entry<F, R>(fs: &F, entry: &mut R, out: &Path) -> std::result::Result<u64, CopyError>
where
    F: FileSystem + ?Sized,
    R: Read,
{
    let mut writer = fs.create(out).map_err(CopyError::Write)?;
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut written = 0u64;
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
        written += n as u64;
    }
    writer.flush().map_err(CopyError::Write)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pi_common::MemoryFs;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    fn build_zip(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, mode) in entries {
            let options = SimpleFileOptions::default().unix_permissions(*mode);
            if let Some(dir) = name.strip_suffix('/') {
                writer.add_directory(dir, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn seeded(entries: &[(&str, &[u8], u32)]) -> (MemoryFs, PathBuf) {
        let fs = MemoryFs::new();
        let archive = PathBuf::from("/artifacts/sample.zip");
        fs.put_file(&archive, &build_zip(entries), 0o644).unwrap();
        (fs, archive)
    }

    #[test]
    fn test_extract_preserves_nesting_and_modes() {
        let (fs, archive) = seeded(&[
            ("mackerel-plugin-a", b"top", 0o755),
            ("plugins/", b"", 0o755),
            ("plugins/deep/check-b", b"nested", 0o700),
            ("README.md", b"docs", 0o644),
        ]);

        let entries = extract_zip(&fs, &archive, Path::new("/work")).unwrap();
        assert_eq!(entries.len(), 3);

        let nested = Path::new("/work/plugins/deep/check-b");
        assert_eq!(fs.read(nested).unwrap(), b"nested");
        assert_eq!(fs.metadata(nested).unwrap().mode, 0o700);
        assert_eq!(
            fs.metadata(Path::new("/work/README.md")).unwrap().mode,
            0o644
        );

        let top = entries
            .iter()
            .find(|e| e.name() == Some("mackerel-plugin-a"))
            .unwrap();
        assert!(top.is_executable());
        assert_eq!(top.size, 3);
        assert_eq!(top.relative, PathBuf::from("mackerel-plugin-a"));
    }

    #[test]
    fn test_extract_rejects_non_zip() {
        let fs = MemoryFs::new();
        let archive = PathBuf::from("/artifacts/broken.zip");
        fs.put_file(&archive, b"this is not a zip archive", 0o644)
            .unwrap();

        let err = extract_zip(&fs, &archive, Path::new("/work")).unwrap_err();
        assert!(matches!(err, ArchiveError::Zip { .. }), "{err}");
        assert!(!fs.exists(Path::new("/work")));
    }

    #[test]
    fn test_extract_missing_archive_is_io() {
        let fs = MemoryFs::new();
        let err = extract_zip(&fs, Path::new("/nope.zip"), Path::new("/work")).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }

    #[test]
    fn test_extract_into_read_only_dest_is_io() {
        let (fs, archive) = seeded(&[("mackerel-plugin-a", b"x", 0o755)]);
        fs.create_dir_all(Path::new("/work")).unwrap();
        fs.set_mode(Path::new("/work"), 0o555).unwrap();

        let err = extract_zip(&fs, &archive, Path::new("/work")).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }), "{err}");
    }

    #[test]
    fn test_extract_skips_symlinks() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_symlink(
                "mackerel-plugin-link",
                "/etc/passwd",
                SimpleFileOptions::default(),
            )
            .unwrap();
        writer
            .start_file(
                "mackerel-plugin-real",
                SimpleFileOptions::default().unix_permissions(0o755),
            )
            .unwrap();
        writer.write_all(b"real").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let fs = MemoryFs::new();
        fs.put_file("/a.zip", &bytes, 0o644).unwrap();
        let entries = extract_zip(&fs, Path::new("/a.zip"), Path::new("/work")).unwrap();

        assert_eq!(entries.len(), 1);
        assert!(!fs.exists(Path::new("/work/mackerel-plugin-link")));
        assert!(fs.exists(Path::new("/work/mackerel-plugin-real")));
    }

    #[test]
    fn test_extract_oversized_declared_length_is_an_error() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "mackerel-plugin-big",
                SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Stored)
                    .unix_permissions(0o755),
            )
            .unwrap();
        writer.write_all(b"abc").unwrap();
        let mut bytes = writer.finish().unwrap().into_inner();

        // Claim ~4 GiB for the 3-byte entry in the central directory.
        let central = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        let huge = 0xFFFF_FFF0u32.to_le_bytes();
        bytes[central + 20..central + 24].copy_from_slice(&huge);
        bytes[central + 24..central + 28].copy_from_slice(&huge);

        let fs = MemoryFs::new();
        fs.put_file("/big.zip", &bytes, 0o644).unwrap();
        let err = extract_zip(&fs, Path::new("/big.zip"), Path::new("/work")).unwrap_err();
        assert!(
            matches!(err, ArchiveError::Zip { .. } | ArchiveError::CorruptEntry { .. }),
            "{err}"
        );
        let unified: pi_common::Error = err.into();
        assert_eq!(unified.kind(), pi_common::ErrorKind::Extraction);
    }

    #[test]
    fn test_extract_keeps_stored_mode_but_adds_owner_read() {
        let (fs, archive) = seeded(&[("mackerel-plugin-x", b"x", 0o111)]);
        let entries = extract_zip(&fs, &archive, Path::new("/work")).unwrap();

        assert_eq!(entries[0].mode, 0o111);
        assert!(entries[0].is_executable());
        assert_eq!(
            fs.metadata(Path::new("/work/mackerel-plugin-x")).unwrap().mode,
            0o511
        );
    }
}
