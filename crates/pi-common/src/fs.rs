//! Filesystem capability.
//!
//! Installer components never call `std::fs` directly. They take a
//! [`FileSystem`] implementation, so the whole pipeline can run against
//! [`MemoryFs`] in tests and against [`OsFs`] in production.
//!
//! Modes are plain POSIX permission bits (`0o755`, `0o644`, ...). On
//! platforms without them, [`OsFs`] maps the owner-write bit onto the
//! read-only flag and reports synthetic modes.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use walkdir::WalkDir;

/// Mode given to directories created through [`FileSystem::create_dir_all`].
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Mode given to newly created files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

const EXEC_BITS: u32 = 0o111;
const OWNER_WRITE: u32 = 0o200;
const PERM_MASK: u32 = 0o7777;

/// Kind of filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Other,
}

/// The subset of metadata the installer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub kind: FileKind,
    pub len: u64,
    /// Permission bits, masked to `0o7777`.
    pub mode: u32,
}

impl FileMeta {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    /// True if any of the user/group/other execute bits is set.
    pub fn is_executable(&self) -> bool {
        self.mode & EXEC_BITS != 0
    }

    pub fn is_owner_writable(&self) -> bool {
        self.mode & OWNER_WRITE != 0
    }
}

/// Operations the installer performs against a filesystem.
pub trait FileSystem {
    /// Create `path` and all missing parents. Succeeds if it already exists
    /// as a directory.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;

    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Open `path` for writing, truncating an existing file and keeping its
    /// mode, or creating it with [`DEFAULT_FILE_MODE`].
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + '_>>;

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = self.create(path)?;
        file.write_all(contents)?;
        file.flush()
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Every regular file under `root` at any depth, sorted by path
    /// (component-wise lexicographic order).
    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

// ---------------------------------------------------------------------------
// OsFs
// ---------------------------------------------------------------------------

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(DEFAULT_DIR_MODE);
        }
        builder.create(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = fs::metadata(path)?;
        let kind = if meta.is_file() {
            FileKind::File
        } else if meta.is_dir() {
            FileKind::Dir
        } else {
            FileKind::Other
        };
        Ok(FileMeta {
            kind,
            len: meta.len(),
            mode: os_mode(&meta),
        })
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(fs::File::create(path)?))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(mode & PERM_MASK))
        }
        #[cfg(not(unix))]
        {
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_readonly(mode & OWNER_WRITE == 0);
            fs::set_permissions(path, perms)
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(unix)]
fn os_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & PERM_MASK
}

#[cfg(not(unix))]
fn os_mode(meta: &fs::Metadata) -> u32 {
    let base = if meta.is_dir() { DEFAULT_DIR_MODE } else { DEFAULT_FILE_MODE };
    if meta.permissions().readonly() {
        base & !0o222
    } else {
        base
    }
}

// ---------------------------------------------------------------------------
// MemoryFs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Dir { mode: u32 },
    File { data: Vec<u8>, mode: u32 },
}

/// An in-memory filesystem for deterministic tests.
///
/// Clones share the same tree. Owner-write bits are enforced: creating an
/// entry inside a directory without `0o200`, or truncating a file without
/// it, fails with `PermissionDenied`. The filesystem root (and the empty
/// relative root) always exists and is writable.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    nodes: Arc<Mutex<BTreeMap<PathBuf, Node>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `contents` to `path` with `mode`, creating parent directories.
    pub fn put_file(&self, path: impl AsRef<Path>, contents: &[u8], mode: u32) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }
        self.write(path, contents)?;
        self.set_mode(path, mode)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drop `.` components so `a/./b` and `a/b` address the same node.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn is_implicit_root(path: &Path) -> bool {
    path.as_os_str().is_empty() || path.parent().is_none()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn permission_denied(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("permission denied: {}", path.display()),
    )
}

fn not_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotADirectory,
        format!("not a directory: {}", path.display()),
    )
}

fn is_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::IsADirectory,
        format!("is a directory: {}", path.display()),
    )
}

fn check_parent_writable(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if is_implicit_root(parent) {
        return Ok(());
    }
    match nodes.get(parent) {
        Some(Node::Dir { mode }) if mode & OWNER_WRITE != 0 => Ok(()),
        Some(Node::Dir { .. }) => Err(permission_denied(parent)),
        Some(Node::File { .. }) => Err(not_a_directory(parent)),
        None => Err(not_found(parent)),
    }
}

impl FileSystem for MemoryFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut nodes = self.lock();

        let mut missing: Vec<&Path> = path
            .ancestors()
            .filter(|dir| !is_implicit_root(dir))
            .collect();
        missing.reverse();

        for dir in missing {
            match nodes.get(dir) {
                Some(Node::Dir { .. }) => {}
                Some(Node::File { .. }) => return Err(not_a_directory(dir)),
                None => {
                    check_parent_writable(&nodes, dir)?;
                    nodes.insert(
                        dir.to_path_buf(),
                        Node::Dir {
                            mode: DEFAULT_DIR_MODE,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let path = normalize(path);
        if is_implicit_root(&path) {
            return Ok(FileMeta {
                kind: FileKind::Dir,
                len: 0,
                mode: DEFAULT_DIR_MODE,
            });
        }
        match self.lock().get(&path) {
            Some(Node::Dir { mode }) => Ok(FileMeta {
                kind: FileKind::Dir,
                len: 0,
                mode: *mode,
            }),
            Some(Node::File { data, mode }) => Ok(FileMeta {
                kind: FileKind::File,
                len: data.len() as u64,
                mode: *mode,
            }),
            None => Err(not_found(&path)),
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = normalize(path);
        match self.lock().get(&path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Dir { .. }) => Err(is_a_directory(&path)),
            None => Err(not_found(&path)),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + '_>> {
        let path = normalize(path);
        {
            let mut nodes = self.lock();
            check_parent_writable(&nodes, &path)?;
            match nodes.get_mut(&path) {
                Some(Node::Dir { .. }) => return Err(is_a_directory(&path)),
                Some(Node::File { mode, .. }) if *mode & OWNER_WRITE == 0 => {
                    return Err(permission_denied(&path));
                }
                Some(Node::File { data, .. }) => data.clear(),
                None => {
                    nodes.insert(
                        path.clone(),
                        Node::File {
                            data: Vec::new(),
                            mode: DEFAULT_FILE_MODE,
                        },
                    );
                }
            }
        }
        Ok(Box::new(MemoryWriter {
            nodes: Arc::clone(&self.nodes),
            path,
        }))
    }

    fn set_mode(&self, path: &Path, new_mode: u32) -> io::Result<()> {
        let path = normalize(path);
        match self.lock().get_mut(&path) {
            Some(Node::Dir { mode }) | Some(Node::File { mode, .. }) => {
                *mode = new_mode & PERM_MASK;
                Ok(())
            }
            None => Err(not_found(&path)),
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut nodes = self.lock();
        match nodes.get(&path).map(|node| matches!(node, Node::Dir { .. })) {
            Some(false) => {
                check_parent_writable(&nodes, &path)?;
                nodes.remove(&path);
                Ok(())
            }
            Some(true) => Err(is_a_directory(&path)),
            None => Err(not_found(&path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut nodes = self.lock();
        match nodes.get(&path).map(|node| matches!(node, Node::Dir { .. })) {
            Some(true) => {
                check_parent_writable(&nodes, &path)?;
                nodes.retain(|p, _| !p.starts_with(&path));
                Ok(())
            }
            Some(false) => Err(not_a_directory(&path)),
            None => Err(not_found(&path)),
        }
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let root = normalize(root);
        let nodes = self.lock();
        if !is_implicit_root(&root) {
            match nodes.get(&root) {
                Some(Node::Dir { .. }) => {}
                Some(Node::File { .. }) => return Ok(vec![root]),
                None => return Err(not_found(&root)),
            }
        }
        Ok(nodes
            .iter()
            .filter(|(path, node)| matches!(node, Node::File { .. }) && path.starts_with(&root))
            .map(|(path, _)| path.clone())
            .collect())
    }
}

/// Streaming writer that appends straight into the shared tree.
struct MemoryWriter {
    nodes: Arc<Mutex<BTreeMap<PathBuf, Node>>>,
    path: PathBuf,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut nodes = self
            .nodes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match nodes.get_mut(&self.path) {
            Some(Node::File { data, .. }) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            Some(Node::Dir { .. }) => Err(is_a_directory(&self.path)),
            None => Err(not_found(&self.path)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
