//! Storage backends for snapshot and journal files.
//!
//! Paths are relative strings (`"merchant.json"`, `"inserts.journal"`) resolved by the
//! backend. `FsDirectory` maps them under a root directory; `MemoryDirectory` keeps them in a
//! map and is what most tests use.
//!
//! Vocabulary:
//! - a plain `create_file` + write is a **direct overwrite**: readers and crashes can observe
//!   a partially written file.
//! - `atomic_write` publishes via temp file + rename, so a reader sees old or new bytes.
//! - stable-storage durability additionally needs `fsync` of the file and its parent
//!   directory, see [`DurableDirectory`].

use crate::error::{IndexError, IndexResult};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// `fsync` the file at `path`.
///
/// Requires a backend that exposes `file_path()`; others get `NotSupported`.
pub fn sync_file<D: Directory + ?Sized>(dir: &D, path: &str) -> IndexResult<()> {
    let Some(p) = dir.file_path(path) else {
        return Err(IndexError::NotSupported(
            "sync_file requires Directory::file_path()".into(),
        ));
    };
    let f = std::fs::OpenOptions::new().read(true).open(&p)?;
    f.sync_all()?;
    Ok(())
}

/// `fsync` the parent directory of `path`, making a create or rename durable.
pub fn sync_parent_dir<D: Directory + ?Sized>(dir: &D, path: &str) -> IndexResult<()> {
    let Some(p) = dir.file_path(path) else {
        return Err(IndexError::NotSupported(
            "sync_parent_dir requires Directory::file_path()".into(),
        ));
    };
    let Some(parent) = p.parent() else {
        return Err(IndexError::InvalidConfig(format!(
            "path has no parent directory: {p:?}"
        )));
    };
    let f = std::fs::File::open(parent)?;
    f.sync_all()?;
    Ok(())
}

/// Read a whole file into memory.
pub fn read_all<D: Directory + ?Sized>(dir: &D, path: &str) -> IndexResult<Vec<u8>> {
    let mut f = dir.open_file(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Directory-like storage backend.
pub trait Directory: Send + Sync {
    /// Create a file for writing, truncating it if it exists.
    fn create_file(&self, path: &str) -> IndexResult<Box<dyn Write + Send>>;
    /// Open an existing file for reading.
    fn open_file(&self, path: &str) -> IndexResult<Box<dyn Read + Send>>;
    /// Whether a path exists.
    fn exists(&self, path: &str) -> bool;
    /// Delete a file. Deleting a missing file is not an error.
    fn delete(&self, path: &str) -> IndexResult<()>;
    /// Rename a file, replacing the destination.
    fn atomic_rename(&self, from: &str, to: &str) -> IndexResult<()>;
    /// Open a file for appending, creating it if missing.
    fn append_file(&self, path: &str) -> IndexResult<Box<dyn Write + Send>>;
    /// Replace the contents of `path` so readers see either the old or the new bytes.
    fn atomic_write(&self, path: &str, data: &[u8]) -> IndexResult<()>;
    /// Filesystem path for backends that have one.
    fn file_path(&self, path: &str) -> Option<PathBuf>;
}

/// Opt-in stable-storage operations, available on every `Directory`.
///
/// The defaults go through [`sync_file`] / [`sync_parent_dir`], so backends without
/// `file_path()` fail with `NotSupported` before touching anything.
pub trait DurableDirectory: Directory {
    /// `fsync` the file at `path`.
    fn sync_file(&self, path: &str) -> IndexResult<()> {
        sync_file(self, path)
    }

    /// `fsync` the parent directory of `path`.
    fn sync_parent_dir(&self, path: &str) -> IndexResult<()> {
        sync_parent_dir(self, path)
    }

    /// Write temp file, `fsync` it, rename over `path`, `fsync` the parent directory.
    ///
    /// On failure the temp file is removed and `path` keeps its previous contents.
    fn atomic_write_durable(&self, path: &str, data: &[u8]) -> IndexResult<()> {
        if self.file_path(path).is_none() {
            return Err(IndexError::NotSupported(
                "atomic_write_durable requires Directory::file_path()".into(),
            ));
        }

        let tmp = format!("{path}.tmp");
        let staged = (|| -> IndexResult<()> {
            let mut w = self.create_file(&tmp)?;
            w.write_all(data)?;
            w.flush()?;
            drop(w);
            self.sync_file(&tmp)?;
            self.atomic_rename(&tmp, path)
        })();
        if let Err(e) = staged {
            let _ = self.delete(&tmp);
            return Err(e);
        }
        self.sync_parent_dir(path)
    }
}

impl<T: Directory + ?Sized> DurableDirectory for T {}

/// Filesystem-backed `Directory` rooted at a local path.
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    /// Open (creating if needed) a directory backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> IndexResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn ensure_parent(full_path: &std::path::Path) -> IndexResult<()> {
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Directory for FsDirectory {
    fn create_file(&self, path: &str) -> IndexResult<Box<dyn Write + Send>> {
        let full_path = self.resolve_path(path);
        Self::ensure_parent(&full_path)?;
        Ok(Box::new(std::fs::File::create(full_path)?))
    }

    fn open_file(&self, path: &str) -> IndexResult<Box<dyn Read + Send>> {
        let full_path = self.resolve_path(path);
        if !full_path.exists() {
            return Err(IndexError::MissingPath(full_path));
        }
        Ok(Box::new(std::fs::File::open(full_path)?))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).exists()
    }

    fn delete(&self, path: &str) -> IndexResult<()> {
        let full_path = self.resolve_path(path);
        if full_path.exists() {
            std::fs::remove_file(full_path)?;
        }
        Ok(())
    }

    fn atomic_rename(&self, from: &str, to: &str) -> IndexResult<()> {
        let to_path = self.resolve_path(to);
        Self::ensure_parent(&to_path)?;
        std::fs::rename(self.resolve_path(from), to_path)?;
        Ok(())
    }

    fn append_file(&self, path: &str) -> IndexResult<Box<dyn Write + Send>> {
        let full_path = self.resolve_path(path);
        Self::ensure_parent(&full_path)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(full_path)?;
        Ok(Box::new(file))
    }

    fn atomic_write(&self, path: &str, data: &[u8]) -> IndexResult<()> {
        let full_temp_path = self.resolve_path(&format!("{path}.tmp"));
        Self::ensure_parent(&full_temp_path)?;

        let mut temp_file = std::fs::File::create(&full_temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        std::fs::rename(&full_temp_path, self.resolve_path(path))?;
        Ok(())
    }

    fn file_path(&self, path: &str) -> Option<PathBuf> {
        Some(self.resolve_path(path))
    }
}

type FileMap = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// In-memory `Directory`. Clones share the same files.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    files: FileMap,
}

impl MemoryDirectory {
    /// Empty in-memory directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_files<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> IndexResult<T>,
    ) -> IndexResult<T> {
        let mut files = self
            .files
            .write()
            .map_err(|_| IndexError::poisoned("memory directory"))?;
        f(&mut files)
    }
}

impl Directory for MemoryDirectory {
    fn create_file(&self, path: &str) -> IndexResult<Box<dyn Write + Send>> {
        self.with_files(|files| {
            files.insert(path.to_string(), Vec::new());
            Ok(())
        })?;
        Ok(Box::new(MemoryWriter {
            files: self.files.clone(),
            path: path.to_string(),
        }))
    }

    fn open_file(&self, path: &str) -> IndexResult<Box<dyn Read + Send>> {
        let data = self.with_files(|files| {
            files
                .get(path)
                .cloned()
                .ok_or_else(|| IndexError::NotFound(path.to_string()))
        })?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    fn exists(&self, path: &str) -> bool {
        self.files
            .read()
            .map(|f| f.contains_key(path))
            .unwrap_or(false)
    }

    fn delete(&self, path: &str) -> IndexResult<()> {
        self.with_files(|files| {
            files.remove(path);
            Ok(())
        })
    }

    fn atomic_rename(&self, from: &str, to: &str) -> IndexResult<()> {
        self.with_files(|files| match files.remove(from) {
            Some(data) => {
                files.insert(to.to_string(), data);
                Ok(())
            }
            None => Err(IndexError::NotFound(from.to_string())),
        })
    }

    fn append_file(&self, path: &str) -> IndexResult<Box<dyn Write + Send>> {
        self.with_files(|files| {
            files.entry(path.to_string()).or_default();
            Ok(())
        })?;
        Ok(Box::new(MemoryWriter {
            files: self.files.clone(),
            path: path.to_string(),
        }))
    }

    fn atomic_write(&self, path: &str, data: &[u8]) -> IndexResult<()> {
        self.with_files(|files| {
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        })
    }

    fn file_path(&self, _path: &str) -> Option<PathBuf> {
        None
    }
}

/// Appends straight into the shared map on every `write`.
struct MemoryWriter {
    files: FileMap,
    path: String,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut files = self
            .files
            .write()
            .map_err(|_| std::io::Error::other("lock poisoned"))?;
        files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
