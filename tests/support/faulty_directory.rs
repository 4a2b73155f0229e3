//! Filesystem-backed `Directory` wrapper with targeted fault injection.
//!
//! Lives under `tests/support/` so it is not compiled as its own integration test target.

use serviceability::storage::{Directory, FsDirectory};
use serviceability::IndexResult;
use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};

/// Which operations fail, and how often writes were attempted.
#[derive(Default)]
pub struct FaultConfig {
    /// Paths whose `create_file` / `atomic_write` fail.
    pub fail_writes: HashSet<String>,
    /// Paths whose `append_file` fails.
    pub fail_appends: HashSet<String>,
    /// Paths whose append handles (open ones included) write half of each buffer and then fail.
    pub tear_appends: HashSet<String>,
    /// Fail every `open_file`.
    pub fail_reads: bool,
    /// Write attempts so far, failed ones included.
    pub write_calls: usize,
}

/// A filesystem-backed `Directory` wrapper with targeted fault injection.
pub struct FaultyDirectory {
    inner: FsDirectory,
    cfg: Arc<Mutex<FaultConfig>>,
}

impl FaultyDirectory {
    /// Wrap an existing `FsDirectory`.
    pub fn new(inner: FsDirectory) -> Self {
        Self {
            inner,
            cfg: Arc::new(Mutex::new(FaultConfig::default())),
        }
    }

    /// Shared fault config (for toggling failpoints and reading counters).
    pub fn cfg(&self) -> Arc<Mutex<FaultConfig>> {
        self.cfg.clone()
    }

    fn check_write(&self, path: &str, append: bool) -> IndexResult<()> {
        let mut cfg = self.cfg.lock().unwrap();
        cfg.write_calls += 1;
        let blocked = if append {
            cfg.fail_appends.contains(path)
        } else {
            cfg.fail_writes.contains(path)
        };
        if blocked {
            return Err(io::Error::other(format!("injected write failure on {path}")).into());
        }
        Ok(())
    }
}

impl Directory for FaultyDirectory {
    fn create_file(&self, path: &str) -> IndexResult<Box<dyn io::Write + Send>> {
        self.check_write(path, false)?;
        self.inner.create_file(path)
    }

    fn open_file(&self, path: &str) -> IndexResult<Box<dyn io::Read + Send>> {
        if self.cfg.lock().unwrap().fail_reads {
            return Err(io::Error::other("injected read failure").into());
        }
        self.inner.open_file(path)
    }

    fn exists(&self, path: &str) -> bool {
        self.inner.exists(path)
    }

    fn delete(&self, path: &str) -> IndexResult<()> {
        self.inner.delete(path)
    }

    fn atomic_rename(&self, from: &str, to: &str) -> IndexResult<()> {
        self.inner.atomic_rename(from, to)
    }

    fn append_file(&self, path: &str) -> IndexResult<Box<dyn io::Write + Send>> {
        self.check_write(path, true)?;
        Ok(Box::new(TearingWriter {
            inner: self.inner.append_file(path)?,
            path: path.to_string(),
            cfg: self.cfg.clone(),
        }))
    }

    fn atomic_write(&self, path: &str, data: &[u8]) -> IndexResult<()> {
        self.check_write(path, false)?;
        self.inner.atomic_write(path, data)
    }

    fn file_path(&self, path: &str) -> Option<std::path::PathBuf> {
        self.inner.file_path(path)
    }
}

/// While its path is in `tear_appends`, writes the first half of every buffer and then
/// reports a full disk.
struct TearingWriter {
    inner: Box<dyn io::Write + Send>,
    path: String,
    cfg: Arc<Mutex<FaultConfig>>,
}

impl io::Write for TearingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.cfg.lock().unwrap().tear_appends.contains(&self.path) {
            return self.inner.write(buf);
        }
        self.inner.write_all(&buf[..buf.len() / 2])?;
        self.inner.flush()?;
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
