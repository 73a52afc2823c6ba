//! Append-only writer for the diagnostic stream.
//!
//! The writer is an explicit capability: the top-level process opens it,
//! hands it to the heap facade, and owns flushing. Record writes themselves
//! are unchecked; the stream is observational and must never make an
//! allocation fail.

use super::entry::AuditEntry;
use super::{resolve_audit_dir, AuditError, AUDIT_LOG_FILENAME};
use std::cell::{Cell, RefCell};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The diagnostic stream writer.
///
/// Line-oriented and append-only; one line per allocation lifecycle event.
pub struct AuditLog {
    /// Path of the backing file, absent for caller-supplied sinks.
    path: Option<PathBuf>,
    /// Number of records emitted.
    entries: Cell<u64>,
    /// The sink. Interior mutability keeps `record` callable from shared
    /// handles; the stream is single-threaded by design.
    out: RefCell<Box<dyn Write>>,
}

impl AuditLog {
    /// Open the stream at the default location (see [`resolve_audit_dir`]).
    pub fn open_default() -> Result<Self, AuditError> {
        let dir = resolve_audit_dir()?;
        std::fs::create_dir_all(&dir).map_err(|e| AuditError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Self::create(&dir.join(AUDIT_LOG_FILENAME))
    }

    /// Open the stream at an explicit path, appending to an existing file.
    pub fn create(path: &Path) -> Result<Self, AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AuditError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(path = %path.display(), "opened diagnostic stream");
        Ok(AuditLog {
            path: Some(path.to_path_buf()),
            entries: Cell::new(0),
            out: RefCell::new(Box::new(BufWriter::new(file))),
        })
    }

    /// Wrap an arbitrary sink. Used by tests and by callers that route the
    /// stream to stderr.
    pub fn with_writer(out: Box<dyn Write>) -> Self {
        AuditLog {
            path: None,
            entries: Cell::new(0),
            out: RefCell::new(out),
        }
    }

    /// Append one record.
    pub fn record(&self, entry: &AuditEntry) {
        // Unchecked by contract; a broken stream must not fail allocations.
        let _ = writeln!(self.out.borrow_mut(), "{entry}");
        self.entries.set(self.entries.get() + 1);
    }

    /// Flush buffered records to the sink.
    pub fn flush(&self) -> std::io::Result<()> {
        self.out.borrow_mut().flush()
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of records emitted so far.
    pub fn entry_count(&self) -> u64 {
        self.entries.get()
    }
}
