//! The allocation diagnostic stream.
//!
//! Every allocation lifecycle event in the heap facade emits exactly one
//! line here: pointer identity, `seconds.microseconds` timestamp, verb,
//! byte count, and call-site. The stream exists for debugging and leak
//! analysis, not production telemetry; it is append-only, human-readable
//! and never read back by the program.
//!
//! # Design
//!
//! - **Format**: one plain text line per event, unversioned
//! - **Ownership**: the top-level process opens the log and owns its
//!   flush lifecycle; the heap facade only borrows the capability
//! - **Failure**: record writes are unchecked; only `open`/`flush` report
//!
//! # File Location
//!
//! The default log is stored at:
//! - `$PROCWATCH_DATA/audit/alloc.log` (if PROCWATCH_DATA is set)
//! - `$XDG_DATA_HOME/procwatch/audit/alloc.log` (otherwise)

mod entry;
mod writer;

pub use entry::{AuditEntry, AuditVerb};
pub use writer::AuditLog;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while opening or flushing the diagnostic stream.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to resolve audit log directory (set PROCWATCH_DATA or XDG_DATA_HOME)")]
    DataDirUnavailable,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Default directory name for audit logs within the data directory.
pub(crate) const AUDIT_DIR_NAME: &str = "audit";

/// Default audit log filename.
pub(crate) const AUDIT_LOG_FILENAME: &str = "alloc.log";

/// Resolve the audit log directory using standard XDG paths.
pub fn resolve_audit_dir() -> Result<PathBuf, AuditError> {
    // 1. Explicit override: PROCWATCH_DATA
    if let Ok(dir) = std::env::var("PROCWATCH_DATA") {
        return Ok(PathBuf::from(dir).join(AUDIT_DIR_NAME));
    }

    // 2. XDG_DATA_HOME
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join("procwatch").join(AUDIT_DIR_NAME));
    }

    // 3. Platform default (dirs crate)
    if let Some(base) = dirs::data_dir() {
        return Ok(base.join("procwatch").join(AUDIT_DIR_NAME));
    }

    Err(AuditError::DataDirUnavailable)
}
