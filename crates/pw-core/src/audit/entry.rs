//! Audit record shape and line rendering.
//!
//! One record per allocation lifecycle event. The rendered line is
//! human-readable and unversioned:
//!
//! ```text
//! 0x5607c1a2b3c0 1754650000.483920 allocated 64 bytes src/collect.rs:42
//! 0x5607c1a2b3c0 1754650000.484011 deallocated src/collect.rs:58
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::Location;

/// Allocation lifecycle verbs recorded in the diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditVerb {
    /// Fresh allocation, contents unspecified to the caller.
    Allocated,
    /// Fresh allocation, zero-filled by contract.
    AllocatedZeroed,
    /// An existing buffer changed size.
    Reallocated,
    /// A buffer was released.
    Deallocated,
    /// A string was copied into a fresh allocation.
    Duplicated,
}

impl AuditVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditVerb::Allocated => "allocated",
            AuditVerb::AllocatedZeroed => "allocated and zeroised",
            AuditVerb::Reallocated => "reallocated",
            AuditVerb::Deallocated => "deallocated",
            AuditVerb::Duplicated => "duplicated",
        }
    }
}

impl fmt::Display for AuditVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single allocation lifecycle record.
///
/// Purely observational; written out and never read back.
#[derive(Debug, Clone, Copy)]
pub struct AuditEntry {
    /// Address of the affected allocation.
    pub ptr: usize,
    /// When the event happened.
    pub ts: DateTime<Utc>,
    /// What happened.
    pub verb: AuditVerb,
    /// Size of the allocation, absent for releases.
    pub bytes: Option<usize>,
    /// Source location that triggered the event.
    pub site: &'static Location<'static>,
}

impl AuditEntry {
    pub fn new(
        ptr: usize,
        verb: AuditVerb,
        bytes: Option<usize>,
        site: &'static Location<'static>,
    ) -> Self {
        AuditEntry {
            ptr,
            ts: Utc::now(),
            verb,
            bytes,
            site,
        }
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x} {}.{:06} {}",
            self.ptr,
            self.ts.timestamp(),
            self.ts.timestamp_subsec_micros(),
            self.verb
        )?;
        if let Some(bytes) = self.bytes {
            write!(f, " {bytes} bytes")?;
        }
        write!(f, " {}:{}", self.site.file(), self.site.line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn here() -> &'static Location<'static> {
        Location::caller()
    }

    #[test]
    fn test_line_with_byte_count() {
        let (entry, at) = (AuditEntry::new(0x1000, AuditVerb::Allocated, Some(64), here()), line!());
        let line = entry.to_string();
        assert!(line.starts_with("0x1000 "));
        assert!(line.contains(" allocated 64 bytes "));
        assert!(line.ends_with(&format!("{}:{}", file!(), at)));
    }

    #[test]
    fn test_release_line_has_no_byte_count() {
        let entry = AuditEntry::new(0x1000, AuditVerb::Deallocated, None, here());
        let line = entry.to_string();
        assert!(line.contains(" deallocated "));
        assert!(!line.contains("bytes"));
    }

    #[test]
    fn test_timestamp_micros_are_zero_padded() {
        let mut entry = AuditEntry::new(0x1, AuditVerb::Duplicated, Some(1), here());
        entry.ts = DateTime::from_timestamp(1_754_650_000, 1_000).unwrap();
        assert!(entry.to_string().contains("1754650000.000001"));
    }
}
