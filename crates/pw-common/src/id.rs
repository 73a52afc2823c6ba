//! Process identity types.
//!
//! A process is identified by its OS pid. The wrapper keeps pid handling
//! uniform across the codebase and serializes transparently.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID wrapper with display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// The calling process.
    pub fn current() -> Self {
        ProcessId(std::process::id())
    }

    /// The pid as the signed type the C affinity interfaces expect.
    pub fn as_raw(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}
