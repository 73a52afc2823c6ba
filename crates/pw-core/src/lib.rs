//! Procwatch Core Library
//!
//! The foundational safety layer every other procwatch subsystem depends on:
//! - Fail-fast, audit-logged allocation (`heap`, `audit`, `fatal`)
//! - String and buffer utilities built on the audited heap (`strings`)
//! - CPU affinity query/apply over interchangeable backends (`affinity`)
//!
//! Process enumeration, display rendering and input handling live elsewhere;
//! they consume these modules as a general-purpose API.

pub mod affinity;
pub mod audit;
pub mod fatal;
pub mod heap;
pub mod strings;

pub use affinity::{detect_backend, Affinity, AffinityBackend, AffinityError};
pub use audit::{AuditEntry, AuditError, AuditLog, AuditVerb};
pub use heap::{Heap, TrackedBuf, TrackedString};

// Re-export the shared context types so consumers only need one import.
pub use pw_common::{Machine, ProcessId};
