//! CPU affinity query/apply over interchangeable backends.
//!
//! An [`Affinity`] is an ordered list of CPU ids borrowed against the
//! [`Machine`] context. Two backends produce and consume it behind one
//! trait: the hwloc topology library (optional `topology` feature) and the
//! OS scheduler's native mask interface. Both normalize to the same
//! external shape, an ascending CPU-index list with the topology library's
//! "unrestricted" sentinel expanded to every CPU the context knows, so the
//! rest of the tool never cares which backend answered.
//!
//! A failed query is an error, never an empty set: "unknown" and "no CPUs
//! allowed" must not be conflated.

#[cfg(target_os = "linux")]
pub mod sched;
#[cfg(feature = "topology")]
pub mod topology;

use pw_common::{Machine, ProcessId};
use thiserror::Error;
use tracing::debug;

/// Initial id-list capacity; doubles on overflow.
const INITIAL_SLOTS: usize = 8;

/// The set of CPU indices a process is permitted to execute on.
///
/// Exclusively owned by its creator; borrows the machine context for its
/// whole lifetime. Ids are unique and ascending when produced by a query;
/// manual `add` does not enforce either.
#[derive(Debug)]
pub struct Affinity<'m> {
    machine: &'m Machine,
    cpus: Vec<u32>,
}

impl<'m> Affinity<'m> {
    /// Empty set against `machine`.
    pub fn new(machine: &'m Machine) -> Self {
        Affinity {
            machine,
            cpus: Vec::with_capacity(INITIAL_SLOTS),
        }
    }

    /// Append a CPU id, doubling capacity on overflow.
    pub fn add(&mut self, id: u32) {
        self.cpus.push(id);
    }

    /// Number of ids held.
    pub fn used(&self) -> usize {
        self.cpus.len()
    }

    /// Current slot capacity.
    pub fn capacity(&self) -> usize {
        self.cpus.capacity()
    }

    /// The ids, in insertion order.
    pub fn cpus(&self) -> &[u32] {
        &self.cpus
    }

    /// The borrowed machine context.
    pub fn machine(&self) -> &'m Machine {
        self.machine
    }
}

/// Recoverable affinity failures. Callers degrade gracefully (display
/// "affinity unavailable") instead of terminating.
#[derive(Debug, Error)]
pub enum AffinityError {
    #[error("permission denied for pid {pid}")]
    PermissionDenied { pid: ProcessId },

    #[error("no such process: {pid}")]
    NoSuchProcess { pid: ProcessId },

    #[error("cpu binding is not supported on this platform")]
    Unsupported,

    #[error("topology backend failed for pid {pid}: {message}")]
    Topology { pid: ProcessId, message: String },

    #[error("affinity syscall failed for pid {pid}: {source}")]
    Os {
        pid: ProcessId,
        #[source]
        source: std::io::Error,
    },
}

/// One consistent query/apply contract over both binding mechanisms.
pub trait AffinityBackend {
    /// Short backend identifier for logs.
    fn name(&self) -> &'static str;

    /// The CPU set `pid` is currently bound to, ascending. An error means
    /// "unknown", never an empty set.
    fn query<'m>(&self, pid: ProcessId, machine: &'m Machine)
        -> Result<Affinity<'m>, AffinityError>;

    /// Bind `pid` to exactly the given set. Never partially applies.
    fn apply(&self, pid: ProcessId, affinity: &Affinity<'_>) -> Result<(), AffinityError>;
}

/// Select the affinity backend once at startup.
///
/// Prefers the topology library when it is compiled in and initializes on
/// this host; otherwise falls back to the OS scheduler interface.
pub fn detect_backend() -> Result<Box<dyn AffinityBackend>, AffinityError> {
    #[cfg(feature = "topology")]
    match topology::TopologyBackend::new() {
        Ok(backend) => {
            debug!(backend = backend.name(), "selected affinity backend");
            return Ok(Box::new(backend));
        }
        Err(err) => {
            tracing::warn!(error = %err, "hwloc unavailable, falling back to scheduler backend");
        }
    }

    let backend = scheduler_backend()?;
    debug!(backend = backend.name(), "selected affinity backend");
    Ok(backend)
}

#[cfg(target_os = "linux")]
fn scheduler_backend() -> Result<Box<dyn AffinityBackend>, AffinityError> {
    Ok(Box::new(sched::SchedulerBackend::new()))
}

#[cfg(not(target_os = "linux"))]
fn scheduler_backend() -> Result<Box<dyn AffinityBackend>, AffinityError> {
    Err(AffinityError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_preserves_order_across_doubling() {
        let machine = Machine::with_cpus(16);
        let mut affinity = Affinity::new(&machine);
        assert_eq!(affinity.capacity(), INITIAL_SLOTS);
        for id in 0..9 {
            affinity.add(id);
        }
        assert_eq!(affinity.used(), 9);
        assert!(affinity.capacity() >= 9);
        assert_eq!(
            affinity.cpus(),
            &[0, 1, 2, 3, 4, 5, 6, 7, 8],
            "insertion order must survive growth"
        );
    }

    #[test]
    fn test_new_set_is_empty_not_absent() {
        let machine = Machine::with_cpus(4);
        let affinity = Affinity::new(&machine);
        assert_eq!(affinity.used(), 0);
        assert!(affinity.used() <= affinity.capacity());
    }
}
