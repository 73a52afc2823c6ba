//! Machine context shared by every subsystem.
//!
//! Affinity queries and the display layer both need to know how many CPUs
//! exist on this host. The count is detected once at startup and the
//! `Machine` value is then borrowed, never copied, by the consumers.

use std::fs;
use tracing::debug;

/// Shared process/topology context.
///
/// Holds the number of CPUs known to exist on this machine. Affinity sets
/// borrow a `Machine` for their whole lifetime; the context outlives them.
#[derive(Debug)]
pub struct Machine {
    existing_cpus: u32,
}

impl Machine {
    /// Detect the machine context at startup.
    pub fn detect() -> Self {
        let existing_cpus = num_logical_cpus();
        debug!(existing_cpus, "detected machine context");
        Machine { existing_cpus }
    }

    /// Build a context with a fixed CPU count. Intended for tests and for
    /// callers that already resolved the count elsewhere.
    pub fn with_cpus(existing_cpus: u32) -> Self {
        Machine { existing_cpus }
    }

    /// Number of CPUs known to exist on this machine.
    pub fn existing_cpus(&self) -> u32 {
        self.existing_cpus
    }
}

/// Get the number of logical CPUs on the system.
pub fn num_logical_cpus() -> u32 {
    // Try /proc/cpuinfo first
    if let Ok(content) = fs::read_to_string("/proc/cpuinfo") {
        let count = content
            .lines()
            .filter(|l| l.starts_with("processor"))
            .count();
        if count > 0 {
            return count as u32;
        }
    }

    // Fall back to libc sysconf
    #[cfg(unix)]
    {
        let cpus = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if cpus > 0 {
            return cpus as u32;
        }
    }

    // Ultimate fallback
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_finds_at_least_one_cpu() {
        let machine = Machine::detect();
        assert!(machine.existing_cpus() >= 1);
    }

    #[test]
    fn test_with_cpus_is_verbatim() {
        assert_eq!(Machine::with_cpus(4).existing_cpus(), 4);
    }
}
