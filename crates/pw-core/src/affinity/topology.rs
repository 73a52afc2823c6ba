//! Topology backend: CPU binding through the hwloc library.
//!
//! hwloc reports bindings as a CPU-id bitmap with a distinguished
//! "unrestricted" state (an empty bitmap). Queries expand that sentinel to
//! the full list of CPUs the machine context knows, so callers see the
//! same shape the scheduler backend produces. On Linux hwloc can only
//! bind individual threads; elsewhere the whole process is bound.

use super::{Affinity, AffinityBackend, AffinityError};
use hwlocality::cpu::binding::CpuBindingFlags;
use hwlocality::cpu::cpuset::CpuSet;
use hwlocality::Topology;
use pw_common::{Machine, ProcessId};

/// hwloc-backed binding, thread scope on Linux.
pub struct TopologyBackend {
    topology: Topology,
}

impl TopologyBackend {
    /// Load the topology. Fails when hwloc cannot discover this host, in
    /// which case the caller falls back to the scheduler backend.
    pub fn new() -> Result<Self, AffinityError> {
        let topology = Topology::new().map_err(|_| AffinityError::Unsupported)?;
        Ok(TopologyBackend { topology })
    }

    fn bind_flags() -> CpuBindingFlags {
        if cfg!(target_os = "linux") {
            CpuBindingFlags::THREAD
        } else {
            CpuBindingFlags::PROCESS
        }
    }
}

impl AffinityBackend for TopologyBackend {
    fn name(&self) -> &'static str {
        "hwloc"
    }

    fn query<'m>(
        &self,
        pid: ProcessId,
        machine: &'m Machine,
    ) -> Result<Affinity<'m>, AffinityError> {
        let cpuset = self
            .topology
            .process_cpu_binding(pid.0 as hwlocality::ProcessId, Self::bind_flags())
            .map_err(|e| AffinityError::Topology {
                pid,
                message: e.to_string(),
            })?;

        let mut affinity = Affinity::new(machine);
        if cpuset.last_set().is_none() {
            // Unrestricted sentinel: every CPU the context knows.
            for i in 0..machine.existing_cpus() {
                affinity.add(i);
            }
        } else {
            for id in cpuset.iter_set() {
                affinity.add(usize::from(id) as u32);
            }
        }
        Ok(affinity)
    }

    fn apply(&self, pid: ProcessId, affinity: &Affinity<'_>) -> Result<(), AffinityError> {
        let mut cpuset = CpuSet::new();
        for &cpu in affinity.cpus() {
            cpuset.set(cpu as usize);
        }
        self.topology
            .bind_process_cpu(
                pid.0 as hwlocality::ProcessId,
                &cpuset,
                Self::bind_flags(),
            )
            .map_err(|e| AffinityError::Topology {
                pid,
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_self_matches_scheduler_shape() {
        let machine = Machine::detect();
        let backend = match TopologyBackend::new() {
            Ok(b) => b,
            // No hwloc on this host; detection would have fallen back.
            Err(_) => return,
        };
        let affinity = backend
            .query(ProcessId::current(), &machine)
            .expect("own process must be queryable");
        assert!(affinity.used() > 0);
        assert!(affinity.cpus().windows(2).all(|w| w[0] < w[1]));
    }
}
