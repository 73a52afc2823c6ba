//! Scheduler backend: the OS's native affinity-mask interface.
//!
//! Reads and writes the process-wide `cpu_set_t` mask via
//! `sched_getaffinity(2)` / `sched_setaffinity(2)`. CPU indices are
//! bounded by both the machine context and the mask width the platform
//! can represent.

use super::{Affinity, AffinityBackend, AffinityError};
use pw_common::{Machine, ProcessId};
use std::io;
use std::mem;

/// Direct `sched_*affinity` binding, whole-process scope.
#[derive(Debug)]
pub struct SchedulerBackend;

impl SchedulerBackend {
    pub fn new() -> Self {
        SchedulerBackend
    }
}

impl Default for SchedulerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AffinityBackend for SchedulerBackend {
    fn name(&self) -> &'static str {
        "sched"
    }

    fn query<'m>(
        &self,
        pid: ProcessId,
        machine: &'m Machine,
    ) -> Result<Affinity<'m>, AffinityError> {
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        let rc = unsafe {
            libc::sched_getaffinity(pid.as_raw(), mem::size_of::<libc::cpu_set_t>(), &mut set)
        };
        if rc != 0 {
            return Err(os_error(pid));
        }

        let mut affinity = Affinity::new(machine);
        for i in 0..mask_width(machine) {
            if unsafe { libc::CPU_ISSET(i as usize, &set) } {
                affinity.add(i);
            }
        }
        Ok(affinity)
    }

    fn apply(&self, pid: ProcessId, affinity: &Affinity<'_>) -> Result<(), AffinityError> {
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        unsafe { libc::CPU_ZERO(&mut set) };
        for &cpu in affinity.cpus() {
            if (cpu as usize) < libc::CPU_SETSIZE as usize {
                unsafe { libc::CPU_SET(cpu as usize, &mut set) };
            }
        }
        let rc = unsafe {
            libc::sched_setaffinity(pid.as_raw(), mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc != 0 {
            return Err(os_error(pid));
        }
        Ok(())
    }
}

/// Highest CPU index worth testing: the context's known count, clamped to
/// what `cpu_set_t` can represent.
fn mask_width(machine: &Machine) -> u32 {
    machine.existing_cpus().min(libc::CPU_SETSIZE as u32)
}

fn os_error(pid: ProcessId) -> AffinityError {
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EPERM) => AffinityError::PermissionDenied { pid },
        Some(libc::ESRCH) => AffinityError::NoSuchProcess { pid },
        _ => AffinityError::Os { pid, source: err },
    }
}
