//! Unrecoverable-failure policy.
//!
//! A monitoring tool has no useful degraded mode once memory is exhausted or
//! a size computation has gone wrong, so both cases terminate the process.
//! Before terminating, the teardown hook registered by the top-level process
//! runs so the terminal is restored to a usable state.
//!
//! Two tiers:
//! - Guard violations (zero sizes, overflowing multiplications, truncated
//!   bounded writes) panic; the release profile carries `panic = "abort"`,
//!   so in production this terminates just like the second tier while
//!   staying assertable in tests.
//! - OS allocation failure aborts outright; there is nothing to unwind into.

use std::sync::OnceLock;

static TEARDOWN: OnceLock<fn()> = OnceLock::new();

/// Register the terminal/display teardown hook.
///
/// Called once by the top-level process at startup; later registrations are
/// ignored.
pub fn set_teardown(hook: fn()) {
    let _ = TEARDOWN.set(hook);
}

fn run_teardown() {
    if let Some(hook) = TEARDOWN.get() {
        hook();
    }
}

/// Programmer-error tier: invalid argument or failed size computation.
#[track_caller]
pub(crate) fn guard_violation(msg: &str) -> ! {
    run_teardown();
    panic!("{msg}");
}

/// Allocation-exhaustion tier. No retry, no fallback allocator.
pub(crate) fn out_of_memory(bytes: usize) -> ! {
    run_teardown();
    eprintln!("procwatch: out of memory allocating {bytes} bytes");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    static RAN: AtomicBool = AtomicBool::new(false);

    fn mark() {
        RAN.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_guard_violation_runs_teardown_then_panics() {
        set_teardown(mark);
        let result = std::panic::catch_unwind(|| guard_violation("boom"));
        assert!(result.is_err());
        assert!(RAN.load(Ordering::SeqCst));
    }

    #[test]
    fn test_second_registration_is_ignored() {
        set_teardown(mark);
        set_teardown(|| unreachable!());
        assert!(std::panic::catch_unwind(|| guard_violation("boom")).is_err());
    }
}
